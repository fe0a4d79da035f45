//! End-to-end engine scenarios.

use super::{ConcurrentEngine, Engine, ExternalChannels, SequentialEngine};
use crate::cancel::CancelToken;
use crate::component::{Component, Port, PortType, PortValues, ProcessContext};
use crate::components::{StringSink, StringSource, Uppercase};
use crate::errors::{ComponentError, FlowError};
use crate::observability::CollectingEventSink;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::resilience::RetryPolicy;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Never returns from `process`; only cancellation ends it.
#[derive(Debug, Default)]
struct Blocker {
    name: String,
}

#[async_trait]
impl Component for Blocker {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn output_ports(&self) -> Vec<Port> {
        vec![Port::output("out", PortType::String)]
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        _inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Fails with a recoverable runtime error until call `succeed_on`.
#[derive(Debug)]
struct Flaky {
    name: String,
    calls: Arc<AtomicU32>,
    succeed_on: u32,
}

impl Flaky {
    fn new(succeed_on: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                name: String::new(),
                calls: calls.clone(),
                succeed_on,
            },
            calls,
        )
    }
}

#[async_trait]
impl Component for Flaky {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn output_ports(&self) -> Vec<Port> {
        vec![Port::output("out", PortType::String)]
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        _inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call < self.succeed_on {
            Err(ComponentError::runtime("transient failure", &self.name))
        } else {
            Ok(PortValues::from([("out".to_string(), json!("done"))]))
        }
    }
}

fn uppercase_pipeline() -> (Pipeline, Arc<parking_lot::RwLock<Vec<String>>>) {
    let mut p = Pipeline::new("simple");
    let sink = StringSink::new();
    let handle = sink.received_handle();
    p.add_component("src", StringSource::new("hello"));
    p.add_component("upper", Uppercase::new());
    p.add_component("sink", sink);
    p.connect::<String>("src", "output", "upper", "input");
    p.connect::<String>("upper", "output", "sink", "input");
    (p, handle)
}

fn fast_retry_config(max_retries: u32) -> PipelineConfig {
    PipelineConfig::default().with_retry_policy(
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1)),
    )
}

#[tokio::test]
async fn test_sequential_linear_uppercase() {
    let (mut p, handle) = uppercase_pipeline();
    p.set_engine(Arc::new(SequentialEngine::new()));

    p.run(CancelToken::new()).await.unwrap();

    assert_eq!(*handle.read(), vec!["HELLO".to_string()]);
    assert_eq!(
        p.topology_order().unwrap(),
        vec!["src".to_string(), "upper".to_string(), "sink".to_string()]
    );
    assert_eq!(
        p.critical_path().unwrap(),
        vec!["src".to_string(), "upper".to_string(), "sink".to_string()]
    );
}

#[tokio::test]
async fn test_concurrent_linear_uppercase() {
    let (mut p, handle) = uppercase_pipeline();
    p.set_engine(Arc::new(ConcurrentEngine::new()));

    p.run(CancelToken::new()).await.unwrap();

    assert_eq!(*handle.read(), vec!["HELLO".to_string()]);
}

#[tokio::test]
async fn test_engines_produce_identical_outputs() {
    let (mut seq_p, seq_handle) = uppercase_pipeline();
    seq_p.set_engine(Arc::new(SequentialEngine::new()));
    seq_p.run(CancelToken::new()).await.unwrap();

    let (mut conc_p, conc_handle) = uppercase_pipeline();
    conc_p.set_engine(Arc::new(ConcurrentEngine::new()));
    conc_p.run(CancelToken::new()).await.unwrap();

    assert_eq!(*seq_handle.read(), *conc_handle.read());
}

#[tokio::test]
async fn test_fan_out_delivers_to_every_sink() {
    for engine in engines() {
        let mut p = Pipeline::new("fan-out");
        let sink1 = StringSink::new();
        let sink2 = StringSink::new();
        let h1 = sink1.received_handle();
        let h2 = sink2.received_handle();
        p.add_component("src", StringSource::new("value"));
        p.add_component("sink1", sink1);
        p.add_component("sink2", sink2);
        p.connect::<String>("src", "output", "sink1", "input");
        p.connect::<String>("src", "output", "sink2", "input");
        p.set_engine(engine);

        p.run(CancelToken::new()).await.unwrap();

        assert_eq!(*h1.read(), vec!["value".to_string()]);
        assert_eq!(*h2.read(), vec!["value".to_string()]);
    }
}

#[tokio::test]
async fn test_invalid_pipeline_refused() {
    for engine in engines() {
        let mut p = Pipeline::new("invalid");
        let sink = StringSink::new();
        p.add_component("sink", sink);
        p.set_engine(engine);

        // Required input unconnected and not fed externally.
        let err = p.run(CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }
}

#[tokio::test]
async fn test_construction_errors_surface_on_run() {
    let mut p = Pipeline::new("broken");
    p.connect::<String>("ghost", "out", "nowhere", "in");

    let err = p.run(CancelToken::new()).await.unwrap_err();
    match err {
        FlowError::Construction { count, first } => {
            assert_eq!(count, 1);
            assert!(first.contains("ghost"));
        }
        other => panic!("expected construction error, got {other}"),
    }
}

#[tokio::test]
async fn test_cancellation_returns_promptly() {
    let cancel = CancelToken::new();
    let mut p = Pipeline::new("blocked");
    let sink = StringSink::new();
    p.add_component("blocker", Blocker::default());
    p.add_component("sink", sink);
    p.connect::<String>("blocker", "out", "sink", "input");
    p.set_engine(Arc::new(ConcurrentEngine::new()));

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel("test deadline");
    });

    let start = Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(2), p.run(cancel))
        .await
        .expect("engine must return after cancellation")
        .unwrap_err();

    assert!(matches!(err, FlowError::Cancelled(_)));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_timeout_cancels_run() {
    let mut p = Pipeline::with_config(
        "slow",
        PipelineConfig::default().with_timeout(Duration::from_millis(50)),
    );
    p.add_component("blocker", Blocker::default());
    p.set_engine(Arc::new(ConcurrentEngine::new()));

    let err = tokio::time::timeout(Duration::from_secs(2), p.run(CancelToken::new()))
        .await
        .expect("engine must return after timeout")
        .unwrap_err();

    assert!(matches!(err, FlowError::Timeout(_)));
}

#[tokio::test]
async fn test_retry_then_success() {
    for engine in engines() {
        let mut p = Pipeline::with_config("flaky", fast_retry_config(3));
        let (flaky, calls) = Flaky::new(4);
        p.add_component("flaky", flaky);
        p.set_engine(engine);

        p.run(CancelToken::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}

#[tokio::test]
async fn test_retry_budget_exhausted_aborts() {
    let mut p = Pipeline::with_config("flaky", fast_retry_config(2));
    let (flaky, calls) = Flaky::new(4);
    p.add_component("flaky", flaky);
    p.set_engine(Arc::new(ConcurrentEngine::new()));

    let err = p.run(CancelToken::new()).await.unwrap_err();
    match err {
        FlowError::Component(err) => assert_eq!(err.component, "flaky"),
        other => panic!("expected component error, got {other}"),
    }
    // Initial call plus two retries.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(p.error_collector().count() >= 3);
}

#[tokio::test]
async fn test_external_channels_feed_and_drain() {
    for engine in engines() {
        let mut p = Pipeline::new("exposed");
        p.add_component("upper", Uppercase::new());
        p.set_engine(engine);

        let (in_tx, in_rx) = tokio::sync::mpsc::channel(1);
        let (out_tx, mut out_rx) = tokio::sync::mpsc::channel(1);
        let external = ExternalChannels::new()
            .with_input("input", in_rx)
            .with_output("output", out_tx);

        in_tx.send(json!("quiet")).await.unwrap();
        drop(in_tx);

        p.run_with_channels(CancelToken::new(), external)
            .await
            .unwrap();

        assert_eq!(out_rx.recv().await, Some(json!("QUIET")));
    }
}

#[tokio::test]
async fn test_sub_pipeline_as_component() {
    let mut inner = Pipeline::new("inner");
    inner.add_component("upper", Uppercase::new());

    let mut outer = Pipeline::new("outer");
    let sink = StringSink::new();
    let handle = sink.received_handle();
    outer.add_component("src", StringSource::new("nested"));
    outer.add_component("inner", inner);
    outer.add_component("sink", sink);
    outer.connect::<String>("src", "output", "inner", "input");
    outer.connect::<String>("inner", "output", "sink", "input");
    outer.set_engine(Arc::new(ConcurrentEngine::new()));

    outer.run(CancelToken::new()).await.unwrap();

    assert_eq!(*handle.read(), vec!["NESTED".to_string()]);
}

#[tokio::test]
async fn test_transform_applied_on_edge() {
    let mut p = Pipeline::new("transformed");
    let sink = StringSink::new();
    let handle = sink.received_handle();
    p.add_component("src", StringSource::new("shout"));
    p.add_component("sink", sink);
    p.connect::<String>("src", "output", "sink", "input");
    p.connect_with_transform(
        "src",
        "output",
        "sink",
        "input",
        Arc::new(crate::component::UppercaseTransform),
    );
    p.set_engine(Arc::new(SequentialEngine::new()));

    p.run(CancelToken::new()).await.unwrap();

    assert_eq!(*handle.read(), vec!["SHOUT".to_string()]);
}

#[tokio::test]
async fn test_lifecycle_events_emitted() {
    let (mut p, _handle) = uppercase_pipeline();
    let events = Arc::new(CollectingEventSink::new());
    p.set_event_sink(events.clone());
    p.set_engine(Arc::new(ConcurrentEngine::new()));

    p.run(CancelToken::new()).await.unwrap();

    assert_eq!(events.events_of_type("pipeline.started").len(), 1);
    assert_eq!(events.events_of_type("pipeline.completed").len(), 1);
    assert_eq!(events.events_of_type("component.started").len(), 3);
    assert_eq!(events.events_of_type("component.completed").len(), 3);
}

#[tokio::test]
async fn test_metrics_recorded_per_component() {
    let (mut p, _handle) = uppercase_pipeline();
    p.set_engine(Arc::new(SequentialEngine::new()));

    p.run(CancelToken::new()).await.unwrap();

    let metrics = p.context().metrics();
    for name in ["src", "upper", "sink"] {
        assert_eq!(metrics.latency(name).unwrap().count, 1, "component {name}");
        assert_eq!(metrics.error_count(name), 0);
    }

    let text = metrics.exposition();
    assert!(text.contains("component_latency_seconds_count{component=\"upper\"} 1"));
}

#[tokio::test]
async fn test_process_error_wrapped_with_component() {
    #[derive(Debug, Default)]
    struct Exploder {
        name: String,
    }

    #[async_trait]
    impl Component for Exploder {
        fn name(&self) -> &str {
            &self.name
        }
        fn set_name(&mut self, name: &str) {
            self.name = name.to_string();
        }
        fn input_ports(&self) -> Vec<Port> {
            Vec::new()
        }
        fn output_ports(&self) -> Vec<Port> {
            Vec::new()
        }
        async fn process(
            &self,
            _ctx: &ProcessContext,
            _inputs: PortValues,
        ) -> Result<PortValues, ComponentError> {
            Err(ComponentError::validation("refused", &self.name))
        }
    }

    let mut p = Pipeline::new("exploding");
    p.add_component("boom", Exploder::default());
    p.set_engine(Arc::new(SequentialEngine::new()));

    let err = p.run(CancelToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("[boom]"));
}

#[tokio::test]
async fn test_default_values_fill_optional_inputs() {
    #[derive(Debug, Default)]
    struct Defaulted {
        name: String,
        seen: Arc<parking_lot::RwLock<Option<Value>>>,
    }

    #[async_trait]
    impl Component for Defaulted {
        fn name(&self) -> &str {
            &self.name
        }
        fn set_name(&mut self, name: &str) {
            self.name = name.to_string();
        }
        fn input_ports(&self) -> Vec<Port> {
            vec![Port::input("in", PortType::String).with_default(json!("fallback"))]
        }
        fn output_ports(&self) -> Vec<Port> {
            Vec::new()
        }
        async fn process(
            &self,
            _ctx: &ProcessContext,
            inputs: PortValues,
        ) -> Result<PortValues, ComponentError> {
            *self.seen.write() = inputs.get("in").cloned();
            Ok(PortValues::new())
        }
    }

    for engine in engines() {
        let component = Defaulted::default();
        let seen = component.seen.clone();
        let mut p = Pipeline::new("defaults");
        p.add_component("d", component);
        p.set_engine(engine);

        p.run(CancelToken::new()).await.unwrap();
        assert_eq!(*seen.read(), Some(json!("fallback")));
    }
}

fn engines() -> Vec<Arc<dyn Engine>> {
    vec![
        Arc::new(SequentialEngine::new()),
        Arc::new(ConcurrentEngine::new()),
    ]
}
