//! The pipeline container.
//!
//! A pipeline owns named components and the connections between their ports,
//! accumulates construction errors instead of panicking, and is itself a
//! [`Component`]: its unconnected ports become the public ports of the
//! composite.

use super::config::{BackpressureConfig, PipelineConfig};
use super::connection::Connection;
use super::context::ExecutionContext;
use crate::cancel::CancelToken;
use crate::component::{Component, FlowType, Port, PortType, PortValues, ProcessContext, Transform};
use crate::engine::{ConcurrentEngine, Engine, ExternalChannels};
use crate::errors::{ComponentError, ErrorCollector, ErrorKind, FlowError, Severity};
use crate::graph::ComponentGraph;
use crate::observability::{EventSink, NoOpEventSink};
use crate::resilience::{DefaultErrorHandler, ErrorHandler};
use crate::validate::{PipelineValidator, ValidationResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Creates engines for runs that did not set one explicitly, and for
/// sub-pipeline execution. Injected per pipeline; there is no process-wide
/// default.
pub type EngineFactory = Arc<dyn Fn() -> Arc<dyn Engine> + Send + Sync>;

/// A named DAG of components, runnable by an engine.
pub struct Pipeline {
    name: String,
    version: String,
    description: String,
    components: HashMap<String, Arc<dyn Component>>,
    component_order: Vec<String>,
    connections: Vec<Connection>,
    config: PipelineConfig,
    metadata: HashMap<String, Value>,
    component_costs: HashMap<String, u64>,
    engine: Option<Arc<dyn Engine>>,
    engine_factory: EngineFactory,
    context: Arc<ExecutionContext>,
    construction_errors: Vec<ComponentError>,
    error_collector: Arc<ErrorCollector>,
    error_handler: Arc<dyn ErrorHandler>,
    events: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates a pipeline with the default configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, PipelineConfig::default())
    }

    /// Creates a pipeline with a custom configuration.
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: PipelineConfig) -> Self {
        let handler = Arc::new(DefaultErrorHandler::new(config.retry_policy.max_retries));
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            description: String::new(),
            components: HashMap::new(),
            component_order: Vec::new(),
            connections: Vec::new(),
            config,
            metadata: HashMap::new(),
            component_costs: HashMap::new(),
            engine: None,
            engine_factory: Arc::new(|| Arc::new(ConcurrentEngine::new()) as Arc<dyn Engine>),
            context: Arc::new(ExecutionContext::new()),
            construction_errors: Vec::new(),
            error_collector: Arc::new(ErrorCollector::new()),
            error_handler: handler,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Attaches a component under the given name, stamping the name onto it.
    ///
    /// Duplicate component names and duplicate port names within the
    /// component are recorded as construction errors.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        mut component: impl Component + 'static,
    ) -> &mut Self {
        let name = name.into();
        if self.components.contains_key(&name) {
            self.record_construction_error(ComponentError::validation(
                format!("component '{name}' is already attached"),
                &name,
            ));
            return self;
        }

        component.set_name(&name);

        for (kind, ports) in [("input", component.input_ports()), ("output", component.output_ports())]
        {
            let mut seen = HashSet::new();
            for port in ports {
                if !seen.insert(port.name.clone()) {
                    self.record_construction_error(ComponentError::validation(
                        format!("duplicate {kind} port '{}' on component '{name}'", port.name),
                        &name,
                    ));
                }
            }
        }

        self.component_order.push(name.clone());
        self.components.insert(name, Arc::new(component));
        self
    }

    /// Connects an output port to an input port, checking that both ports
    /// exist and carry exactly the type `T`.
    ///
    /// Failures are recorded as construction errors and surface on `run`.
    pub fn connect<T: FlowType>(
        &mut self,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
    ) -> &mut Self {
        let expected = T::port_type();

        let Some(from) = self.components.get(from_component).cloned() else {
            self.record_construction_error(ComponentError::validation(
                format!("source component '{from_component}' not found"),
                from_component,
            ));
            return self;
        };
        let Some(to) = self.components.get(to_component).cloned() else {
            self.record_construction_error(ComponentError::validation(
                format!("sink component '{to_component}' not found"),
                to_component,
            ));
            return self;
        };

        if let Err(err) = check_port(&from.output_ports(), from_port, &expected, from_component, "output")
        {
            self.record_construction_error(err);
            return self;
        }
        if let Err(err) = check_port(&to.input_ports(), to_port, &expected, to_component, "input") {
            self.record_construction_error(err);
            return self;
        }

        if self
            .connections
            .iter()
            .any(|c| c.feeds(to_component, to_port))
        {
            self.record_construction_error(ComponentError::validation(
                format!(
                    "input port '{to_port}' of component '{to_component}' already has an inbound connection"
                ),
                to_component,
            ));
            return self;
        }

        self.connections.push(Connection::new(
            from_component,
            from_port,
            to_component,
            to_port,
            self.config.default_buffer_size,
        ));
        self
    }

    /// Declares (or finds) a connection and attaches a transform to it.
    pub fn connect_with_transform(
        &mut self,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
        transform: Arc<dyn Transform>,
    ) -> &mut Self {
        let index = self.find_or_create_connection(from_component, from_port, to_component, to_port);
        self.connections[index].transform = Some(transform);
        self
    }

    /// Declares (or finds) a connection and attaches backpressure config.
    pub fn connect_with_backpressure(
        &mut self,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
        backpressure: BackpressureConfig,
    ) -> &mut Self {
        let index = self.find_or_create_connection(from_component, from_port, to_component, to_port);
        self.connections[index].backpressure = Some(backpressure);
        self
    }

    /// Overrides the buffer size of an existing connection.
    pub fn set_connection_buffer_size(
        &mut self,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
        buffer_size: usize,
    ) -> &mut Self {
        if let Some(conn) = self
            .connections
            .iter_mut()
            .find(|c| c.matches(from_component, from_port, to_component, to_port))
        {
            conn.buffer_size = buffer_size;
        }
        self
    }

    fn find_or_create_connection(
        &mut self,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
    ) -> usize {
        if let Some(index) = self
            .connections
            .iter()
            .position(|c| c.matches(from_component, from_port, to_component, to_port))
        {
            return index;
        }
        self.connections.push(Connection::new(
            from_component,
            from_port,
            to_component,
            to_port,
            self.config.default_buffer_size,
        ));
        self.connections.len() - 1
    }

    fn record_construction_error(&mut self, err: ComponentError) {
        self.construction_errors.push(err);
    }

    /// Sets the execution engine.
    pub fn set_engine(&mut self, engine: Arc<dyn Engine>) -> &mut Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the factory used when no engine is set and for sub-pipeline runs.
    pub fn set_engine_factory(&mut self, factory: EngineFactory) -> &mut Self {
        self.engine_factory = factory;
        self
    }

    /// Sets the lifecycle event sink.
    pub fn set_event_sink(&mut self, events: Arc<dyn EventSink>) -> &mut Self {
        self.events = events;
        self
    }

    /// Sets the error handler consulted at the process-call boundary.
    pub fn set_error_handler(&mut self, handler: Arc<dyn ErrorHandler>) -> &mut Self {
        self.error_handler = handler;
        self
    }

    /// Declares a cost hint for a component, used as its critical-path
    /// weight (default 1).
    pub fn set_component_cost(&mut self, name: impl Into<String>, cost: u64) -> &mut Self {
        self.component_costs.insert(name.into(), cost);
        self
    }

    /// Returns the critical-path weight of a component.
    #[must_use]
    pub fn component_cost(&self, name: &str) -> u64 {
        self.component_costs.get(name).copied().unwrap_or(1)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the pipeline version.
    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = version.into();
        self
    }

    /// Sets the pipeline description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: PipelineConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Sets a metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Returns component names in attach order.
    #[must_use]
    pub fn component_names(&self) -> Vec<String> {
        self.component_order.clone()
    }

    /// Returns the component attached under the given name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).cloned()
    }

    /// Returns the declared connections in declaration order.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns the construction errors recorded so far.
    #[must_use]
    pub fn construction_errors(&self) -> &[ComponentError] {
        &self.construction_errors
    }

    /// Returns the execution context of the current/last run.
    #[must_use]
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Returns the runtime error collector.
    #[must_use]
    pub fn error_collector(&self) -> &Arc<ErrorCollector> {
        &self.error_collector
    }

    /// Returns the error handler.
    #[must_use]
    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.error_handler.clone()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Quick validation: construction errors, cycles, per-component checks.
    ///
    /// For the full diagnostic pass use
    /// [`Pipeline::validate_comprehensive`].
    pub fn validate(&self) -> Result<(), FlowError> {
        if let Some(first) = self.construction_errors.first() {
            return Err(FlowError::Construction {
                count: self.construction_errors.len(),
                first: first.to_string(),
            });
        }

        let graph = ComponentGraph::build(self);
        if !self.config.allow_cycles {
            if let Some(cycle) = graph.find_cycle() {
                return Err(FlowError::Validation(format!(
                    "cycle detected in pipeline graph: {}",
                    cycle.join(" -> ")
                )));
            }
        }

        for name in &self.component_order {
            if let Some(component) = self.components.get(name) {
                component.validate().map_err(FlowError::Component)?;
            }
        }

        Ok(())
    }

    /// Runs the comprehensive validation pass.
    #[must_use]
    pub fn validate_comprehensive(&self) -> ValidationResult {
        PipelineValidator::new().validate_comprehensive(self)
    }

    /// Returns the dependency graph.
    #[must_use]
    pub fn graph(&self) -> ComponentGraph {
        ComponentGraph::build(self)
    }

    /// Returns the topological order of components.
    pub fn topology_order(&self) -> Result<Vec<String>, FlowError> {
        self.graph()
            .topology_order()
            .map(<[String]>::to_vec)
            .ok_or_else(|| FlowError::Validation("pipeline graph has a cycle".to_string()))
    }

    /// Returns the critical path through the pipeline.
    pub fn critical_path(&self) -> Result<Vec<String>, FlowError> {
        let graph = self.graph();
        if graph.topology_order().is_none() {
            return Err(FlowError::Validation("pipeline graph has a cycle".to_string()));
        }
        Ok(graph.critical_path().to_vec())
    }

    /// Runs the pipeline with no external channels.
    pub async fn run(&self, cancel: CancelToken) -> Result<(), FlowError> {
        self.run_with_channels(cancel, ExternalChannels::new()).await
    }

    /// Runs the pipeline, feeding and draining the given external channels.
    pub async fn run_with_channels(
        &self,
        cancel: CancelToken,
        external: ExternalChannels,
    ) -> Result<(), FlowError> {
        if let Some(first) = self.construction_errors.first() {
            return Err(FlowError::Construction {
                count: self.construction_errors.len(),
                first: first.to_string(),
            });
        }
        let engine = self
            .engine
            .clone()
            .unwrap_or_else(|| (self.engine_factory)());
        engine.run(self, cancel, external).await
    }

    /// Initializes all components in attach order.
    pub async fn initialize_components(&self, ctx: &ProcessContext) -> Result<(), FlowError> {
        for name in &self.component_order {
            if let Some(component) = self.components.get(name) {
                component
                    .initialize(ctx)
                    .await
                    .map_err(FlowError::Component)?;
            }
        }
        Ok(())
    }

    /// Cleans up all components in reverse attach order. Cleanup failures are
    /// collected, never propagated.
    pub async fn cleanup_components(&self, ctx: &ProcessContext) {
        for name in self.component_order.iter().rev() {
            if let Some(component) = self.components.get(name) {
                if let Err(err) = component.cleanup(ctx).await {
                    warn!(component = %name, error = %err, "component cleanup failed");
                    self.error_collector.collect(err);
                }
            }
        }
    }

    fn exposed_input_ports(&self) -> Vec<Port> {
        let mut ports = Vec::new();
        for name in &self.component_order {
            let Some(component) = self.components.get(name) else {
                continue;
            };
            for port in component.input_ports() {
                let connected = self.connections.iter().any(|c| c.feeds(name, &port.name));
                if !connected {
                    ports.push(port);
                }
            }
        }
        ports
    }

    fn exposed_output_ports(&self) -> Vec<Port> {
        let mut ports = Vec::new();
        for name in &self.component_order {
            let Some(component) = self.components.get(name) else {
                continue;
            };
            for port in component.output_ports() {
                let connected = self
                    .connections
                    .iter()
                    .any(|c| c.sourced_from(name, &port.name));
                if !connected {
                    ports.push(port);
                }
            }
        }
        ports
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("components", &self.component_order)
            .field("connections", &self.connections.len())
            .field("construction_errors", &self.construction_errors.len())
            .finish()
    }
}

fn check_port(
    ports: &[Port],
    name: &str,
    expected: &PortType,
    component: &str,
    direction: &str,
) -> Result<(), ComponentError> {
    let Some(port) = ports.iter().find(|p| p.name == name) else {
        return Err(ComponentError::validation(
            format!("{direction} port '{name}' not found in component '{component}'"),
            component,
        ));
    };
    if &port.ty != expected {
        return Err(ComponentError::validation(
            format!(
                "{direction} port '{name}' of component '{component}' has type {}, but the connection expects {expected}",
                port.ty
            ),
            component,
        ));
    }
    Ok(())
}

/// A pipeline is itself a component: its unconnected input ports are the
/// composite's inputs, its unconnected outputs the composite's outputs.
#[async_trait]
impl Component for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        self.exposed_input_ports()
    }

    fn output_ports(&self) -> Vec<Port> {
        self.exposed_output_ports()
    }

    /// Runs the contained pipeline on an engine from the injected factory.
    ///
    /// External inputs are pushed into per-port channels before the run;
    /// outputs are drained only after the engine has completed, so no value
    /// is lost to an early close.
    async fn process(
        &self,
        ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let engine = self
            .engine
            .clone()
            .unwrap_or_else(|| (self.engine_factory)());

        let mut external = ExternalChannels::new();
        for port in self.exposed_input_ports() {
            let (tx, rx) = mpsc::channel(1);
            if let Some(value) = inputs.get(&port.name) {
                // Capacity 1 and a single value, so this cannot fail.
                let _ = tx.try_send(value.clone());
            }
            drop(tx);
            external.inputs.insert(port.name.clone(), rx);
        }

        let mut output_rxs = Vec::new();
        for port in self.exposed_output_ports() {
            let (tx, rx) = mpsc::channel(1);
            external.outputs.insert(port.name.clone(), tx);
            output_rxs.push((port.name.clone(), rx));
        }

        engine
            .run(self, ctx.cancel_token().clone(), external)
            .await
            .map_err(|err| {
                ComponentError::new(
                    format!("sub-pipeline '{}' failed: {err}", self.name),
                    &self.name,
                    ErrorKind::Runtime,
                    Severity::Error,
                    false,
                )
                .with_source(err)
            })?;

        let mut outputs = PortValues::new();
        for (name, mut rx) in output_rxs {
            if let Some(value) = rx.recv().await {
                outputs.insert(name, value);
            }
        }
        Ok(outputs)
    }

    /// Flags construction errors and exposed-port name collisions.
    fn validate(&self) -> Result<(), ComponentError> {
        if let Some(first) = self.construction_errors.first() {
            return Err(first.clone());
        }

        for (kind, ports) in [
            ("input", self.exposed_input_ports()),
            ("output", self.exposed_output_ports()),
        ] {
            let mut seen = HashSet::new();
            for port in ports {
                if !seen.insert(port.name.clone()) {
                    return Err(ComponentError::validation(
                        format!(
                            "exposed {kind} port '{}' collides across components of pipeline '{}'",
                            port.name, self.name
                        ),
                        &self.name,
                    ));
                }
            }
        }
        Ok(())
    }

    async fn health_check(&self, ctx: &ProcessContext) -> Result<(), ComponentError> {
        for name in &self.component_order {
            if let Some(component) = self.components.get(name) {
                component.health_check(ctx).await?;
            }
        }
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn tags(&self) -> Vec<String> {
        vec!["pipeline".to_string(), "composite".to_string()]
    }
}
