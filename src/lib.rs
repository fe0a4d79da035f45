//! # Flowforge
//!
//! Typed dataflow pipelines: declare a DAG of components with named, typed
//! ports, validate it, and run it (sequentially or concurrently) with
//! backpressure, cancellation, and a resilience fabric of retries, error
//! handling policy, and circuit breakers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use flowforge::prelude::*;
//! use flowforge::components::{StringSink, StringSource, Uppercase};
//!
//! # async fn demo() -> Result<(), FlowError> {
//! let mut pipeline = Pipeline::new("simple");
//! pipeline.add_component("source", StringSource::new("hello"));
//! pipeline.add_component("upper", Uppercase::new());
//! pipeline.add_component("sink", StringSink::new());
//! pipeline.connect::<String>("source", "output", "upper", "input");
//! pipeline.connect::<String>("upper", "output", "sink", "input");
//!
//! pipeline.run(CancelToken::new()).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancel;
pub mod component;
pub mod components;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod validate;
pub mod viz;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::component::{
        Component, ComponentInfo, FlowType, Port, PortType, PortValues, ProcessContext, Schema,
        Transform,
    };
    pub use crate::engine::{ConcurrentEngine, Engine, ExternalChannels, SequentialEngine};
    pub use crate::errors::{
        ComponentError, ErrorCollector, ErrorKind, FlowError, Severity,
    };
    pub use crate::graph::ComponentGraph;
    pub use crate::observability::{
        CollectingEventSink, EventSink, LoggingEventSink, MetricsRecorder, NoOpEventSink,
    };
    pub use crate::pipeline::{
        BackpressureConfig, BackpressureStrategy, Connection, DropPolicy, ExecutionContext,
        Pipeline, PipelineConfig, PipelineStatus,
    };
    pub use crate::resilience::{
        CircuitBreaker, CircuitState, DefaultErrorHandler, ErrorAction, ErrorHandler, RetryPolicy,
    };
    pub use crate::validate::{PipelineValidator, ValidationResult};
}
