//! Comprehensive pipeline validation.
//!
//! The validation pass accumulates diagnostics instead of short-circuiting:
//! component checks, connection checks, schema-aware type checks, graph
//! structure (cycles, connectivity), configuration, and resource hints all
//! run, and the result is invalid only when a diagnostic of severity Error
//! or above was produced.

use crate::errors::Severity;
use crate::graph::ComponentGraph;
use crate::pipeline::Pipeline;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Kind of a validation error diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Unclassified failure.
    Unknown,
    /// A connection references a component that does not exist.
    MissingComponent,
    /// A referenced port does not exist, or a required input is unconnected.
    MissingPort,
    /// Connected ports carry incompatible types or schemas.
    TypeMismatch,
    /// The graph contains a dependency cycle.
    Cycle,
    /// A component is unreachable from the rest of the graph.
    Disconnected,
    /// The pipeline configuration violates an invariant.
    InvalidConfiguration,
    /// A resource limit is exceeded or unset.
    ResourceLimit,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::MissingComponent => "MISSING_COMPONENT",
            Self::MissingPort => "MISSING_PORT",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::Cycle => "CYCLE",
            Self::Disconnected => "DISCONNECTED",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::ResourceLimit => "RESOURCE_LIMIT",
        };
        f.write_str(s)
    }
}

/// Kind of a validation warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// An output port has no outbound connection.
    Unused,
    /// A setting may hurt performance.
    Performance,
    /// A setting looks suspicious but is not fatal.
    Configuration,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unused => "UNUSED",
            Self::Performance => "PERFORMANCE",
            Self::Configuration => "CONFIGURATION",
        };
        f.write_str(s)
    }
}

/// A single validation error diagnostic.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Diagnostic kind.
    pub kind: IssueKind,
    /// Component involved, if any.
    pub component: Option<String>,
    /// Port involved, if any.
    pub port: Option<String>,
    /// Connection involved, if any.
    pub connection: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Severity; the result is invalid when any diagnostic is ≥ Error.
    pub severity: Severity,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind,
            component: None,
            port: None,
            connection: None,
            message: message.into(),
            severity,
        }
    }

    fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }
}

/// A single validation warning.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Warning kind.
    pub kind: WarningKind,
    /// Component involved, if any.
    pub component: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl ValidationWarning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            component: None,
            message: message.into(),
        }
    }

    fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

/// Outcome of a comprehensive validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// True when no diagnostic of severity Error or above was produced.
    pub valid: bool,
    /// Error diagnostics.
    pub errors: Vec<ValidationIssue>,
    /// Warnings.
    pub warnings: Vec<ValidationWarning>,
    /// The dependency graph, when construction succeeded.
    pub graph: Option<ComponentGraph>,
}

impl ValidationResult {
    /// Returns the first diagnostic of severity Error or above, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&ValidationIssue> {
        self.errors.iter().find(|e| e.severity >= Severity::Error)
    }
}

/// Validates pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineValidator;

impl PipelineValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs the full validation pass with no externally supplied inputs.
    #[must_use]
    pub fn validate_comprehensive(&self, pipeline: &Pipeline) -> ValidationResult {
        self.validate_with_inputs(pipeline, &HashSet::new())
    }

    /// Runs the full validation pass.
    ///
    /// `external_inputs` names input ports that will be fed by external
    /// channels at run time; required ports in that set are not reported as
    /// missing. Engines pass the keys of their external input map.
    #[must_use]
    pub fn validate_with_inputs(
        &self,
        pipeline: &Pipeline,
        external_inputs: &HashSet<String>,
    ) -> ValidationResult {
        let mut result = ValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            graph: None,
        };

        let graph = ComponentGraph::build(pipeline);

        self.check_components(pipeline, external_inputs, &mut result);
        self.check_connections(pipeline, &mut result);
        self.check_schemas(pipeline, &mut result);
        self.check_graph(pipeline, &graph, &mut result);
        self.check_configuration(pipeline, &mut result);
        self.check_resources(pipeline, &mut result);

        result.graph = Some(graph);
        if result.errors.iter().any(|e| e.severity >= Severity::Error) {
            result.valid = false;
        }
        result
    }

    fn check_components(
        &self,
        pipeline: &Pipeline,
        external_inputs: &HashSet<String>,
        result: &mut ValidationResult,
    ) {
        for name in pipeline.component_names() {
            let Some(component) = pipeline.component(&name) else {
                continue;
            };

            if let Err(err) = component.validate() {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::InvalidConfiguration,
                        format!("component validation failed: {err}"),
                        Severity::Error,
                    )
                    .with_component(&name),
                );
            }

            for port in component.input_ports() {
                if !port.required {
                    continue;
                }
                let connected = pipeline
                    .connections()
                    .iter()
                    .any(|c| c.feeds(&name, &port.name));
                if !connected && !external_inputs.contains(&port.name) {
                    result.errors.push(
                        ValidationIssue::new(
                            IssueKind::MissingPort,
                            format!("required input port '{}' is not connected", port.name),
                            Severity::Error,
                        )
                        .with_component(&name)
                        .with_port(&port.name),
                    );
                }
            }

            for port in component.output_ports() {
                let connected = pipeline
                    .connections()
                    .iter()
                    .any(|c| c.sourced_from(&name, &port.name));
                if !connected {
                    result.warnings.push(
                        ValidationWarning::new(
                            WarningKind::Unused,
                            format!("output port '{}' is not connected", port.name),
                        )
                        .with_component(&name),
                    );
                }
            }
        }
    }

    fn check_connections(&self, pipeline: &Pipeline, result: &mut ValidationResult) {
        let mut inbound_seen: HashMap<(String, String), usize> = HashMap::new();

        for conn in pipeline.connections() {
            let Some(from) = pipeline.component(&conn.from_component) else {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::MissingComponent,
                        format!("source component '{}' not found", conn.from_component),
                        Severity::Critical,
                    )
                    .with_component(&conn.from_component)
                    .with_connection(&conn.name),
                );
                continue;
            };
            let Some(to) = pipeline.component(&conn.to_component) else {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::MissingComponent,
                        format!("sink component '{}' not found", conn.to_component),
                        Severity::Critical,
                    )
                    .with_component(&conn.to_component)
                    .with_connection(&conn.name),
                );
                continue;
            };

            let from_port = from
                .output_ports()
                .into_iter()
                .find(|p| p.name == conn.from_port);
            let Some(from_port) = from_port else {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::MissingPort,
                        format!(
                            "output port '{}' not found in component '{}'",
                            conn.from_port, conn.from_component
                        ),
                        Severity::Error,
                    )
                    .with_component(&conn.from_component)
                    .with_port(&conn.from_port)
                    .with_connection(&conn.name),
                );
                continue;
            };

            let to_port = to
                .input_ports()
                .into_iter()
                .find(|p| p.name == conn.to_port);
            let Some(to_port) = to_port else {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::MissingPort,
                        format!(
                            "input port '{}' not found in component '{}'",
                            conn.to_port, conn.to_component
                        ),
                        Severity::Error,
                    )
                    .with_component(&conn.to_component)
                    .with_port(&conn.to_port)
                    .with_connection(&conn.name),
                );
                continue;
            };

            // Fan-in at a sink input is disallowed; use an explicit merge
            // component instead.
            let sink_key = (conn.to_component.clone(), conn.to_port.clone());
            let count = inbound_seen.entry(sink_key).or_insert(0);
            *count += 1;
            if *count == 2 {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::InvalidConfiguration,
                        format!(
                            "input port '{}' of component '{}' receives more than one connection",
                            conn.to_port, conn.to_component
                        ),
                        Severity::Error,
                    )
                    .with_component(&conn.to_component)
                    .with_port(&conn.to_port)
                    .with_connection(&conn.name),
                );
            }

            if let Some(transform) = &conn.transform {
                if !from_port.ty.compatible(&transform.input_type())
                    || !transform.output_type().compatible(&to_port.ty)
                {
                    result.errors.push(
                        ValidationIssue::new(
                            IssueKind::TypeMismatch,
                            format!(
                                "transform '{}' does not bridge {} ({}) to {} ({})",
                                transform.name(),
                                conn.from_port,
                                from_port.ty,
                                conn.to_port,
                                to_port.ty
                            ),
                            Severity::Error,
                        )
                        .with_component(&conn.from_component)
                        .with_port(&conn.from_port)
                        .with_connection(&conn.name),
                    );
                }
            } else if from_port.ty != to_port.ty {
                result.errors.push(
                    ValidationIssue::new(
                        IssueKind::TypeMismatch,
                        format!(
                            "type mismatch: cannot connect {} ({}) to {} ({})",
                            conn.from_port, from_port.ty, conn.to_port, to_port.ty
                        ),
                        Severity::Error,
                    )
                    .with_component(&conn.from_component)
                    .with_port(&conn.from_port)
                    .with_connection(&conn.name),
                );
            }

            if let (Some(from_schema), Some(to_schema)) = (&from_port.schema, &to_port.schema) {
                if conn.transform.is_none() && !from_schema.compatible(to_schema) {
                    result.errors.push(
                        ValidationIssue::new(
                            IssueKind::TypeMismatch,
                            format!(
                                "schema incompatibility between {}.{} and {}.{}",
                                conn.from_component,
                                conn.from_port,
                                conn.to_component,
                                conn.to_port
                            ),
                            Severity::Error,
                        )
                        .with_component(&conn.from_component)
                        .with_port(&conn.from_port)
                        .with_connection(&conn.name),
                    );
                }
            }

            if conn.buffer_size == 0 {
                result.warnings.push(
                    ValidationWarning::new(
                        WarningKind::Configuration,
                        format!("connection '{}' has zero buffer size", conn.name),
                    )
                    .with_component(&conn.from_component),
                );
            }
        }
    }

    /// Schema-aware pass: re-checks compatibility through `Schema::compatible`
    /// even for edges whose declared types already matched.
    fn check_schemas(&self, pipeline: &Pipeline, result: &mut ValidationResult) {
        for conn in pipeline.connections() {
            if conn.transform.is_some() {
                continue;
            }
            let (Some(from), Some(to)) = (
                pipeline.component(&conn.from_component),
                pipeline.component(&conn.to_component),
            ) else {
                continue;
            };
            let from_port = from
                .output_ports()
                .into_iter()
                .find(|p| p.name == conn.from_port);
            let to_port = to
                .input_ports()
                .into_iter()
                .find(|p| p.name == conn.to_port);
            let (Some(from_port), Some(to_port)) = (from_port, to_port) else {
                continue;
            };

            if let (Some(from_schema), Some(to_schema)) = (&from_port.schema, &to_port.schema) {
                if from_schema.port_type() != to_schema.port_type()
                    && !from_schema.compatible(to_schema)
                {
                    result.errors.push(
                        ValidationIssue::new(
                            IssueKind::TypeMismatch,
                            format!(
                                "declared schemas of {}.{} and {}.{} are incompatible",
                                conn.from_component,
                                conn.from_port,
                                conn.to_component,
                                conn.to_port
                            ),
                            Severity::Error,
                        )
                        .with_connection(&conn.name),
                    );
                }
            }
        }
    }

    fn check_graph(
        &self,
        pipeline: &Pipeline,
        graph: &ComponentGraph,
        result: &mut ValidationResult,
    ) {
        // Cycle detection runs regardless of allow_cycles; the flag only
        // downgrades the diagnostic.
        if let Some(cycle) = graph.find_cycle() {
            let message = format!("cycle detected in pipeline graph: {}", cycle.join(" -> "));
            if pipeline.config().allow_cycles {
                result
                    .warnings
                    .push(ValidationWarning::new(WarningKind::Configuration, message));
            } else {
                result.errors.push(
                    ValidationIssue::new(IssueKind::Cycle, message, Severity::Error)
                        .with_component(cycle[0].clone()),
                );
            }
        }

        let groups = graph.connectivity_groups();
        if groups.len() > 1 {
            for (i, group) in groups.iter().enumerate() {
                if group.len() == 1 {
                    result.warnings.push(
                        ValidationWarning::new(
                            WarningKind::Configuration,
                            format!(
                                "component '{}' is disconnected from the main pipeline",
                                group[0]
                            ),
                        )
                        .with_component(group[0].clone()),
                    );
                } else {
                    result.warnings.push(ValidationWarning::new(
                        WarningKind::Configuration,
                        format!("disconnected component group {}: {:?}", i + 1, group),
                    ));
                }
            }
        }
    }

    fn check_configuration(&self, pipeline: &Pipeline, result: &mut ValidationResult) {
        let config = pipeline.config();

        if config.max_concurrency == 0 {
            result.errors.push(ValidationIssue::new(
                IssueKind::InvalidConfiguration,
                "max_concurrency must be positive".to_string(),
                Severity::Error,
            ));
        }

        if config.timeout == Duration::ZERO {
            result.errors.push(ValidationIssue::new(
                IssueKind::InvalidConfiguration,
                "timeout must be positive".to_string(),
                Severity::Error,
            ));
        }

        if config.default_buffer_size == 0 {
            result.errors.push(ValidationIssue::new(
                IssueKind::InvalidConfiguration,
                "default_buffer_size must be positive".to_string(),
                Severity::Error,
            ));
        }

        if config.max_buffer_size < config.default_buffer_size {
            result.errors.push(ValidationIssue::new(
                IssueKind::InvalidConfiguration,
                format!(
                    "max_buffer_size ({}) is less than default_buffer_size ({})",
                    config.max_buffer_size, config.default_buffer_size
                ),
                Severity::Error,
            ));
        }
    }

    fn check_resources(&self, pipeline: &Pipeline, result: &mut ValidationResult) {
        let config = pipeline.config();

        if config.memory_limit_bytes == 0 {
            result.warnings.push(ValidationWarning::new(
                WarningKind::Configuration,
                "no memory limit set, pipeline may consume excessive memory".to_string(),
            ));
        }

        if config.cpu_limit_fraction <= 0.0 {
            result.warnings.push(ValidationWarning::new(
                WarningKind::Configuration,
                "no CPU limit set, pipeline may consume excessive CPU".to_string(),
            ));
        }

        // Rough per-component footprint estimate of 1 MiB.
        let estimated = pipeline.component_names().len() as u64 * 1024 * 1024;
        if config.memory_limit_bytes > 0 && estimated > config.memory_limit_bytes {
            result.warnings.push(ValidationWarning::new(
                WarningKind::Performance,
                format!(
                    "estimated memory usage ({estimated} bytes) may exceed limit ({} bytes)",
                    config.memory_limit_bytes
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Port, PortType, PortValues, ProcessContext};
    use crate::components::{StringSink, StringSource, Uppercase};
    use crate::errors::ComponentError;
    use crate::pipeline::{Pipeline, PipelineConfig};
    use async_trait::async_trait;
    use serde_json::Value;

    /// Pass-through with optional-input `in` and output `out`, both Any.
    #[derive(Debug)]
    struct Relay {
        name: String,
        required: bool,
    }

    impl Relay {
        fn new() -> Self {
            Self {
                name: String::new(),
                required: false,
            }
        }

        fn required() -> Self {
            Self {
                name: String::new(),
                required: true,
            }
        }
    }

    #[async_trait]
    impl Component for Relay {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_name(&mut self, name: &str) {
            self.name = name.to_string();
        }

        fn input_ports(&self) -> Vec<Port> {
            let port = Port::input("in", PortType::Any);
            vec![if self.required { port.required() } else { port }]
        }

        fn output_ports(&self) -> Vec<Port> {
            vec![Port::output("out", PortType::Any)]
        }

        async fn process(
            &self,
            _ctx: &ProcessContext,
            inputs: PortValues,
        ) -> Result<PortValues, ComponentError> {
            let value = inputs.into_values().next().unwrap_or(Value::Null);
            Ok(PortValues::from([("out".to_string(), value)]))
        }
    }

    /// Sink with a required integer input.
    #[derive(Debug, Default)]
    struct IntSink {
        name: String,
    }

    #[async_trait]
    impl Component for IntSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_name(&mut self, name: &str) {
            self.name = name.to_string();
        }

        fn input_ports(&self) -> Vec<Port> {
            vec![Port::input("input", PortType::Integer).required()]
        }

        fn output_ports(&self) -> Vec<Port> {
            Vec::new()
        }

        async fn process(
            &self,
            _ctx: &ProcessContext,
            _inputs: PortValues,
        ) -> Result<PortValues, ComponentError> {
            Ok(PortValues::new())
        }
    }

    fn uppercase_pipeline() -> Pipeline {
        let mut p = Pipeline::new("simple");
        p.add_component("src", StringSource::new("hello"));
        p.add_component("upper", Uppercase::new());
        p.add_component("sink", StringSink::new());
        p.connect::<String>("src", "output", "upper", "input");
        p.connect::<String>("upper", "output", "sink", "input");
        p
    }

    #[test]
    fn test_valid_linear_pipeline_is_clean() {
        let p = uppercase_pipeline();
        let result = p.validate_comprehensive();

        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());

        let graph = result.graph.unwrap();
        assert_eq!(
            graph.topology_order().unwrap(),
            &["src".to_string(), "upper".to_string(), "sink".to_string()]
        );
        assert_eq!(
            graph.critical_path(),
            &["src".to_string(), "upper".to_string(), "sink".to_string()]
        );
    }

    #[test]
    fn test_cycle_invalidates_pipeline() {
        let mut p = Pipeline::new("cycle");
        p.add_component("a", Relay::new());
        p.add_component("b", Relay::new());
        p.add_component("c", Relay::new());
        p.connect::<Value>("a", "out", "b", "in");
        p.connect::<Value>("b", "out", "c", "in");
        p.connect::<Value>("c", "out", "a", "in");

        let result = p.validate_comprehensive();
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.kind == IssueKind::Cycle));
        assert!(result.graph.unwrap().topology_order().is_none());
    }

    #[test]
    fn test_allow_cycles_downgrades_to_warning() {
        let mut p = Pipeline::with_config(
            "cycle-ok",
            PipelineConfig::default().with_allow_cycles(true),
        );
        p.add_component("a", Relay::new());
        p.add_component("b", Relay::new());
        p.connect::<Value>("a", "out", "b", "in");
        p.connect::<Value>("b", "out", "a", "in");

        let result = p.validate_comprehensive();
        assert!(result.valid);
        assert!(result.errors.iter().all(|e| e.kind != IssueKind::Cycle));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("cycle detected")));
    }

    #[test]
    fn test_missing_required_input_port() {
        let mut p = Pipeline::new("missing");
        p.add_component("b", Relay::required());

        let result = p.validate_comprehensive();
        assert!(!result.valid);

        let issue = result
            .errors
            .iter()
            .find(|e| e.kind == IssueKind::MissingPort)
            .expect("expected a MissingPort diagnostic");
        assert_eq!(issue.component.as_deref(), Some("b"));
        assert_eq!(issue.port.as_deref(), Some("in"));
    }

    #[test]
    fn test_external_input_satisfies_required_port() {
        let mut p = Pipeline::new("external");
        p.add_component("b", Relay::required());

        let externals: HashSet<String> = ["in".to_string()].into();
        let result = PipelineValidator::new().validate_with_inputs(&p, &externals);
        assert!(result.errors.iter().all(|e| e.kind != IssueKind::MissingPort));
    }

    #[test]
    fn test_type_mismatch() {
        let mut p = Pipeline::new("mismatch");
        p.add_component("src", StringSource::new("hi"));
        p.add_component("sink", IntSink::default());
        // Bypass the typed connect so the mismatch reaches the validator.
        p.connect_with_backpressure(
            "src",
            "output",
            "sink",
            "input",
            crate::pipeline::BackpressureConfig::blocking(),
        );

        let result = p.validate_comprehensive();
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == IssueKind::TypeMismatch));
    }

    #[test]
    fn test_fan_in_rejected() {
        let mut p = Pipeline::new("fan-in");
        p.add_component("a", Relay::new());
        p.add_component("b", Relay::new());
        p.add_component("sink", Relay::new());
        p.connect::<Value>("a", "out", "sink", "in");
        // Second inbound edge to the same sink port, created unchecked.
        p.connect_with_backpressure(
            "b",
            "out",
            "sink",
            "in",
            crate::pipeline::BackpressureConfig::blocking(),
        );

        let result = p.validate_comprehensive();
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("more than one connection")));
    }

    #[test]
    fn test_unused_output_warning() {
        let mut p = Pipeline::new("unused");
        p.add_component("src", StringSource::new("x"));

        let result = p.validate_comprehensive();
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::Unused && w.component.as_deref() == Some("src")));
    }

    #[test]
    fn test_disconnected_groups_warn() {
        let mut p = Pipeline::new("islands");
        p.add_component("a", Relay::new());
        p.add_component("b", Relay::new());
        p.add_component("c", Relay::new());
        p.connect::<Value>("a", "out", "b", "in");

        let result = p.validate_comprehensive();
        assert!(result
            .warnings
            .iter()
            .any(|w| w.message.contains("disconnected")));
    }

    #[test]
    fn test_configuration_invariants() {
        let mut config = PipelineConfig::default();
        config.max_concurrency = 0;
        config.default_buffer_size = 0;
        config.max_buffer_size = 0;
        config.timeout = Duration::ZERO;

        let p = Pipeline::with_config("bad-config", config);
        let result = p.validate_comprehensive();

        assert!(!result.valid);
        let config_errors = result
            .errors
            .iter()
            .filter(|e| e.kind == IssueKind::InvalidConfiguration)
            .count();
        assert!(config_errors >= 3);
    }

    #[test]
    fn test_validator_idempotent() {
        let p = uppercase_pipeline();
        let first = p.validate_comprehensive();
        let second = p.validate_comprehensive();

        assert_eq!(first.valid, second.valid);
        assert_eq!(first.errors.len(), second.errors.len());
        assert_eq!(first.warnings.len(), second.warnings.len());
        for (a, b) in first.errors.iter().zip(second.errors.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.message, b.message);
        }
    }
}
