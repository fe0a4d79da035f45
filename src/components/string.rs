//! String processing components.

use crate::component::{
    Component, ComponentInfo, NotNull, Port, PortType, PortValues, ProcessContext, Schema,
    StringLength,
};
use crate::errors::ComponentError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;

fn string_input(inputs: &PortValues, port: &str, component: &str) -> Result<String, ComponentError> {
    inputs
        .get(port)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ComponentError::validation(format!("input '{port}' is not a string"), component)
        })
}

/// Produces a configured string value on its `output` port.
#[derive(Debug)]
pub struct StringSource {
    info: ComponentInfo,
    data: String,
}

impl StringSource {
    /// Creates a source emitting the given string.
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            info: ComponentInfo::new("Produces a string value").with_tags(&["source", "string"]),
            data: data.into(),
        }
    }
}

#[async_trait]
impl Component for StringSource {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn set_name(&mut self, name: &str) {
        self.info.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn output_ports(&self) -> Vec<Port> {
        vec![Port::output("output", PortType::String)
            .with_description("String output")
            .with_schema(Schema::new(PortType::String, "String output"))
            .with_example(json!("hello"))]
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        _inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        Ok(PortValues::from([(
            "output".to_string(),
            Value::String(self.data.clone()),
        )]))
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn tags(&self) -> Vec<String> {
        self.info.tags.clone()
    }
}

/// Records every string it receives on its `input` port.
///
/// Received values are inspectable through the handle returned by
/// [`StringSink::received_handle`], which stays valid after the sink has
/// been attached to a pipeline.
#[derive(Debug, Default)]
pub struct StringSink {
    info: ComponentInfo,
    received: Arc<RwLock<Vec<String>>>,
}

impl StringSink {
    /// Creates a sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            info: ComponentInfo::new("Consumes and records string values")
                .with_tags(&["sink", "string"]),
            received: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns a handle to the recorded values.
    #[must_use]
    pub fn received_handle(&self) -> Arc<RwLock<Vec<String>>> {
        self.received.clone()
    }
}

#[async_trait]
impl Component for StringSink {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn set_name(&mut self, name: &str) {
        self.info.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        vec![Port::input("input", PortType::String)
            .required()
            .with_description("String input to record")
            .with_schema(Schema::new(PortType::String, "String input").with_constraint(NotNull))
            .with_example(json!("hello world"))]
    }

    fn output_ports(&self) -> Vec<Port> {
        Vec::new()
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let input = string_input(&inputs, "input", self.name())?;
        self.received.write().push(input);
        Ok(PortValues::new())
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn tags(&self) -> Vec<String> {
        self.info.tags.clone()
    }
}

/// Uppercases the string on its `input` port.
#[derive(Debug, Default)]
pub struct Uppercase {
    info: ComponentInfo,
}

impl Uppercase {
    /// Creates an uppercase transform component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            info: ComponentInfo::new("Converts string input to uppercase")
                .with_tags(&["transform", "string", "case"]),
        }
    }

    fn schema() -> Schema {
        Schema::new(PortType::String, "String data")
            .with_constraint(NotNull)
            .with_constraint(StringLength { min: 1, max: 10_000 })
    }
}

#[async_trait]
impl Component for Uppercase {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn set_name(&mut self, name: &str) {
        self.info.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        vec![Port::input("input", PortType::String)
            .required()
            .with_description("String to convert to uppercase")
            .with_schema(Self::schema())
            .with_example(json!("hello"))]
    }

    fn output_ports(&self) -> Vec<Port> {
        vec![Port::output("output", PortType::String)
            .with_description("Uppercase string output")
            .with_schema(Self::schema())
            .with_example(json!("HELLO"))]
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let input = string_input(&inputs, "input", self.name())?;
        Ok(PortValues::from([(
            "output".to_string(),
            Value::String(input.to_uppercase()),
        )]))
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn tags(&self) -> Vec<String> {
        self.info.tags.clone()
    }
}

/// Keeps only the lines of its input containing a pattern.
#[derive(Debug)]
pub struct Grep {
    info: ComponentInfo,
    pattern: String,
}

impl Grep {
    /// Creates a grep component for the given pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            info: ComponentInfo::new("Filters lines containing a specific pattern")
                .with_tags(&["filter", "string", "pattern"]),
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
impl Component for Grep {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn set_name(&mut self, name: &str) {
        self.info.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        vec![Port::input("input", PortType::String)
            .required()
            .with_description("Text to filter")
            .with_schema(Schema::new(PortType::String, "Text content").with_constraint(NotNull))]
    }

    fn output_ports(&self) -> Vec<Port> {
        vec![Port::output("output", PortType::String).with_description("Filtered text output")]
    }

    fn validate(&self) -> Result<(), ComponentError> {
        if self.pattern.is_empty() {
            return Err(ComponentError::configuration(
                "pattern cannot be empty",
                self.name(),
            ));
        }
        Ok(())
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let input = string_input(&inputs, "input", self.name())?;
        let filtered: Vec<&str> = input
            .lines()
            .filter(|line| line.contains(&self.pattern))
            .collect();
        Ok(PortValues::from([(
            "output".to_string(),
            Value::String(filtered.join("\n")),
        )]))
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn tags(&self) -> Vec<String> {
        self.info.tags.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_source_emits_data() {
        let mut source = StringSource::new("hello world");
        source.set_name("src");

        let outputs = source
            .process(&ProcessContext::detached(), PortValues::new())
            .await
            .unwrap();
        assert_eq!(outputs["output"], json!("hello world"));
    }

    #[tokio::test]
    async fn test_string_sink_records() {
        let mut sink = StringSink::new();
        sink.set_name("sink");
        let handle = sink.received_handle();

        sink.process(
            &ProcessContext::detached(),
            PortValues::from([("input".to_string(), json!("a"))]),
        )
        .await
        .unwrap();

        assert_eq!(*handle.read(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_string_sink_rejects_non_string() {
        let mut sink = StringSink::new();
        sink.set_name("sink");

        let result = sink
            .process(
                &ProcessContext::detached(),
                PortValues::from([("input".to_string(), json!(5))]),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_uppercase() {
        let mut upper = Uppercase::new();
        upper.set_name("upper");

        let outputs = upper
            .process(
                &ProcessContext::detached(),
                PortValues::from([("input".to_string(), json!("hello"))]),
            )
            .await
            .unwrap();
        assert_eq!(outputs["output"], json!("HELLO"));
    }

    #[tokio::test]
    async fn test_grep_filters_lines() {
        let mut grep = Grep::new("flow");
        grep.set_name("grep");

        let outputs = grep
            .process(
                &ProcessContext::detached(),
                PortValues::from([("input".to_string(), json!("dataflow\nstream\nflow lines"))]),
            )
            .await
            .unwrap();
        assert_eq!(outputs["output"], json!("dataflow\nflow lines"));
    }

    #[test]
    fn test_grep_rejects_empty_pattern() {
        let grep = Grep::new("");
        assert!(grep.validate().is_err());
    }
}
