//! File reading and writing components.

use crate::component::{
    Component, ComponentInfo, NotNull, Port, PortType, PortValues, ProcessContext, Schema,
};
use crate::errors::{ComponentError, Severity};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Reads a whole file into its `output` port as a string.
#[derive(Debug)]
pub struct FileReader {
    info: ComponentInfo,
    path: PathBuf,
}

impl FileReader {
    /// Creates a reader for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            info: ComponentInfo::new("Reads content from a file").with_tags(&["source", "file", "io"]),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Component for FileReader {
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
            .with_description("File content")
            .with_schema(Schema::new(PortType::String, "File content as string"))]
    }

    fn validate(&self) -> Result<(), ComponentError> {
        if self.path.as_os_str().is_empty() {
            return Err(ComponentError::configuration("file path is empty", self.name()));
        }
        Ok(())
    }

    async fn initialize(&self, _ctx: &ProcessContext) -> Result<(), ComponentError> {
        tokio::fs::metadata(&self.path).await.map_err(|err| {
            ComponentError::resource(
                format!("cannot read file '{}'", self.path.display()),
                self.name(),
            )
            .with_source(err)
        })?;
        Ok(())
    }

    async fn health_check(&self, _ctx: &ProcessContext) -> Result<(), ComponentError> {
        tokio::fs::metadata(&self.path).await.map_err(|err| {
            ComponentError::resource(
                format!("file health check failed for '{}'", self.path.display()),
                self.name(),
            )
            .with_severity(Severity::Warning)
            .with_source(err)
        })?;
        Ok(())
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        _inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            ComponentError::runtime(
                format!("failed to read file '{}'", self.path.display()),
                self.name(),
            )
            .with_source(err)
        })?;
        Ok(PortValues::from([(
            "output".to_string(),
            Value::String(content),
        )]))
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn tags(&self) -> Vec<String> {
        self.info.tags.clone()
    }
}

/// Writes the string on its `input` port to a file.
#[derive(Debug)]
pub struct FileWriter {
    info: ComponentInfo,
    path: PathBuf,
}

impl FileWriter {
    /// Creates a writer for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            info: ComponentInfo::new("Writes content to a file").with_tags(&["sink", "file", "io"]),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Component for FileWriter {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn set_name(&mut self, name: &str) {
        self.info.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        vec![Port::input("input", PortType::String)
            .required()
            .with_description("Content to write to file")
            .with_schema(
                Schema::new(PortType::String, "Content to write").with_constraint(NotNull),
            )]
    }

    fn output_ports(&self) -> Vec<Port> {
        Vec::new()
    }

    fn validate(&self) -> Result<(), ComponentError> {
        if self.path.as_os_str().is_empty() {
            return Err(ComponentError::configuration("file path is empty", self.name()));
        }
        Ok(())
    }

    async fn process(
        &self,
        _ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let input = inputs.get("input").and_then(Value::as_str).ok_or_else(|| {
            ComponentError::validation("input is not a string", self.name())
        })?;
        tokio::fs::write(&self.path, input).await.map_err(|err| {
            ComponentError::runtime(
                format!("failed to write file '{}'", self.path.display()),
                self.name(),
            )
            .with_source(err)
        })?;
        Ok(PortValues::new())
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
    use serde_json::json;

    fn temp_path(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{prefix}-{}.txt", uuid::Uuid::new_v4().simple()))
    }

    #[tokio::test]
    async fn test_reader_round_trips_writer() {
        let path = temp_path("flowforge-file");
        let ctx = ProcessContext::detached();

        let mut writer = FileWriter::new(&path);
        writer.set_name("writer");
        writer
            .process(
                &ctx,
                PortValues::from([("input".to_string(), json!("line one\nline two"))]),
            )
            .await
            .unwrap();

        let mut reader = FileReader::new(&path);
        reader.set_name("reader");
        reader.initialize(&ctx).await.unwrap();
        let outputs = reader.process(&ctx, PortValues::new()).await.unwrap();

        assert_eq!(outputs["output"], json!("line one\nline two"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_reader_initialize_fails_for_missing_file() {
        let mut reader = FileReader::new(temp_path("flowforge-missing"));
        reader.set_name("reader");

        let err = reader
            .initialize(&ProcessContext::detached())
            .await
            .unwrap_err();
        assert!(err.recoverable);
    }

    #[test]
    fn test_empty_path_rejected() {
        let reader = FileReader::new("");
        assert!(reader.validate().is_err());

        let writer = FileWriter::new("");
        assert!(writer.validate().is_err());
    }
}
