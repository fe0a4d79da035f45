//! Per-edge value transforms.
//!
//! A transform is a typed adapter declared on a connection; it runs on the
//! receiver side before the value is handed to `process`. The declared input
//! and output types let the validator accept edges whose endpoint types
//! differ, as long as the adapter bridges them.

use super::port::PortType;
use crate::errors::ComponentError;
use async_trait::async_trait;
use serde_json::Value;

/// A typed value adapter for a connection.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Name of the transform.
    fn name(&self) -> &str;

    /// Type accepted from the source port.
    fn input_type(&self) -> PortType {
        PortType::Any
    }

    /// Type delivered to the sink port.
    fn output_type(&self) -> PortType {
        PortType::Any
    }

    /// Applies the transform to a value.
    async fn apply(&self, value: Value) -> Result<Value, ComponentError>;
}

/// Passes values through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

#[async_trait]
impl Transform for IdentityTransform {
    fn name(&self) -> &str {
        "identity"
    }

    async fn apply(&self, value: Value) -> Result<Value, ComponentError> {
        Ok(value)
    }
}

/// Uppercases string values.
#[derive(Debug, Clone, Copy, Default)]
pub struct UppercaseTransform;

#[async_trait]
impl Transform for UppercaseTransform {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn input_type(&self) -> PortType {
        PortType::String
    }

    fn output_type(&self) -> PortType {
        PortType::String
    }

    async fn apply(&self, value: Value) -> Result<Value, ComponentError> {
        let s = value.as_str().ok_or_else(|| {
            ComponentError::validation("uppercase transform expects a string", "uppercase")
        })?;
        Ok(Value::String(s.to_uppercase()))
    }
}

/// Renders any value as its string representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringifyTransform;

#[async_trait]
impl Transform for StringifyTransform {
    fn name(&self) -> &str {
        "stringify"
    }

    fn output_type(&self) -> PortType {
        PortType::String
    }

    async fn apply(&self, value: Value) -> Result<Value, ComponentError> {
        let s = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Value::String(s))
    }
}

/// A transform built from a closure.
pub struct FnTransform<F>
where
    F: Fn(Value) -> Result<Value, ComponentError> + Send + Sync,
{
    name: String,
    input: PortType,
    output: PortType,
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(Value) -> Result<Value, ComponentError> + Send + Sync,
{
    /// Creates a closure-backed transform with declared endpoint types.
    pub fn new(name: impl Into<String>, input: PortType, output: PortType, func: F) -> Self {
        Self {
            name: name.into(),
            input,
            output,
            func,
        }
    }
}

#[async_trait]
impl<F> Transform for FnTransform<F>
where
    F: Fn(Value) -> Result<Value, ComponentError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn input_type(&self) -> PortType {
        self.input.clone()
    }

    fn output_type(&self) -> PortType {
        self.output.clone()
    }

    async fn apply(&self, value: Value) -> Result<Value, ComponentError> {
        (self.func)(value)
    }
}
