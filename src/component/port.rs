//! Port definitions and structural type descriptors.
//!
//! A port's type is a first-class structural value rather than a runtime
//! reflection handle, so connection legality is an explicit equality or
//! compatibility check between two descriptors.

use super::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Structural descriptor of the values a port carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    /// UTF-8 text.
    String,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean.
    Boolean,
    /// Homogeneous list with the given element type.
    Array(Box<PortType>),
    /// String-keyed map with the given value type.
    Object(Box<PortType>),
    /// Any value; acts as a wildcard in compatibility checks.
    Any,
}

impl PortType {
    /// Returns true if a value of `self` may flow into a port of `other`.
    ///
    /// `Any` on either side is a wildcard; containers recurse on their
    /// element types.
    #[must_use]
    pub fn compatible(&self, other: &PortType) -> bool {
        match (self, other) {
            (PortType::Any, _) | (_, PortType::Any) => true,
            (PortType::Array(a), PortType::Array(b))
            | (PortType::Object(a), PortType::Object(b)) => a.compatible(b),
            (a, b) => a == b,
        }
    }

    /// Returns the JSON Schema type name for this descriptor.
    #[must_use]
    pub fn json_type(&self) -> &'static str {
        match self {
            PortType::String => "string",
            PortType::Integer => "integer",
            PortType::Float => "number",
            PortType::Boolean => "boolean",
            PortType::Array(_) => "array",
            PortType::Object(_) => "object",
            PortType::Any => "any",
        }
    }

    /// Returns true if the JSON value matches this descriptor.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PortType::String => value.is_string(),
            PortType::Integer => value.is_i64() || value.is_u64(),
            PortType::Float => value.is_number(),
            PortType::Boolean => value.is_boolean(),
            PortType::Array(elem) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| elem.matches(v))),
            PortType::Object(elem) => value
                .as_object()
                .is_some_and(|map| map.values().all(|v| elem.matches(v))),
            PortType::Any => true,
        }
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::String => write!(f, "string"),
            PortType::Integer => write!(f, "int"),
            PortType::Float => write!(f, "float"),
            PortType::Boolean => write!(f, "bool"),
            PortType::Array(elem) => write!(f, "[{elem}]"),
            PortType::Object(elem) => write!(f, "{{string: {elem}}}"),
            PortType::Any => write!(f, "any"),
        }
    }
}

/// Maps a Rust type to its [`PortType`] descriptor.
///
/// Used by [`Pipeline::connect`](crate::pipeline::Pipeline::connect) to check
/// the declared element type of a connection against both endpoint ports at
/// construction time.
pub trait FlowType {
    /// The structural descriptor for this type.
    fn port_type() -> PortType;
}

impl FlowType for String {
    fn port_type() -> PortType {
        PortType::String
    }
}

impl FlowType for i64 {
    fn port_type() -> PortType {
        PortType::Integer
    }
}

impl FlowType for f64 {
    fn port_type() -> PortType {
        PortType::Float
    }
}

impl FlowType for bool {
    fn port_type() -> PortType {
        PortType::Boolean
    }
}

impl FlowType for Value {
    fn port_type() -> PortType {
        PortType::Any
    }
}

impl<T: FlowType> FlowType for Vec<T> {
    fn port_type() -> PortType {
        PortType::Array(Box::new(T::port_type()))
    }
}

impl<T: FlowType> FlowType for HashMap<String, T> {
    fn port_type() -> PortType {
        PortType::Object(Box::new(T::port_type()))
    }
}

/// A named, typed endpoint on a component.
#[derive(Debug, Clone)]
pub struct Port {
    /// Port name, unique within a component's input or output set.
    pub name: String,
    /// Structural type descriptor.
    pub ty: PortType,
    /// For input ports: whether a value must be supplied.
    pub required: bool,
    /// Human-readable description.
    pub description: String,
    /// Optional schema for value validation.
    pub schema: Option<Schema>,
    /// Optional default value.
    pub default_value: Option<Value>,
    /// Example values for documentation.
    pub examples: Vec<Value>,
}

impl Port {
    /// Creates an input port.
    #[must_use]
    pub fn input(name: impl Into<String>, ty: PortType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            description: String::new(),
            schema: None,
            default_value: None,
            examples: Vec::new(),
        }
    }

    /// Creates an output port.
    #[must_use]
    pub fn output(name: impl Into<String>, ty: PortType) -> Self {
        Self::input(name, ty)
    }

    /// Marks the port as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attaches a schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets a default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Adds an example value.
    #[must_use]
    pub fn with_example(mut self, value: Value) -> Self {
        self.examples.push(value);
        self
    }
}
