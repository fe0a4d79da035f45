//! Schema validation for port values.
//!
//! A schema pairs a structural type descriptor with named constraints and
//! supports compatibility checks and value migration between schemas.

use super::port::PortType;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A single schema or constraint violation.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SchemaViolation(pub String);

/// A named validation predicate over a single value.
pub trait Constraint: Send + Sync {
    /// Checks the value against the constraint.
    fn check(&self, value: &Value) -> Result<(), SchemaViolation>;

    /// Human-readable description of the constraint.
    fn description(&self) -> String;
}

/// A validation capability over a single datum.
#[derive(Clone)]
pub struct Schema {
    ty: PortType,
    description: String,
    constraints: Vec<Arc<dyn Constraint>>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("ty", &self.ty)
            .field("description", &self.description)
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

impl Schema {
    /// Creates a schema for the given type.
    #[must_use]
    pub fn new(ty: PortType, description: impl Into<String>) -> Self {
        Self {
            ty,
            description: description.into(),
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    /// Returns the type descriptor.
    #[must_use]
    pub fn port_type(&self) -> &PortType {
        &self.ty
    }

    /// Validates a value against the type descriptor and all constraints.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        if !self.ty.matches(value) {
            return Err(SchemaViolation(format!(
                "type mismatch: expected {}, got {}",
                self.ty,
                json_kind(value)
            )));
        }
        for constraint in &self.constraints {
            constraint.check(value)?;
        }
        Ok(())
    }

    /// Returns true if values of this schema may flow into the other.
    #[must_use]
    pub fn compatible(&self, other: &Schema) -> bool {
        self.ty.compatible(&other.ty)
    }

    /// Migrates a value to the target schema.
    ///
    /// Compatible schemas pass the value through unchanged; anything else is
    /// rejected.
    pub fn migrate(&self, value: Value, target: &Schema) -> Result<Value, SchemaViolation> {
        if self.compatible(target) {
            return Ok(value);
        }
        Err(SchemaViolation(format!(
            "no migration path from {} to {}",
            self.ty, target.ty
        )))
    }

    /// Returns a JSON Schema representation.
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let mut schema = serde_json::Map::new();
        schema.insert(
            "type".to_string(),
            Value::String(self.ty.json_type().to_string()),
        );
        schema.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        if !self.constraints.is_empty() {
            schema.insert(
                "constraints".to_string(),
                Value::Array(
                    self.constraints
                        .iter()
                        .map(|c| Value::String(c.description()))
                        .collect(),
                ),
            );
        }
        Value::Object(schema)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Rejects null values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNull;

impl Constraint for NotNull {
    fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        if value.is_null() {
            return Err(SchemaViolation("value must not be null".to_string()));
        }
        Ok(())
    }

    fn description(&self) -> String {
        "value must not be null".to_string()
    }
}

/// Bounds the length of a string value. A bound of zero is unenforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLength {
    /// Minimum length, inclusive.
    pub min: usize,
    /// Maximum length, inclusive. Zero disables the bound.
    pub max: usize,
}

impl Constraint for StringLength {
    fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        let s = value
            .as_str()
            .ok_or_else(|| SchemaViolation(format!("expected string, got {}", json_kind(value))))?;
        let len = s.chars().count();
        if self.min > 0 && len < self.min {
            return Err(SchemaViolation(format!(
                "string length {len} is less than minimum {}",
                self.min
            )));
        }
        if self.max > 0 && len > self.max {
            return Err(SchemaViolation(format!(
                "string length {len} exceeds maximum {}",
                self.max
            )));
        }
        Ok(())
    }

    fn description(&self) -> String {
        match (self.min, self.max) {
            (0, 0) => "string length constraint".to_string(),
            (min, 0) => format!("string length must be at least {min}"),
            (0, max) => format!("string length must be at most {max}"),
            (min, max) => format!("string length must be between {min} and {max}"),
        }
    }
}

/// Bounds a numeric value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericRange {
    /// Minimum value, inclusive.
    pub min: Option<f64>,
    /// Maximum value, inclusive.
    pub max: Option<f64>,
}

impl Constraint for NumericRange {
    fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        let n = value
            .as_f64()
            .ok_or_else(|| SchemaViolation(format!("expected number, got {}", json_kind(value))))?;
        if let Some(min) = self.min {
            if n < min {
                return Err(SchemaViolation(format!("value {n} is less than minimum {min}")));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return Err(SchemaViolation(format!("value {n} exceeds maximum {max}")));
            }
        }
        Ok(())
    }

    fn description(&self) -> String {
        match (self.min, self.max) {
            (None, None) => "numeric range constraint".to_string(),
            (Some(min), None) => format!("minimum: {min}"),
            (None, Some(max)) => format!("maximum: {max}"),
            (Some(min), Some(max)) => format!("minimum: {min}, maximum: {max}"),
        }
    }
}

/// Requires a string value to contain the given pattern.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    /// Substring the value must contain.
    pub pattern: String,
}

impl Pattern {
    /// Creates a pattern constraint.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl Constraint for Pattern {
    fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        let s = value
            .as_str()
            .ok_or_else(|| SchemaViolation(format!("expected string, got {}", json_kind(value))))?;
        if self.pattern.is_empty() {
            return Err(SchemaViolation("pattern is empty".to_string()));
        }
        if !s.contains(&self.pattern) {
            return Err(SchemaViolation(format!(
                "string does not match pattern {}",
                self.pattern
            )));
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("must match pattern: {}", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string_schema() -> Schema {
        Schema::new(PortType::String, "text")
            .with_constraint(NotNull)
            .with_constraint(StringLength { min: 1, max: 16 })
    }

    #[test]
    fn test_validate_type_and_constraints() {
        let schema = string_schema();

        assert!(schema.validate(&json!("hello")).is_ok());
        assert!(schema.validate(&json!(42)).is_err());
        assert!(schema.validate(&json!("")).is_err());
        assert!(schema
            .validate(&json!("a string longer than sixteen"))
            .is_err());
    }

    #[test]
    fn test_compatibility() {
        let a = Schema::new(PortType::String, "a");
        let b = Schema::new(PortType::String, "b");
        let c = Schema::new(PortType::Integer, "c");
        let any = Schema::new(PortType::Any, "any");

        assert!(a.compatible(&b));
        assert!(!a.compatible(&c));
        assert!(a.compatible(&any));
        assert!(any.compatible(&c));
    }

    #[test]
    fn test_migrate_pass_through_and_reject() {
        let a = Schema::new(PortType::String, "a");
        let b = Schema::new(PortType::String, "b");
        let c = Schema::new(PortType::Integer, "c");

        assert_eq!(a.migrate(json!("x"), &b).unwrap(), json!("x"));
        assert!(a.migrate(json!("x"), &c).is_err());
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = string_schema();
        let rendered = schema.json_schema();

        assert_eq!(rendered["type"], "string");
        assert_eq!(rendered["constraints"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_numeric_range() {
        let range = NumericRange {
            min: Some(0.0),
            max: Some(10.0),
        };
        assert!(range.check(&json!(5)).is_ok());
        assert!(range.check(&json!(-1)).is_err());
        assert!(range.check(&json!(11.5)).is_err());
        assert!(range.check(&json!("nope")).is_err());
    }

    #[test]
    fn test_pattern_containment() {
        let pattern = Pattern::new("flow");
        assert!(pattern.check(&json!("dataflow")).is_ok());
        assert!(pattern.check(&json!("stream")).is_err());
    }
}
