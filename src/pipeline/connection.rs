//! Directed edges between component ports.

use super::config::BackpressureConfig;
use crate::component::Transform;
use std::collections::HashMap;
use std::sync::Arc;

/// A directed edge from one component's output port to another component's
/// input port.
#[derive(Clone)]
pub struct Connection {
    /// Source component name.
    pub from_component: String,
    /// Source output port name.
    pub from_port: String,
    /// Sink component name.
    pub to_component: String,
    /// Sink input port name.
    pub to_port: String,
    /// Optional receiver-side value transform.
    pub transform: Option<Arc<dyn Transform>>,
    /// Queue capacity for this edge.
    pub buffer_size: usize,
    /// Optional backpressure override.
    pub backpressure: Option<BackpressureConfig>,
    /// Connection name.
    pub name: String,
    /// Connection description.
    pub description: String,
    /// Free-form metadata.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Connection {
    /// Creates a connection with the given endpoints and buffer size.
    #[must_use]
    pub fn new(
        from_component: impl Into<String>,
        from_port: impl Into<String>,
        to_component: impl Into<String>,
        to_port: impl Into<String>,
        buffer_size: usize,
    ) -> Self {
        let from_component = from_component.into();
        let from_port = from_port.into();
        let to_component = to_component.into();
        let to_port = to_port.into();
        let name = format!("{from_component}.{from_port} -> {to_component}.{to_port}");
        let description = format!("Connection from {from_component} to {to_component}");
        Self {
            from_component,
            from_port,
            to_component,
            to_port,
            transform: None,
            buffer_size,
            backpressure: None,
            name,
            description,
            metadata: HashMap::new(),
        }
    }

    /// Returns true if this edge ends at the given component input port.
    #[must_use]
    pub fn feeds(&self, component: &str, port: &str) -> bool {
        self.to_component == component && self.to_port == port
    }

    /// Returns true if this edge starts at the given component output port.
    #[must_use]
    pub fn sourced_from(&self, component: &str, port: &str) -> bool {
        self.from_component == component && self.from_port == port
    }

    /// Returns true if both endpoints match the given quadruple.
    #[must_use]
    pub fn matches(
        &self,
        from_component: &str,
        from_port: &str,
        to_component: &str,
        to_port: &str,
    ) -> bool {
        self.sourced_from(from_component, from_port) && self.feeds(to_component, to_port)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("buffer_size", &self.buffer_size)
            .field("has_transform", &self.transform.is_some())
            .field("backpressure", &self.backpressure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name() {
        let conn = Connection::new("src", "out", "sink", "in", 10);
        assert_eq!(conn.name, "src.out -> sink.in");
        assert_eq!(conn.buffer_size, 10);
        assert!(conn.transform.is_none());
    }

    #[test]
    fn test_endpoint_predicates() {
        let conn = Connection::new("src", "out", "sink", "in", 1);
        assert!(conn.feeds("sink", "in"));
        assert!(!conn.feeds("sink", "other"));
        assert!(conn.sourced_from("src", "out"));
        assert!(conn.matches("src", "out", "sink", "in"));
        assert!(!conn.matches("src", "out", "sink", "other"));
    }
}
