//! Graphviz DOT rendering of pipelines.

use crate::component::Port;
use crate::pipeline::Pipeline;
use std::fmt::Write as _;

/// Renders the pipeline as a Graphviz DOT digraph.
///
/// One record node per component with input ports on the left and output
/// ports on the right, one edge per connection addressing port ids. Output
/// is deterministic: components render in attach order, edges in declaration
/// order.
#[must_use]
pub fn to_dot(pipeline: &Pipeline) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", pipeline.name());
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=record];\n");

    for name in pipeline.component_names() {
        let Some(component) = pipeline.component(&name) else {
            continue;
        };
        let label = format!(
            "{{{name}|{{{}|{}}}}}",
            port_fields(&component.input_ports()),
            port_fields(&component.output_ports())
        );
        let _ = writeln!(out, "  \"{name}\" [label=\"{label}\"];");
    }

    for conn in pipeline.connections() {
        let _ = writeln!(
            out,
            "  \"{}\":{} -> \"{}\":{};",
            conn.from_component, conn.from_port, conn.to_component, conn.to_port
        );
    }

    out.push_str("}\n");
    out
}

fn port_fields(ports: &[Port]) -> String {
    ports
        .iter()
        .map(|p| format!("<{}> {} ({})", p.name, p.name, p.ty))
        .collect::<Vec<_>>()
        .join("|")
}
