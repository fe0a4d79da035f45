//! Component dependency graph: construction, ordering, and analysis.
//!
//! Graph construction is total: a cyclic pipeline still builds, with
//! `topology_order` absent. Ordering is deterministic: ties in Kahn's
//! algorithm break by component insertion order.

use crate::pipeline::Pipeline;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A component node in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Component name.
    pub name: String,
    /// Names of components this node depends on (upstream).
    pub dependencies: Vec<String>,
    /// Names of components depending on this node (downstream).
    pub dependents: Vec<String>,
    /// Position in the topological order, when one exists.
    pub level: usize,
    /// Cost weight used by the critical-path computation.
    pub weight: u64,
}

/// A connection edge in the dependency graph.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Source component name.
    pub from: String,
    /// Sink component name.
    pub to: String,
    /// Index of the originating connection in the pipeline's connection list.
    pub connection: usize,
    /// Edge weight.
    pub weight: u64,
}

/// The dependency graph of a pipeline.
#[derive(Debug, Clone, Default)]
pub struct ComponentGraph {
    nodes: HashMap<String, GraphNode>,
    node_order: Vec<String>,
    edges: Vec<GraphEdge>,
    topology_order: Option<Vec<String>>,
    critical_path: Vec<String>,
}

impl ComponentGraph {
    /// Builds the graph for a pipeline.
    ///
    /// Never fails: cycles leave `topology_order` empty and are reported by
    /// [`ComponentGraph::find_cycle`].
    #[must_use]
    pub fn build(pipeline: &Pipeline) -> Self {
        let mut graph = Self::default();

        for name in pipeline.component_names() {
            graph.node_order.push(name.clone());
            graph.nodes.insert(
                name.clone(),
                GraphNode {
                    name: name.clone(),
                    dependencies: Vec::new(),
                    dependents: Vec::new(),
                    level: 0,
                    weight: pipeline.component_cost(&name),
                },
            );
        }

        for (index, conn) in pipeline.connections().iter().enumerate() {
            graph.edges.push(GraphEdge {
                from: conn.from_component.clone(),
                to: conn.to_component.clone(),
                connection: index,
                weight: 1,
            });
            if let Some(from) = graph.nodes.get_mut(&conn.from_component) {
                from.dependents.push(conn.to_component.clone());
            }
            if let Some(to) = graph.nodes.get_mut(&conn.to_component) {
                to.dependencies.push(conn.from_component.clone());
            }
        }

        graph.compute_topology_order();
        if graph.topology_order.is_some() {
            graph.compute_critical_path();
        }

        graph
    }

    /// Returns the node for a component.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Returns the nodes in component insertion order.
    #[must_use]
    pub fn nodes(&self) -> Vec<&GraphNode> {
        self.node_order
            .iter()
            .filter_map(|name| self.nodes.get(name))
            .collect()
    }

    /// Returns all edges.
    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Returns the topological order, absent when the graph is cyclic.
    #[must_use]
    pub fn topology_order(&self) -> Option<&[String]> {
        self.topology_order.as_deref()
    }

    /// Returns the critical path (longest weighted chain), empty when the
    /// graph is cyclic.
    #[must_use]
    pub fn critical_path(&self) -> &[String] {
        &self.critical_path
    }

    /// Kahn's algorithm with insertion-order tie-breaking.
    fn compute_topology_order(&mut self) {
        let order_index: HashMap<String, usize> = self
            .node_order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut in_degree: HashMap<String, usize> = self
            .node_order
            .iter()
            .map(|name| (name.clone(), 0))
            .collect();
        for edge in &self.edges {
            if let Some(degree) = in_degree.get_mut(&edge.to) {
                *degree += 1;
            }
        }

        let mut ready: BTreeSet<(usize, String)> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| (order_index[name], name.clone()))
            .collect();

        let mut sorted: Vec<String> = Vec::with_capacity(self.node_order.len());
        while let Some(entry) = ready.iter().next().cloned() {
            ready.remove(&entry);
            let (_, name) = entry;

            let dependents = self.nodes[&name].dependents.clone();
            sorted.push(name);

            for dependent in &dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert((order_index[dependent], dependent.clone()));
                    }
                }
            }
        }

        if sorted.len() == self.node_order.len() {
            for (level, name) in sorted.iter().enumerate() {
                if let Some(node) = self.nodes.get_mut(name) {
                    node.level = level;
                }
            }
            self.topology_order = Some(sorted);
        } else {
            self.topology_order = None;
        }
    }

    /// Finds a cycle by DFS, returning its path (first node repeated last),
    /// or None when the graph is acyclic.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut on_stack: HashSet<&str> = HashSet::new();

        for start in &self.node_order {
            if visited.contains(start.as_str()) {
                continue;
            }
            if let Some(path) = dfs_cycle(
                start.as_str(),
                &adjacency,
                &mut visited,
                &mut stack,
                &mut on_stack,
            ) {
                return Some(path);
            }
        }
        None
    }

    /// Connected component groups under the undirected view of the graph.
    #[must_use]
    pub fn connectivity_groups(&self) -> Vec<Vec<String>> {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
            adjacency
                .entry(edge.to.as_str())
                .or_default()
                .push(edge.from.as_str());
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut groups = Vec::new();

        for start in &self.node_order {
            if visited.contains(start.as_str()) {
                continue;
            }
            let mut group = Vec::new();
            let mut pending = vec![start.as_str()];
            while let Some(name) = pending.pop() {
                if !visited.insert(name) {
                    continue;
                }
                group.push(name.to_string());
                if let Some(neighbors) = adjacency.get(name) {
                    for neighbor in neighbors {
                        if !visited.contains(neighbor) {
                            pending.push(neighbor);
                        }
                    }
                }
            }
            groups.push(group);
        }

        groups
    }

    /// Longest weighted chain over the topologically ordered nodes.
    fn compute_critical_path(&mut self) {
        let Some(order) = self.topology_order.clone() else {
            return;
        };
        if order.is_empty() {
            return;
        }

        let mut distance: HashMap<String, u64> = HashMap::new();
        let mut predecessor: HashMap<String, String> = HashMap::new();

        for name in &order {
            distance.insert(name.clone(), self.nodes[name].weight);
        }

        for current in &order {
            let current_distance = distance[current];
            for dependent in self.nodes[current].dependents.clone() {
                let Some(node) = self.nodes.get(&dependent) else {
                    continue;
                };
                let candidate = current_distance + node.weight;
                if candidate > distance[&dependent] {
                    distance.insert(dependent.clone(), candidate);
                    predecessor.insert(dependent, current.clone());
                }
            }
        }

        // Terminal of the longest chain; ties resolve to the earliest node
        // in topological order.
        let mut end = order[0].clone();
        let mut best = 0u64;
        for name in &order {
            let d = distance[name];
            if d > best {
                best = d;
                end = name.clone();
            }
        }

        let mut path = vec![end.clone()];
        let mut current = end;
        while let Some(prev) = predecessor.get(&current) {
            path.push(prev.clone());
            current = prev.clone();
        }
        path.reverse();
        self.critical_path = path;
    }
}

fn dfs_cycle<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    on_stack: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    stack.push(node);
    on_stack.insert(node);

    if let Some(neighbors) = adjacency.get(node) {
        for &neighbor in neighbors {
            if on_stack.contains(neighbor) {
                // Slice the stack from the first occurrence of `neighbor` to
                // form the cycle path.
                let start = stack.iter().position(|&n| n == neighbor).unwrap_or(0);
                let mut path: Vec<String> =
                    stack[start..].iter().map(|n| (*n).to_string()).collect();
                path.push(neighbor.to_string());
                return Some(path);
            }
            if !visited.contains(neighbor) {
                if let Some(path) = dfs_cycle(neighbor, adjacency, visited, stack, on_stack) {
                    return Some(path);
                }
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
    None
}
