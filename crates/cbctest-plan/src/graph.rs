//! Build dependency graph using `petgraph`.
//!
//! Edges point from a dependency to its dependent, so a topological sort
//! yields every image before the images built on top of it.

use std::collections::{BTreeSet, HashMap};

use cbctest_common::error::{HarnessError, Result};
use cbctest_common::types::TestName;
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};

/// A dependency graph of test cases.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: petgraph::Graph<TestName, ()>,
    nodes: HashMap<TestName, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a test node, returning the existing node if already present.
    pub fn add_test(&mut self, name: &TestName) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        let _ = self.nodes.insert(name.clone(), idx);
        idx
    }

    /// Adds a dependency edge: `dependent` needs `dependency` built first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Returns every test, dependencies before dependents.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error naming a test on the cycle if the graph is
    /// not acyclic.
    pub fn resolve_order(&self) -> Result<Vec<TestName>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map_or_else(|| "?".to_string(), ToString::to_string);
                Err(HarnessError::Config {
                    message: format!("cyclic dependency detected involving test {name}"),
                })
            }
        }
    }

    /// Returns `targets` and everything they depend on, transitively.
    #[must_use]
    pub fn closure(&self, targets: &[TestName]) -> BTreeSet<TestName> {
        let reversed = Reversed(&self.graph);
        let mut reached = BTreeSet::new();
        for target in targets {
            let Some(&start) = self.nodes.get(target) else {
                continue;
            };
            let mut dfs = Dfs::new(reversed, start);
            while let Some(idx) = dfs.next(reversed) {
                if let Some(name) = self.graph.node_weight(idx) {
                    let _ = reached.insert(name.clone());
                }
            }
        }
        reached
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(order: &[TestName]) -> Vec<&str> {
        order.iter().map(TestName::as_str).collect()
    }

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = DependencyGraph::new();
        assert!(graph.resolve_order().expect("should resolve").is_empty());
    }

    #[test]
    fn dependency_comes_first() {
        let mut graph = DependencyGraph::new();
        let derived = graph.add_test(&"derived".into());
        let base = graph.add_test(&"base".into());
        graph.add_dependency(derived, base);

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(names(&order), vec!["base", "derived"]);
    }

    #[test]
    fn adding_twice_reuses_node() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_test(&"a".into());
        let again = graph.add_test(&"a".into());
        assert_eq!(a, again);
        assert_eq!(names(&graph.resolve_order().expect("should resolve")), vec!["a"]);
    }

    #[test]
    fn diamond_dependency() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_test(&"a".into());
        let b = graph.add_test(&"b".into());
        let c = graph.add_test(&"c".into());
        let d = graph.add_test(&"d".into());
        graph.add_dependency(a, b);
        graph.add_dependency(a, c);
        graph.add_dependency(b, d);
        graph.add_dependency(c, d);

        let order = graph.resolve_order().expect("should resolve");
        let pos = |name: &str| order.iter().position(|n| n.as_str() == name).expect(name);
        assert!(pos("d") < pos("b"));
        assert!(pos("d") < pos("c"));
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("a"));
    }

    #[test]
    fn cycle_is_a_configuration_error() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_test(&"a".into());
        let b = graph.add_test(&"b".into());
        let c = graph.add_test(&"c".into());
        graph.add_dependency(a, b);
        graph.add_dependency(b, c);
        graph.add_dependency(c, a);

        let err = graph.resolve_order().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("cyclic"), "got: {err}");
    }

    #[test]
    fn closure_pulls_in_transitive_dependencies_only() {
        let mut graph = DependencyGraph::new();
        let top = graph.add_test(&"top".into());
        let mid = graph.add_test(&"mid".into());
        let base = graph.add_test(&"base".into());
        let _ = graph.add_test(&"unrelated".into());
        graph.add_dependency(top, mid);
        graph.add_dependency(mid, base);

        let reached = graph.closure(&["top".into()]);
        let reached: Vec<_> = reached.iter().map(TestName::as_str).collect();
        assert_eq!(reached, vec!["base", "mid", "top"]);

        let only_base = graph.closure(&["base".into()]);
        assert_eq!(only_base.len(), 1);
    }
}
