use std::collections::HashMap;

/// Dependency graph over resource group logical names
///
/// Edges mean "the dependent cannot be created until the dependency is
/// resolved". Construction order is a checked property of the graph, never an
/// artifact of source layout.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: petgraph::Graph<String, ()>,
    indices: HashMap<String, petgraph::graph::NodeIndex>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            indices: HashMap::new(),
        }
    }

    /// Register a resource group node
    pub fn add_resource(&mut self, name: &str) {
        if !self.indices.contains_key(name) {
            let index = self.graph.add_node(name.to_string());
            self.indices.insert(name.to_string(), index);
        }
    }

    /// Record that `dependent` cannot be created before `dependency`
    ///
    /// The edge points from dependency to dependent so that topological sort
    /// yields dependencies first. Both ends must already be registered: an
    /// edge to an unknown resource group is a build-time defect.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str) -> eyre::Result<()> {
        let to = *self
            .indices
            .get(dependent)
            .ok_or_else(|| eyre::eyre!("Dependency edge from unknown resource {dependent:?}"))?;

        let from = *self
            .indices
            .get(dependency)
            .ok_or_else(|| eyre::eyre!("{dependent:?} depends on unknown resource {dependency:?}"))?;

        let _ = self.graph.add_edge(from, to, ());
        Ok(())
    }

    /// Topological construction order, dependencies first
    ///
    /// Deterministic for identical input: nodes are visited in insertion
    /// order. Cycles abort composition entirely.
    pub fn order(&self) -> eyre::Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&index| self.graph.node_weight(index).cloned())
                .collect()),
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map(String::as_str)
                    .unwrap_or("?");

                Err(eyre::eyre!(
                    "Cyclic dependency in the resource graph involving {name:?}"
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_resolves_to_empty() {
        let order = DependencyGraph::new().order().expect("should resolve");
        assert!(order.is_empty());
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph = DependencyGraph::new();
        graph.add_resource("Environment");
        graph.add_resource("ExecutionRole");
        graph.add_edge("Environment", "ExecutionRole").expect("edge");

        let order = graph.order().expect("should resolve");
        let pos = |name: &str| order.iter().position(|n| n == name).expect(name);
        assert!(pos("ExecutionRole") < pos("Environment"));
    }

    #[test]
    fn diamond_orders_every_branch_before_the_join() {
        let mut graph = DependencyGraph::new();
        for name in ["vpc", "public", "private", "nat"] {
            graph.add_resource(name);
        }
        graph.add_edge("public", "vpc").expect("edge");
        graph.add_edge("private", "vpc").expect("edge");
        graph.add_edge("nat", "public").expect("edge");
        graph.add_edge("nat", "private").expect("edge");

        let order = graph.order().expect("should resolve");
        let pos = |name: &str| order.iter().position(|n| n == name).expect(name);
        assert!(pos("vpc") < pos("public"));
        assert!(pos("vpc") < pos("private"));
        assert!(pos("public") < pos("nat"));
        assert!(pos("private") < pos("nat"));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_resource("a");
        graph.add_resource("b");
        graph.add_edge("a", "b").expect("edge");
        graph.add_edge("b", "a").expect("edge");

        let err = graph.order().expect_err("should reject");
        assert!(err.to_string().contains("Cyclic"), "{err}");
    }

    #[test]
    fn edges_to_unknown_resources_are_build_time_defects() {
        let mut graph = DependencyGraph::new();
        graph.add_resource("a");
        assert!(graph.add_edge("a", "missing").is_err());
        assert!(graph.add_edge("missing", "a").is_err());
    }

    #[test]
    fn order_is_deterministic() {
        let build = || {
            let mut graph = DependencyGraph::new();
            for name in ["registry", "network", "storage", "airflow", "warehouse"] {
                graph.add_resource(name);
            }
            graph.add_edge("airflow", "network").expect("edge");
            graph.add_edge("warehouse", "network").expect("edge");
            graph.add_edge("airflow", "storage").expect("edge");
            graph.order().expect("should resolve")
        };

        assert_eq!(build(), build());
    }
}
