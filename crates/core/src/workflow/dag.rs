use crate::error::{EngineError, EngineResult};
use crate::graph::{Connection, Graph, Node};
use crate::types::{NodeId, NodeKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// DAG representation of a workflow graph
pub struct WorkflowDag {
    graph: DiGraph<NodeId, ()>,
    node_indices: HashMap<NodeId, NodeIndex>,
    nodes: Vec<Node>,
    /// Incoming connections per node, in declaration order
    incoming: HashMap<NodeId, Vec<Connection>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl WorkflowDag {
    /// Build a DAG from a parsed graph, rejecting connections to unknown nodes
    pub fn from_graph(graph: Graph) -> EngineResult<Self> {
        let known: HashSet<&NodeId> = graph.nodes.iter().map(|node| &node.id).collect();
        for connection in &graph.connections {
            for endpoint in [&connection.from_node, &connection.to_node] {
                if !known.contains(endpoint) {
                    return Err(EngineError::MalformedGraph(format!(
                        "Connection {} references non-existent node: {}",
                        connection.id, endpoint
                    )));
                }
            }
        }

        Ok(Self::from_graph_lenient(graph))
    }

    /// Build a DAG, silently dropping connections to unknown nodes
    pub fn from_graph_lenient(graph: Graph) -> Self {
        let mut dag = DiGraph::new();
        let mut node_indices = HashMap::new();

        for node in &graph.nodes {
            let index = dag.add_node(node.id.clone());
            node_indices.insert(node.id.clone(), index);
        }

        let mut incoming: HashMap<NodeId, Vec<Connection>> = HashMap::new();
        for connection in graph.connections {
            let (Some(&from), Some(&to)) = (
                node_indices.get(&connection.from_node),
                node_indices.get(&connection.to_node),
            ) else {
                continue;
            };

            // Edge from producer to consumer
            dag.add_edge(from, to, ());
            incoming
                .entry(connection.to_node.clone())
                .or_default()
                .push(connection);
        }

        Self {
            graph: dag,
            node_indices,
            nodes: graph.nodes,
            incoming,
        }
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        let index = self.node_indices.get(id)?;
        self.nodes.get(index.index())
    }

    /// Connections feeding into a node, in declaration order
    pub fn incoming(&self, id: &NodeId) -> &[Connection] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes with no incoming connection, in declaration order
    pub fn start_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| self.incoming(&node.id).is_empty())
            .map(|node| node.id.clone())
            .collect()
    }

    /// OUTPUT nodes in declaration order
    pub fn output_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Output)
            .map(|node| node.id.clone())
            .collect()
    }

    /// Nodes without outgoing connections reachable from `start`, in declaration order
    pub fn reachable_sinks(&self, start: &NodeId) -> Vec<NodeId> {
        self.reachable_where(start, |index| {
            self.graph
                .neighbors_directed(index, Direction::Outgoing)
                .next()
                .is_none()
        })
    }

    fn reachable_where<F>(&self, start: &NodeId, keep: F) -> Vec<NodeId>
    where
        F: Fn(NodeIndex) -> bool,
    {
        let Some(&start) = self.node_indices.get(start) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(index) = dfs.next(&self.graph) {
            if keep(index) {
                found.push(index);
            }
        }

        found.sort_by_key(|index| index.index());
        found.into_iter().map(|index| self.graph[index].clone()).collect()
    }

    /// Depth-first search with white/gray/black marking.
    ///
    /// Fails on the first edge that leads back into a node still on the
    /// traversal stack.
    pub fn check_acyclic(&self) -> EngineResult<()> {
        let mut color = vec![Color::White; self.graph.node_count()];

        for root in self.graph.node_indices() {
            if color[root.index()] != Color::White {
                continue;
            }

            color[root.index()] = Color::Gray;
            let mut stack = vec![(root, self.graph.neighbors(root))];

            loop {
                let Some((node, neighbors)) = stack.last_mut() else {
                    break;
                };
                let node = *node;

                match neighbors.next() {
                    Some(next) => match color[next.index()] {
                        Color::White => {
                            color[next.index()] = Color::Gray;
                            stack.push((next, self.graph.neighbors(next)));
                        }
                        Color::Gray => {
                            return Err(EngineError::CircularDependency {
                                node_id: self.graph[next].clone(),
                            });
                        }
                        Color::Black => {}
                    },
                    None => {
                        color[node.index()] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[&str], edges: &[(&str, &str)]) -> Graph {
        Graph::new(
            ids.iter().map(|id| Node::new(*id, NodeKind::Agent)).collect(),
            edges
                .iter()
                .enumerate()
                .map(|(i, (from, to))| Connection::new(format!("c{}", i), from, to, 0))
                .collect(),
        )
    }

    #[test]
    fn test_linear_dag() {
        let dag = WorkflowDag::from_graph(graph(
            &["step1", "step2", "step3"],
            &[("step1", "step2"), ("step2", "step3")],
        ))
        .unwrap();

        assert!(dag.check_acyclic().is_ok());
        assert_eq!(dag.start_nodes(), vec![NodeId::new("step1")]);
        assert_eq!(
            dag.reachable_sinks(&NodeId::new("step1")),
            vec![NodeId::new("step3")]
        );
        assert_eq!(dag.incoming(&NodeId::new("step2")).len(), 1);
    }

    #[test]
    fn test_parallel_entry_points() {
        let dag = WorkflowDag::from_graph(graph(
            &["step1", "step2", "step3", "step4"],
            &[("step1", "step3"), ("step2", "step3"), ("step3", "step4")],
        ))
        .unwrap();

        // step1 and step2 can both start
        assert_eq!(dag.start_nodes().len(), 2);
        assert_eq!(dag.incoming(&NodeId::new("step3")).len(), 2);
    }

    #[test]
    fn test_cyclic_dag_rejected() {
        let dag = WorkflowDag::from_graph(graph(
            &["step1", "step2", "step3"],
            &[("step1", "step2"), ("step2", "step3"), ("step3", "step1")],
        ))
        .unwrap();

        let err = dag.check_acyclic().unwrap_err();
        assert!(matches!(err, EngineError::CircularDependency { .. }));
        assert!(err.to_string().contains("Circular dependency"));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let dag = WorkflowDag::from_graph(graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        ))
        .unwrap();

        assert!(dag.check_acyclic().is_ok());
        assert_eq!(dag.reachable_sinks(&NodeId::new("a")), vec![NodeId::new("d")]);
    }

    #[test]
    fn test_self_loop_rejected() {
        let dag = WorkflowDag::from_graph(graph(&["a"], &[("a", "a")])).unwrap();
        assert!(dag.check_acyclic().is_err());
    }

    #[test]
    fn test_dangling_connection_rejected() {
        let result = WorkflowDag::from_graph(graph(&["a"], &[("a", "ghost")]));
        match result {
            Err(EngineError::MalformedGraph(message)) => assert!(message.contains("ghost")),
            _ => panic!("expected malformed graph"),
        }
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let ids: Vec<String> = (0..20_000).map(|i| format!("n{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let edges: Vec<(&str, &str)> = id_refs.windows(2).map(|w| (w[0], w[1])).collect();

        let dag = WorkflowDag::from_graph(graph(&id_refs, &edges)).unwrap();
        assert!(dag.check_acyclic().is_ok());
    }
}
