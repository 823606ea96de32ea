//! Dependency graph between registered services
//!
//! Nodes are registration indices. An edge `dependent -> dependency` means
//! the dependent may only start once the dependency is ready. The graph is
//! kept acyclic: [`DependencyGraph::add_edge`] refuses edges that would close
//! a cycle and leaves the graph untouched when it does.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

/// A cycle that an edge would have closed, as a list of node indices
///
/// The path starts and ends with the dependent of the rejected edge and
/// follows dependency edges in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle(pub Vec<usize>);

#[derive(Debug, Clone, Default)]
struct Node {
    dependencies: BTreeSet<usize>,
    dependents: BTreeSet<usize>,
}

/// Acyclic dependency graph over registration indices
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its index
    pub fn add_node(&mut self) -> usize {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Records that `dependent` waits for `dependency`
    ///
    /// Returns `Ok(false)` if the edge already existed. Both indices must be
    /// nodes of this graph.
    pub fn add_edge(&mut self, dependent: usize, dependency: usize) -> Result<bool, Cycle> {
        if dependent == dependency {
            return Err(Cycle(vec![dependent, dependent]));
        }
        if self.nodes[dependent].dependencies.contains(&dependency) {
            return Ok(false);
        }
        if let Some(path) = self.find_path(dependency, dependent) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(dependent);
            cycle.extend(path);
            return Err(Cycle(cycle));
        }

        self.nodes[dependent].dependencies.insert(dependency);
        self.nodes[dependency].dependents.insert(dependent);
        Ok(true)
    }

    /// Direct dependencies of a node, in ascending index order
    pub fn dependencies(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[index].dependencies.iter().copied()
    }

    /// Direct dependents of a node, in ascending index order
    pub fn dependents(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[index].dependents.iter().copied()
    }

    /// Topological order of all nodes, dependencies first
    ///
    /// Among nodes with no ordering constraint between them, the lower index
    /// (earlier registration) comes first.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut pending: Vec<usize> = self
            .nodes
            .iter()
            .map(|node| node.dependencies.len())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for dependent in self.dependents(index) {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
        order
    }

    /// Depth-first search along dependency edges from `from` to `to`
    fn find_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut parent: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        visited[from] = true;

        while let Some(current) = stack.pop() {
            if current == to {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(previous) = parent[cursor] {
                    path.push(previous);
                    cursor = previous;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.dependencies(current) {
                if !visited[next] {
                    visited[next] = true;
                    parent[next] = Some(current);
                    stack.push(next);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(nodes: usize) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for _ in 0..nodes {
            graph.add_node();
        }
        graph
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn test_add_edge_and_duplicate() {
        let mut graph = graph_with(2);
        assert_eq!(graph.add_edge(1, 0), Ok(true));
        assert_eq!(graph.add_edge(1, 0), Ok(false));
        assert_eq!(graph.dependencies(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(graph.dependents(0).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_self_edge_is_cycle() {
        let mut graph = graph_with(1);
        assert_eq!(graph.add_edge(0, 0), Err(Cycle(vec![0, 0])));
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let mut graph = graph_with(3);
        graph.add_edge(1, 0).unwrap();
        graph.add_edge(2, 1).unwrap();

        // 0 -> 2 would close 0 -> 2 -> 1 -> 0
        assert_eq!(graph.add_edge(0, 2), Err(Cycle(vec![0, 2, 1, 0])));
        assert_eq!(graph.dependencies(0).count(), 0);
        assert_eq!(graph.dependents(2).count(), 0);
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let mut graph = graph_with(4);
        // 0 waits for 3, 2 waits for 0
        graph.add_edge(0, 3).unwrap();
        graph.add_edge(2, 0).unwrap();

        assert_eq!(graph.topological_order(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_topological_order_registration_tie_break() {
        let graph = graph_with(5);
        assert_eq!(graph.topological_order(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_diamond_order() {
        let mut graph = graph_with(4);
        graph.add_edge(1, 0).unwrap();
        graph.add_edge(2, 0).unwrap();
        graph.add_edge(3, 1).unwrap();
        graph.add_edge(3, 2).unwrap();

        assert_eq!(graph.topological_order(), vec![0, 1, 2, 3]);
    }
}
