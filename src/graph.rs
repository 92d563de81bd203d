// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Dependency graph of changeset records and the execution order derived from it

use crate::error::ResolveError;
use crate::types::Record;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::Write as _;

/// Records as nodes, with an edge from each required record to its requirer
///
/// Node indices equal input positions, which is what the scheduler uses to
/// break ties.
pub struct ChangeSetGraph {
    /// The underlying directed graph, weighted by record id
    graph: DiGraph<String, ()>,
    /// Map from record ID to node index
    node_indices: HashMap<String, NodeIndex>,
}

impl ChangeSetGraph {
    /// Build the graph, rejecting duplicate ids and dangling requirements
    pub fn build(records: &[Record]) -> Result<Self, ResolveError> {
        let mut graph = DiGraph::with_capacity(records.len(), records.len());
        let mut node_indices = HashMap::with_capacity(records.len());

        for record in records {
            if node_indices.contains_key(&record.id) {
                return Err(ResolveError::DuplicateRecord {
                    id: record.id.clone(),
                });
            }
            let idx = graph.add_node(record.id.clone());
            node_indices.insert(record.id.clone(), idx);
        }

        for record in records {
            let to_idx = node_indices[&record.id];
            for required in &record.requires {
                let from_idx = *node_indices.get(required).ok_or_else(|| {
                    ResolveError::MissingDependency {
                        record: record.id.clone(),
                        missing: required.clone(),
                    }
                })?;
                // Repeated requirements collapse into one edge
                graph.update_edge(from_idx, to_idx, ());
            }
        }

        Ok(Self {
            graph,
            node_indices,
        })
    }

    /// Input positions in an order where every record follows its requirements
    ///
    /// Kahn's algorithm; among ready records the earliest in the input wins,
    /// so an already valid list comes back unchanged.
    pub fn execution_order(&self) -> Result<Vec<usize>, ResolveError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(position, _)| Reverse(position))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(position)) = ready.pop() {
            order.push(position);
            for dependent in self
                .graph
                .neighbors_directed(NodeIndex::new(position), Direction::Outgoing)
            {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }

        if order.len() < in_degree.len() {
            let records = in_degree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(position, _)| self.graph[NodeIndex::new(position)].clone())
                .collect();
            return Err(ResolveError::DependencyCycle { records });
        }

        Ok(order)
    }

    /// Every record that must run before `id`, directly or transitively
    #[must_use]
    pub fn prerequisites(&self, id: &str) -> Vec<&str> {
        let Some(&start) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut found = Vec::new();
        while let Some(idx) = dfs.next(reversed) {
            if idx != start {
                found.push(self.graph[idx].as_str());
            }
        }
        found
    }

    /// Get record count
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get dependency edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Export to DOT format for Graphviz
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph changeset {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box, style=rounded];\n\n");

        for id in self.graph.node_weights() {
            let _ = writeln!(dot, "  \"{id}\";");
        }

        dot.push('\n');

        for edge in self.graph.raw_edges() {
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"{}\";",
                self.graph[edge.source()],
                self.graph[edge.target()]
            );
        }

        dot.push_str("}\n");
        dot
    }
}

/// Reorder records so that each comes after everything it requires
pub fn sort_records(records: Vec<Record>) -> Result<Vec<Record>, ResolveError> {
    let order = ChangeSetGraph::build(&records)?.execution_order()?;
    let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;

    fn record(id: &str, requires: &[&str]) -> Record {
        Record::new(id, Method::Expose).requiring(requires.iter().copied())
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_chain_in_any_order() {
        let sorted = sort_records(vec![
            record("C", &["B"]),
            record("A", &[]),
            record("B", &["A"]),
        ])
        .unwrap();
        assert_eq!(ids(&sorted), ["A", "B", "C"]);
    }

    #[test]
    fn test_valid_order_is_kept() {
        let sorted = sort_records(vec![
            record("addCharm-0", &[]),
            record("addCharm-1", &[]),
            record("deploy-2", &["addCharm-1"]),
            record("deploy-3", &["addCharm-0"]),
        ])
        .unwrap();
        assert_eq!(ids(&sorted), ["addCharm-0", "addCharm-1", "deploy-2", "deploy-3"]);
    }

    #[test]
    fn test_ties_follow_input_position() {
        let sorted = sort_records(vec![
            record("deploy-2", &["addCharm-0"]),
            record("addMachines-1", &[]),
            record("addCharm-0", &[]),
        ])
        .unwrap();
        assert_eq!(ids(&sorted), ["addMachines-1", "addCharm-0", "deploy-2"]);
    }

    #[test]
    fn test_repeated_requirement_is_one_edge() {
        let graph = ChangeSetGraph::build(&[record("a-0", &[]), record("b-1", &["a-0", "a-0"])]).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.execution_order().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = sort_records(vec![record("a-0", &[]), record("a-0", &[])]).unwrap_err();
        assert_eq!(err, ResolveError::DuplicateRecord { id: "a-0".into() });
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let err = sort_records(vec![record("b-1", &["a-0"])]).unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingDependency {
                record: "b-1".into(),
                missing: "a-0".into()
            }
        );
    }

    #[test]
    fn test_cycle_reports_stuck_records() {
        let err = sort_records(vec![
            record("free-0", &[]),
            record("a-1", &["b-2"]),
            record("b-2", &["a-1"]),
            record("after-3", &["b-2"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            ResolveError::DependencyCycle {
                records: vec!["a-1".into(), "b-2".into(), "after-3".into()]
            }
        );
    }

    #[test]
    fn test_self_requirement_is_a_cycle() {
        let err = sort_records(vec![record("a-0", &["a-0"])]).unwrap_err();
        assert!(matches!(err, ResolveError::DependencyCycle { .. }));
    }

    #[test]
    fn test_empty_changeset() {
        assert!(sort_records(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_prerequisites_are_transitive() {
        let graph = ChangeSetGraph::build(&[
            record("A", &[]),
            record("B", &["A"]),
            record("C", &["B"]),
            record("D", &[]),
        ])
        .unwrap();
        let mut found = graph.prerequisites("C");
        found.sort_unstable();
        assert_eq!(found, ["A", "B"]);
        assert!(graph.prerequisites("D").is_empty());
        assert!(graph.prerequisites("nope").is_empty());
    }

    #[test]
    fn test_to_dot() {
        let graph = ChangeSetGraph::build(&[record("A", &[]), record("B", &["A"])]).unwrap();
        let dot = graph.to_dot();
        assert!(dot.contains("digraph changeset"));
        assert!(dot.contains("\"A\" -> \"B\";"));
    }
}
