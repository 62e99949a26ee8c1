//! Shortest-path costs between node pairs.

use petgraph::algo::dijkstra;
use petgraph::graph::NodeIndex;

use super::conductance_cost;
use crate::graph::types::FilamentGraph;

/// Shortest-path cost of every unordered node pair joined by a conducting
/// path, with edge cost `1 / capacity`.
///
/// Pairs in different components are skipped rather than reported as
/// infinite.
#[must_use]
pub fn pairwise_path_lengths(graph: &FilamentGraph) -> Vec<f64> {
    let n = graph.node_count();
    let mut lengths = Vec::new();
    for s in 0..n {
        let reached = dijkstra(graph, NodeIndex::new(s), None, |e| {
            conductance_cost(e.weight())
        });
        let mut row: Vec<(usize, f64)> = reached
            .into_iter()
            .map(|(node, cost)| (node.index(), cost))
            .filter(|&(t, cost)| t > s && cost.is_finite())
            .collect();
        row.sort_by_key(|&(t, _)| t);
        lengths.extend(row.into_iter().map(|(_, cost)| cost));
    }
    lengths
}
