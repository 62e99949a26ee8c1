//! Degree assortativity.
//!
//! Newman's coefficient for undirected graphs: the Pearson correlation of
//! the degrees at either end of an edge, each edge counted in both
//! directions. Positive values mean hubs attach to hubs.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::graph::types::FilamentGraph;

/// `None` when the graph has no edges or the end degrees have no variance
/// (any regular graph).
#[must_use]
pub fn degree_assortativity(graph: &FilamentGraph) -> Option<f64> {
    let m = graph.edge_count();
    if m == 0 {
        return None;
    }
    let degree = |i: NodeIndex| graph.edges(i).count() as f64;

    let mut sum_product = 0.0;
    let mut sum_mean = 0.0;
    let mut sum_square = 0.0;
    for edge in graph.edge_references() {
        let j = degree(edge.source());
        let k = degree(edge.target());
        sum_product += j * k;
        sum_mean += 0.5 * (j + k);
        sum_square += 0.5 * j.mul_add(j, k * k);
    }
    let m = m as f64;
    let mean_term = (sum_mean / m).powi(2);
    let numerator = sum_product / m - mean_term;
    let denominator = sum_square / m - mean_term;
    if denominator.abs() < 1e-12 {
        None
    } else {
        Some(numerator / denominator)
    }
}
