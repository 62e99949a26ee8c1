//! Attach edge centrality to a connected graph.

use petgraph::graph::EdgeIndex;
use tracing::instrument;

use super::types::{AnnotatedGraph, ConnectedGraph, GraphStage};
use crate::metrics::betweenness::edge_betweenness;

/// Score every edge by capacity-weighted edge betweenness.
///
/// Scores are scaled so the most central edge has 1.0.
#[must_use]
#[instrument(skip(connected), fields(edges = connected.edge_count()))]
pub fn annotate(connected: ConnectedGraph) -> AnnotatedGraph {
    let scores = edge_betweenness(&connected.graph);
    let mut graph = connected.graph;
    for (i, score) in scores.into_iter().enumerate() {
        graph[EdgeIndex::new(i)].centrality = score;
    }
    AnnotatedGraph { graph }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EdgeOrigin, Filament, RawGraph};
    use cytonet_core::volume::Point3;

    #[test]
    fn bridge_edge_of_a_barbell_is_most_central() {
        // Two triangles joined by edge 2-3.
        let p: Vec<Point3> = (0..6).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let pairs = [(0, 1), (1, 2), (0, 2), (2, 3), (3, 4), (4, 5), (3, 5)];
        let raw = RawGraph::from_parts(
            &p,
            pairs
                .iter()
                .map(|&(u, v)| (u, v, Filament::straight(1.0, p[u], p[v], EdgeOrigin::Traced))),
        );
        let annotated = annotate(ConnectedGraph {
            graph: raw.graph,
            bridges: 0,
        });
        let centrality: Vec<f64> = annotated
            .graph
            .raw_edges()
            .iter()
            .map(|e| e.weight.centrality)
            .collect();
        assert!((centrality[3] - 1.0).abs() < 1e-12);
        assert!(centrality.iter().all(|&c| (0.0..=1.0).contains(&c)));
        assert!(centrality[0] < centrality[3]);
    }
}
