//! Geometric regularity of the embedded network: edge orientations and
//! path crossings, both measured on the lateral projection.

use petgraph::visit::EdgeRef;

use crate::geometry::{chord_angle, paths_cross};
use crate::graph::types::FilamentGraph;

/// Chord orientation of every edge in `[0, π)`, in edge-index order.
/// Edges without lateral extent are skipped.
#[must_use]
pub fn edge_angles(graph: &FilamentGraph) -> Vec<f64> {
    graph
        .raw_edges()
        .iter()
        .filter_map(|e| chord_angle(&e.weight.path))
        .collect()
}

/// Number of unordered edge pairs whose paths cross anywhere other than at
/// a junction both edges are attached to.
#[must_use]
pub fn crossing_number(graph: &FilamentGraph) -> usize {
    let edges: Vec<_> = graph.edge_references().collect();
    let mut crossings = 0;
    for (i, a) in edges.iter().enumerate() {
        for b in &edges[i + 1..] {
            let shared: Vec<_> = [a.source(), a.target()]
                .into_iter()
                .filter(|&n| n == b.source() || n == b.target())
                .map(|n| graph[n].position)
                .collect();
            if paths_cross(&a.weight().path, &b.weight().path, &shared) {
                crossings += 1;
            }
        }
    }
    crossings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EdgeOrigin, Filament, RawGraph};
    use cytonet_core::volume::Point3;

    fn graph(points: &[(f64, f64)], edges: &[(usize, usize)]) -> FilamentGraph {
        let p: Vec<Point3> = points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
        RawGraph::from_parts(
            &p,
            edges
                .iter()
                .map(|&(u, v)| (u, v, Filament::straight(1.0, p[u], p[v], EdgeOrigin::Traced))),
        )
        .graph
    }

    #[test]
    fn x_shape_crosses_once() {
        let g = graph(
            &[(0.0, 0.0), (4.0, 4.0), (0.0, 4.0), (4.0, 0.0)],
            &[(0, 1), (2, 3)],
        );
        assert_eq!(crossing_number(&g), 1);
    }

    #[test]
    fn star_has_no_crossings() {
        let g = graph(
            &[(2.0, 2.0), (0.0, 2.0), (4.0, 2.0), (2.0, 0.0), (2.0, 4.0)],
            &[(0, 1), (0, 2), (0, 3), (0, 4)],
        );
        assert_eq!(crossing_number(&g), 0);
    }

    #[test]
    fn angles_follow_edge_order() {
        let g = graph(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)], &[(0, 1), (0, 2)]);
        let angles = edge_angles(&g);
        assert_eq!(angles.len(), 2);
        assert!(angles[0].abs() < 1e-12);
        assert!((angles[1] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
