//! Known-geometry regression tests for the stage chain.
//!
//! Each test builds a small hand-crafted network whose expected stage
//! outputs and metrics are derived by hand.

use cytonet_core::error::CytoError;
use cytonet_core::volume::{Mask, Point3};
use cytonet_graph::graph::{
    AnnotatedGraph, EdgeOrigin, Filament, GraphStage, RawGraph, annotate, normalize, repair, unify,
};
use cytonet_graph::metrics::compute_metrics;
use petgraph::algo::connected_components;

mod common;
use common::finish;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn mask() -> Mask {
    Mask::full(32, 32)
}

fn straight_segment(from: (f64, f64), length: usize, capacity: f64) -> (Vec<Point3>, Filament) {
    let path: Vec<Point3> = (0..=length)
        .map(|i| Point3::new(from.0 + i as f64, from.1, 0.0))
        .collect();
    let ends = vec![path[0], path[length]];
    (ends, Filament::along(capacity, path, EdgeOrigin::Traced))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_straight_segment_passes_through_unchanged() {
    let (ends, filament) = straight_segment((4.0, 4.0), 8, 37.5);
    let raw = RawGraph::from_parts(&ends, [(0, 1, filament)]);
    assert_eq!(raw.node_count(), 2);
    assert_eq!(raw.edge_count(), 1);

    let simple = unify(&raw);
    assert_eq!(simple.edge_count(), 1);
    assert!((simple.capacities()[0] - 37.5).abs() < f64::EPSILON);

    let connected = repair(&simple, &mask(), false).expect("connected");
    assert_eq!(connected.bridges, 0);
    assert_eq!(connected.edge_count(), 1);

    let normalized = normalize(annotate(connected)).expect("normalize");
    let f = &normalized.graph.raw_edges()[0].weight;
    assert!((f.capacity - 1.0).abs() < 1e-12);
    assert!((f.centrality - 1.0).abs() < 1e-12);
    assert!((f.length - 8.0).abs() < 1e-12);
}

#[test]
fn single_segment_metrics() {
    let (ends, filament) = straight_segment((4.0, 4.0), 8, 2.0);
    let simple = unify(&RawGraph::from_parts(&ends, [(0, 1, filament)]));
    let (_, record) = finish(&simple, &mask(), false).expect("finish");

    assert_eq!(record.node_count, 2);
    assert_eq!(record.edge_count, 1);
    assert_eq!(record.component_count, 1);
    assert_eq!(record.crossing_number, 0);
    let apl = record.avg_path_length.expect("one connected pair");
    assert!((apl - 1.0).abs() < 1e-12, "avg path length {apl}");
    assert!((record.avg_capacity.expect("one edge") - 1.0).abs() < 1e-12);
    assert!(record.cv_path_length.is_none());
    assert!(record.cv_edge_angles.is_none());
    assert!(record.assortativity.is_none());
    let ac = record.algebraic_connectivity.expect("two nodes");
    assert!((ac - 2.0).abs() < 1e-10);
}

#[test]
fn two_disjoint_segments_get_exactly_one_bridge() {
    let (mut ends, a) = straight_segment((4.0, 4.0), 8, 1.0);
    let (more, b) = straight_segment((4.0, 12.0), 8, 2.0);
    ends.extend(more);
    let simple = unify(&RawGraph::from_parts(&ends, [(0, 1, a), (2, 3, b)]));
    assert_eq!(connected_components(&simple.graph), 2);

    let connected = repair(&simple, &mask(), true).expect("bridge");
    assert_eq!(connected.bridges, 1);
    assert_eq!(connected.node_count(), 4);
    assert_eq!(connected_components(&connected.graph), 1);

    let bridge = connected
        .graph
        .raw_edges()
        .iter()
        .find(|e| e.weight.origin == EdgeOrigin::Bridge)
        .expect("bridge");
    assert!((bridge.weight.capacity - 1.0).abs() < f64::EPSILON, "minimum capacity");
    assert!(mask().contains_segment(&bridge.weight.path[0], &bridge.weight.path[1]));
}

#[test]
fn zero_total_capacity_is_rejected() {
    let (ends, filament) = straight_segment((1.0, 1.0), 4, 0.0);
    let raw = RawGraph::from_parts(&ends, [(0, 1, filament)]);
    let err = normalize(AnnotatedGraph { graph: raw.graph }).expect_err("zero total");
    assert!(matches!(err, CytoError::ZeroCapacity { .. }));
}

#[test]
fn crossing_traced_paths_are_counted() {
    let p = vec![
        Point3::new(2.0, 2.0, 0.0),
        Point3::new(10.0, 10.0, 0.0),
        Point3::new(2.0, 10.0, 0.0),
        Point3::new(10.0, 2.0, 0.0),
    ];
    let simple = unify(&RawGraph::from_parts(
        &p,
        [
            (0, 1, Filament::straight(1.0, p[0], p[1], EdgeOrigin::Traced)),
            (2, 3, Filament::straight(1.0, p[2], p[3], EdgeOrigin::Traced)),
        ],
    ));
    let (normalized, record) = finish(&simple, &mask(), false).expect("finish");
    assert_eq!(normalized.edge_count(), 3);
    assert!(record.crossing_number >= 1);
    assert_eq!(compute_metrics(&normalized), record);
}
