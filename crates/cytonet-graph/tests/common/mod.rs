//! Shared proptest strategies and stage helpers for filament graphs.

#![allow(dead_code)]

use cytonet_core::error::Result;
use cytonet_core::volume::{Mask, Point3};
use cytonet_graph::graph::{
    EdgeOrigin, Filament, NormalizedGraph, RawGraph, SimpleGraph, annotate, normalize, repair,
};
use cytonet_graph::metrics::{MetricsRecord, compute_metrics};
use proptest::prelude::*;

/// Side of the square mask the generated graphs live in.
pub const EXTENT: usize = 40;

/// Distinct lattice positions strictly inside the mask.
pub fn arb_positions(min: usize, max: usize) -> impl Strategy<Value = Vec<Point3>> {
    let lattice: Vec<Point3> = (1..10)
        .flat_map(|i| (1..10).map(move |j| Point3::new(f64::from(i) * 4.0, f64::from(j) * 4.0, 0.0)))
        .collect();
    (min..=max).prop_flat_map(move |n| {
        proptest::sample::subsequence(lattice.clone(), n).prop_shuffle()
    })
}

/// A raw multigraph with straight edges, parallel edges and self-loops.
pub fn arb_raw_graph() -> impl Strategy<Value = RawGraph> {
    arb_positions(2, 12).prop_flat_map(|positions| {
        let n = positions.len();
        let edge = (0..n, 0..n, 0.1_f64..10.0);
        proptest::collection::vec(edge, 1..24).prop_map(move |edges| {
            RawGraph::from_parts(
                &positions,
                edges.into_iter().map(|(u, v, c)| {
                    let path = if u == v {
                        let p = positions[u];
                        vec![p, Point3::new(p.x + 1.0, p.y + 1.0, 0.0), p]
                    } else {
                        vec![positions[u], positions[v]]
                    };
                    (u, v, Filament::along(c, path, EdgeOrigin::Traced))
                }),
            )
        })
    })
}

pub fn full_mask() -> Mask {
    Mask::full(EXTENT, EXTENT)
}

/// Repair, centrality, normalization and metrics in one call.
pub fn finish(simple: &SimpleGraph, mask: &Mask, planar: bool) -> Result<(NormalizedGraph, MetricsRecord)> {
    let normalized = normalize(annotate(repair(simple, mask, planar)?))?;
    let record = compute_metrics(&normalized);
    Ok((normalized, record))
}
