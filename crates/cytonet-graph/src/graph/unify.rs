//! Collapse parallel edges into one edge per node pair.
//!
//! # Overview
//!
//! The detector emits a multigraph: two junctions may be joined by several
//! traced filaments, and a filament may loop back to its own junction. The
//! unifier drops self-loops and replaces each bundle of parallel edges by a
//! single edge:
//!
//! - **capacity**: the sum of the bundle's capacities, added in ascending
//!   order so the result is bitwise independent of enumeration order;
//! - **geometry**: the path and length of the highest-capacity member, ties
//!   broken by shorter length, then by lexicographic path coordinates;
//! - **origin**: the representative's origin.
//!
//! Output edges are inserted in ascending `(lower, higher)` endpoint order
//! with the path oriented from the lower node index to the higher one, so the
//! result depends only on the input edge multiset.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use cytonet_core::volume::Point3;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::{debug, instrument};

use super::types::{Filament, FilamentGraph, GraphStage, RawGraph, SimpleGraph};

/// Merge parallel edges and drop self-loops.
#[must_use]
#[instrument(skip(raw), fields(nodes = raw.node_count(), edges = raw.edge_count()))]
pub fn unify(raw: &RawGraph) -> SimpleGraph {
    let mut bundles: BTreeMap<(usize, usize), Vec<Filament>> = BTreeMap::new();
    let mut self_loops = 0usize;

    for edge in raw.graph.edge_references() {
        let (a, b) = (edge.source().index(), edge.target().index());
        if a == b {
            self_loops += 1;
            continue;
        }
        let mut filament = edge.weight().clone();
        if a > b {
            filament.path.reverse();
        }
        bundles.entry((a.min(b), a.max(b))).or_default().push(filament);
    }

    let mut graph = FilamentGraph::with_capacity(raw.node_count(), bundles.len());
    for node in raw.graph.raw_nodes() {
        graph.add_node(node.weight);
    }

    for (&(lo, hi), members) in &bundles {
        if let Some(merged) = merge_bundle(members) {
            graph.add_edge(NodeIndex::new(lo), NodeIndex::new(hi), merged);
        }
    }

    debug!(
        merged = raw.edge_count() - self_loops - graph.edge_count(),
        self_loops, "unified parallel edges"
    );

    let content_hash = compute_edge_hash(&graph);
    SimpleGraph {
        graph,
        content_hash,
    }
}

fn merge_bundle(members: &[Filament]) -> Option<Filament> {
    let representative = members.iter().max_by(|a, b| representative_order(a, b))?;

    let mut capacities: Vec<f64> = members.iter().map(|f| f.capacity).collect();
    capacities.sort_by(f64::total_cmp);
    let capacity = capacities.iter().sum();

    Some(Filament {
        capacity,
        length: representative.length,
        path: representative.path.clone(),
        origin: representative.origin,
        centrality: 0.0,
    })
}

/// Ordering under which the maximum is the preferred representative:
/// higher capacity, then shorter length, then lexicographically smaller path.
fn representative_order(a: &Filament, b: &Filament) -> Ordering {
    a.capacity
        .total_cmp(&b.capacity)
        .then_with(|| b.length.total_cmp(&a.length))
        .then_with(|| compare_paths(&b.path, &a.path))
}

fn compare_paths(a: &[Point3], b: &[Point3]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(p, q)| p.total_cmp(q))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

/// BLAKE3 hash of the sorted edge list with capacity bits.
fn compute_edge_hash(graph: &FilamentGraph) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(graph.node_count() as u64).to_le_bytes());
    for edge in graph.edge_references() {
        hasher.update(&(edge.source().index() as u64).to_le_bytes());
        hasher.update(&(edge.target().index() as u64).to_le_bytes());
        hasher.update(&edge.weight().capacity.to_bits().to_le_bytes());
        hasher.update(b"\x00");
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::EdgeOrigin;

    fn positions() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
        ]
    }

    fn edge(capacity: f64, path: &[(f64, f64)]) -> Filament {
        Filament::along(
            capacity,
            path.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect(),
            EdgeOrigin::Traced,
        )
    }

    #[test]
    fn parallel_edges_sum_and_keep_heaviest_path() {
        let raw = RawGraph::from_parts(
            &positions(),
            [
                (0, 1, edge(1.0, &[(0.0, 0.0), (4.0, 0.0)])),
                (1, 0, edge(3.0, &[(4.0, 0.0), (2.0, 1.0), (0.0, 0.0)])),
                (1, 2, edge(2.0, &[(4.0, 0.0), (4.0, 4.0)])),
            ],
        );
        let simple = unify(&raw);
        assert_eq!(simple.edge_count(), 2);
        assert_eq!(simple.node_count(), 3);

        let e = simple
            .graph
            .find_edge(NodeIndex::new(0), NodeIndex::new(1))
            .expect("merged edge");
        let f = &simple.graph[e];
        assert!((f.capacity - 4.0).abs() < 1e-12);
        assert_eq!(f.path.len(), 3, "heaviest member's geometry");
        assert_eq!(f.path[0], Point3::new(0.0, 0.0, 0.0), "oriented low to high");
    }

    #[test]
    fn self_loops_are_dropped() {
        let raw = RawGraph::from_parts(
            &positions(),
            [
                (0, 0, edge(1.0, &[(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)])),
                (0, 2, edge(1.0, &[(0.0, 0.0), (4.0, 4.0)])),
            ],
        );
        let simple = unify(&raw);
        assert_eq!(simple.edge_count(), 1);
    }

    #[test]
    fn capacity_ties_prefer_shorter_path() {
        let raw = RawGraph::from_parts(
            &positions(),
            [
                (0, 1, edge(2.0, &[(0.0, 0.0), (2.0, 3.0), (4.0, 0.0)])),
                (0, 1, edge(2.0, &[(0.0, 0.0), (4.0, 0.0)])),
            ],
        );
        let simple = unify(&raw);
        let f = &simple.graph[petgraph::graph::EdgeIndex::new(0)];
        assert!((f.length - 4.0).abs() < 1e-12);
    }

    #[test]
    fn hash_ignores_enumeration_order() {
        let a = RawGraph::from_parts(
            &positions(),
            [
                (0, 1, edge(1.0, &[(0.0, 0.0), (4.0, 0.0)])),
                (1, 2, edge(2.0, &[(4.0, 0.0), (4.0, 4.0)])),
            ],
        );
        let b = RawGraph::from_parts(
            &positions(),
            [
                (2, 1, edge(2.0, &[(4.0, 4.0), (4.0, 0.0)])),
                (1, 0, edge(1.0, &[(4.0, 0.0), (0.0, 0.0)])),
            ],
        );
        assert_eq!(unify(&a).content_hash, unify(&b).content_hash);
    }
}
