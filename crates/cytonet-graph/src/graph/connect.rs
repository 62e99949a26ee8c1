//! Bridge disconnected components into a single network.
//!
//! # Algorithm
//!
//! Kruskal's algorithm over candidate bridges, visited lazily:
//!
//! 1. Label the existing components with a union-find.
//! 2. Bucket the nodes into a uniform grid. Each node streams its partners
//!    of higher index in other components, nearest first, by scanning grid
//!    shells outwards. A partner is released only once no unscanned cell can
//!    hold a closer one.
//! 3. A min-heap holds the head of every stream, so pairs come out in
//!    `(distance, lower index, higher index)` order without ever
//!    materializing all pairs. Accept a pair when its endpoints are still in
//!    different components, its straight segment stays inside the mask, and
//!    (in planar mode) it crosses no existing edge path or earlier bridge.
//!
//! Exactly `components - 1` bridges are added. Running out of candidates
//! first is a [`CytoError::StructuralInconsistency`].

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use cytonet_core::error::{CytoError, Result};
use cytonet_core::volume::{Mask, Point3};
use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use tracing::{debug, instrument, trace, warn};

use super::types::{ConnectedGraph, EdgeOrigin, Filament, GraphStage, SimpleGraph};
use crate::geometry::paths_cross;

/// A candidate bridge `low -> high`, `low < high`.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    low: usize,
    high: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.low.cmp(&other.low))
            .then_with(|| self.high.cmp(&other.high))
    }
}

type Cell = [usize; 3];

/// Uniform bucket grid over node positions, about one node per cell.
struct Grid {
    origin: Point3,
    side: f64,
    dims: Cell,
    buckets: Vec<Vec<usize>>,
}

const fn coords(p: &Point3) -> [f64; 3] {
    [p.x, p.y, p.z]
}

impl Grid {
    fn new(positions: &[Point3]) -> Self {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in positions {
            for (k, c) in coords(p).into_iter().enumerate() {
                lo[k] = lo[k].min(c);
                hi[k] = hi[k].max(c);
            }
        }
        let extents: Vec<f64> = (0..3).map(|k| hi[k] - lo[k]).filter(|&e| e > 0.0).collect();
        let side = if extents.is_empty() {
            1.0
        } else {
            let volume: f64 = extents.iter().product();
            (volume / positions.len().max(1) as f64).powf(1.0 / extents.len() as f64)
        };
        let side = if side.is_finite() && side > 0.0 { side } else { 1.0 };
        let dims = std::array::from_fn(|k| ((hi[k] - lo[k]).max(0.0) / side).floor() as usize + 1);

        let mut grid = Self {
            origin: Point3::new(lo[0], lo[1], lo[2]),
            side,
            dims,
            buckets: vec![Vec::new(); dims.iter().product()],
        };
        for (i, p) in positions.iter().enumerate() {
            let slot = grid.slot(grid.cell_of(p));
            grid.buckets[slot].push(i);
        }
        grid
    }

    fn cell_of(&self, p: &Point3) -> Cell {
        let o = coords(&self.origin);
        let c = coords(p);
        std::array::from_fn(|k| (((c[k] - o[k]) / self.side).floor().max(0.0) as usize).min(self.dims[k] - 1))
    }

    const fn slot(&self, c: Cell) -> usize {
        (c[0] * self.dims[1] + c[1]) * self.dims[2] + c[2]
    }

    /// Largest shell radius around `c` that still holds cells.
    fn reach(&self, c: Cell) -> usize {
        (0..3).map(|k| c[k].max(self.dims[k] - 1 - c[k])).max().unwrap_or(0)
    }

    /// Visit the buckets at Chebyshev distance exactly `r` from `c`.
    fn shell(&self, c: Cell, r: usize, mut visit: impl FnMut(&[usize])) {
        let lo: [usize; 3] = std::array::from_fn(|k| c[k].saturating_sub(r));
        let hi: [usize; 3] = std::array::from_fn(|k| (c[k] + r).min(self.dims[k] - 1));
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                if x.abs_diff(c[0]) == r || y.abs_diff(c[1]) == r {
                    for z in lo[2]..=hi[2] {
                        visit(&self.buckets[self.slot([x, y, z])]);
                    }
                } else {
                    // Interior column: only the two z faces lie on the shell.
                    if c[2] >= r {
                        visit(&self.buckets[self.slot([x, y, c[2] - r])]);
                    }
                    if r > 0 && c[2] + r < self.dims[2] {
                        visit(&self.buckets[self.slot([x, y, c[2] + r])]);
                    }
                }
            }
        }
    }
}

/// Partners of one node in other components, nearest first.
struct Partners {
    node: usize,
    cell: Cell,
    /// Shells scanned so far.
    rings: usize,
    pending: BinaryHeap<Reverse<Candidate>>,
}

impl Partners {
    fn new(node: usize, grid: &Grid, positions: &[Point3]) -> Self {
        Self {
            node,
            cell: grid.cell_of(&positions[node]),
            rings: 0,
            pending: BinaryHeap::new(),
        }
    }

    fn advance(&mut self, grid: &Grid, positions: &[Point3], components: &UnionFind<usize>) -> Option<Candidate> {
        loop {
            let exhausted = self.rings > grid.reach(self.cell);
            if let Some(&Reverse(head)) = self.pending.peek() {
                // Unscanned cells lie farther than `(rings - 1) * side`.
                let settled = self.rings as f64 - 1.0;
                if exhausted || head.distance < settled * grid.side {
                    self.pending.pop();
                    return Some(head);
                }
            }
            if exhausted {
                return None;
            }
            let (i, pending) = (self.node, &mut self.pending);
            grid.shell(self.cell, self.rings, |bucket| {
                for &j in bucket {
                    if j > i && !components.equiv(i, j) {
                        pending.push(Reverse(Candidate {
                            distance: positions[i].distance(&positions[j]),
                            low: i,
                            high: j,
                        }));
                    }
                }
            });
            self.rings += 1;
        }
    }
}

/// Add bridge edges until `simple` has one connected component.
///
/// Bridges get the minimum capacity found in the input graph.
///
/// # Errors
///
/// Returns [`CytoError::StructuralInconsistency`] when some components
/// cannot be joined by an admissible bridge, and
/// [`CytoError::DegenerateSkeleton`] when there are several components but
/// no edge to take a bridge capacity from.
#[instrument(skip(simple, mask), fields(nodes = simple.node_count(), edges = simple.edge_count()))]
pub fn repair(simple: &SimpleGraph, mask: &Mask, planar: bool) -> Result<ConnectedGraph> {
    let mut graph = simple.graph.clone();
    let n = graph.node_count();

    let mut components = UnionFind::<usize>::new(n);
    for edge in graph.edge_references() {
        components.union(edge.source().index(), edge.target().index());
    }
    let mut roots = components.clone().into_labeling();
    roots.sort_unstable();
    roots.dedup();
    let component_count = roots.len();

    if component_count <= 1 {
        return Ok(ConnectedGraph { graph, bridges: 0 });
    }

    let bridge_capacity = graph
        .raw_edges()
        .iter()
        .map(|e| e.weight.capacity)
        .min_by(f64::total_cmp)
        .ok_or_else(|| {
            CytoError::DegenerateSkeleton(format!(
                "{component_count} components but no edge to derive a bridge capacity from"
            ))
        })?;

    let positions = simple.positions();
    let grid = Grid::new(&positions);
    let mut streams: Vec<Partners> = (0..n).map(|i| Partners::new(i, &grid, &positions)).collect();
    let mut queue: BinaryHeap<Reverse<Candidate>> = streams
        .iter_mut()
        .filter_map(|s| s.advance(&grid, &positions, &components))
        .map(Reverse)
        .collect();
    trace!(cells = grid.buckets.len(), side = grid.side, "bridge grid built");

    let needed = component_count - 1;
    let mut bridges = 0usize;
    while bridges < needed {
        let Some(Reverse(Candidate { low: i, high: j, .. })) = queue.pop() else {
            break;
        };
        if let Some(next) = streams[i].advance(&grid, &positions, &components) {
            queue.push(Reverse(next));
        }
        if components.equiv(i, j) {
            continue;
        }
        let (a, b) = (positions[i], positions[j]);
        if !mask.contains_segment(&a, &b) {
            continue;
        }
        let segment = [a, b];
        if planar
            && graph.edge_references().any(|e| {
                let (s, t) = (e.source().index(), e.target().index());
                let shared: Vec<_> = [s, t]
                    .into_iter()
                    .filter(|&k| k == i || k == j)
                    .map(|k| positions[k])
                    .collect();
                paths_cross(&segment, &e.weight().path, &shared)
            })
        {
            continue;
        }
        graph.add_edge(
            NodeIndex::new(i),
            NodeIndex::new(j),
            Filament::straight(bridge_capacity, a, b, EdgeOrigin::Bridge),
        );
        components.union(i, j);
        bridges += 1;
    }

    if bridges < needed {
        let remaining = component_count - bridges;
        warn!(
            components = component_count,
            remaining, "no admissible in-mask bridge left"
        );
        return Err(CytoError::StructuralInconsistency {
            components: remaining,
        });
    }

    debug!(components = component_count, bridges, "graph repaired");
    Ok(ConnectedGraph { graph, bridges })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::RawGraph;
    use crate::graph::unify::unify;
    use cytonet_core::volume::Point3;

    fn full_mask() -> Mask {
        Mask::full(32, 32)
    }

    fn segment(a: Point3, b: Point3, capacity: f64) -> Filament {
        Filament::straight(capacity, a, b, EdgeOrigin::Traced)
    }

    fn two_segments() -> SimpleGraph {
        let p = vec![
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 10.0, 0.0),
            Point3::new(6.0, 2.0, 0.0),
            Point3::new(6.0, 10.0, 0.0),
        ];
        unify(&RawGraph::from_parts(
            &p,
            [
                (0, 1, segment(p[0], p[1], 3.0)),
                (2, 3, segment(p[2], p[3], 5.0)),
            ],
        ))
    }

    #[test]
    fn connected_graph_is_unchanged() {
        let p = vec![Point3::new(1.0, 1.0, 0.0), Point3::new(1.0, 9.0, 0.0)];
        let simple = unify(&RawGraph::from_parts(&p, [(0, 1, segment(p[0], p[1], 1.0))]));
        let connected = repair(&simple, &full_mask(), true).expect("connected");
        assert_eq!(connected.bridges, 0);
        assert_eq!(connected.edge_count(), 1);
    }

    #[test]
    fn two_segments_get_one_minimum_capacity_bridge() {
        let connected = repair(&two_segments(), &full_mask(), true).expect("bridged");
        assert_eq!(connected.bridges, 1);
        assert_eq!(connected.node_count(), 4);
        assert_eq!(connected.edge_count(), 3);
        assert_eq!(petgraph::algo::connected_components(&connected.graph), 1);

        let bridge = connected
            .graph
            .edge_references()
            .find(|e| e.weight().origin == EdgeOrigin::Bridge)
            .expect("bridge edge");
        assert!((bridge.weight().capacity - 3.0).abs() < f64::EPSILON);
        // Closest pair is (0, 2) at distance 4; (1, 3) ties and loses on index.
        assert_eq!(
            (bridge.source().index(), bridge.target().index()),
            (0, 2)
        );
    }

    #[test]
    fn bridge_must_stay_in_mask() {
        // Background column at x = 4 separates the two segments.
        let mut data = ndarray::Array2::from_elem((32, 32), true);
        for y in 0..32 {
            data[[4, y]] = false;
        }
        let err = repair(&two_segments(), &Mask::new(data), false).expect_err("no bridge");
        assert_eq!(err, CytoError::StructuralInconsistency { components: 2 });
    }

    #[test]
    fn isolated_nodes_without_edges_are_degenerate() {
        let p = vec![Point3::new(1.0, 1.0, 0.0), Point3::new(5.0, 5.0, 0.0)];
        let simple = unify(&RawGraph::from_parts(&p, []));
        assert!(matches!(
            repair(&simple, &full_mask(), false),
            Err(CytoError::DegenerateSkeleton(_))
        ));
    }

    fn scattered(n: usize) -> Vec<Point3> {
        (0..n)
            .map(|i| {
                Point3::new(
                    ((i * 37) % 101) as f64 * 0.5,
                    ((i * 53) % 89) as f64 * 0.25,
                    (i % 3) as f64,
                )
            })
            .collect()
    }

    #[test]
    fn streamed_candidates_follow_exhaustive_order() {
        let positions = scattered(120);
        let n = positions.len();
        let mut components = UnionFind::<usize>::new(n);
        for i in (0..n - 1).filter(|i| i % 4 != 3) {
            components.union(i, i + 1);
        }

        let mut expected = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if !components.equiv(i, j) {
                    expected.push(Candidate {
                        distance: positions[i].distance(&positions[j]),
                        low: i,
                        high: j,
                    });
                }
            }
        }
        expected.sort();

        let grid = Grid::new(&positions);
        let mut streams: Vec<Partners> = (0..n).map(|i| Partners::new(i, &grid, &positions)).collect();
        let mut queue: BinaryHeap<Reverse<Candidate>> = streams
            .iter_mut()
            .filter_map(|s| s.advance(&grid, &positions, &components))
            .map(Reverse)
            .collect();
        let mut streamed = Vec::new();
        while let Some(Reverse(c)) = queue.pop() {
            if let Some(next) = streams[c.low].advance(&grid, &positions, &components) {
                queue.push(Reverse(next));
            }
            streamed.push(c);
        }
        assert_eq!(streamed.len(), expected.len());
        assert_eq!(streamed, expected);
    }

    #[test]
    fn lattice_of_many_components_is_bridged() {
        // 30 x 30 short vertical segments, one component each.
        let mut p = Vec::new();
        let mut edges = Vec::new();
        for a in 0..30 {
            for b in 0..30 {
                let (x, y) = (f64::from(4 * a + 1), f64::from(4 * b + 1));
                let k = p.len();
                p.push(Point3::new(x, y, 0.0));
                p.push(Point3::new(x, y + 1.0, 0.0));
                edges.push((k, k + 1, segment(p[k], p[k + 1], 2.0)));
            }
        }
        let simple = unify(&RawGraph::from_parts(&p, edges));
        let connected = repair(&simple, &Mask::full(128, 128), false).expect("bridged");
        assert_eq!(connected.bridges, 899);
        assert_eq!(connected.edge_count(), 900 + 899);
        assert_eq!(petgraph::algo::connected_components(&connected.graph), 1);
        // Nearest neighbours are 3 apart vertically; no bridge is longer than
        // the 4-pixel lateral spacing.
        let positions = connected.positions();
        assert!(connected
            .graph
            .edge_references()
            .filter(|e| e.weight().origin == EdgeOrigin::Bridge)
            .all(|e| positions[e.source().index()].distance(&positions[e.target().index()]) <= 4.0 + 1e-9));
    }
}
