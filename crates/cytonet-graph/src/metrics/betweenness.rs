//! Edge betweenness centrality via Brandes' algorithm.
//!
//! # Overview
//!
//! Edge betweenness counts, for every edge, the fraction of shortest paths
//! between node pairs that run through it. Filaments carrying many shortest
//! paths are the bottlenecks of the network.
//!
//! # Algorithm
//!
//! Brandes (2001) adapted to weighted undirected graphs:
//!
//! 1. For each source `s`, run Dijkstra with edge cost
//!    [`conductance_cost`](super::conductance_cost), tracking shortest-path
//!    counts and the predecessor edges on every shortest path.
//! 2. Pop nodes in reverse settle order, pushing each node's dependency back
//!    onto its predecessor edges.
//! 3. Sum the edge dependencies across all sources.
//!
//! Complexity: O(V · E log V).
//!
//! # Output
//!
//! Scores indexed by edge index, scaled so the largest is 1.0. A graph with
//! a single edge therefore gives that edge 1.0. All scores are zero only
//! when no shortest path exists at all.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fixedbitset::FixedBitSet;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use tracing::instrument;

use super::conductance_cost;
use crate::graph::types::FilamentGraph;

/// Relative tolerance under which two path costs are the same length.
const TIE_TOLERANCE: f64 = 1e-12;

/// Min-heap entry for Dijkstra.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn same_cost(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Weighted edge betweenness of every edge, scaled to a maximum of 1.0.
#[must_use]
#[instrument(skip(graph), fields(nodes = graph.node_count(), edges = graph.edge_count()))]
pub fn edge_betweenness(graph: &FilamentGraph) -> Vec<f64> {
    let n = graph.node_count();
    let m = graph.edge_count();
    let mut cb = vec![0.0; m];

    for s in 0..n {
        // Nodes in settle order (farthest popped first during accumulation).
        let mut stack: Vec<usize> = Vec::with_capacity(n);
        // (predecessor node, edge index) pairs on shortest paths into each node.
        let mut predecessors: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0; n];
        let mut dist = vec![f64::INFINITY; n];
        let mut settled = FixedBitSet::with_capacity(n);

        sigma[s] = 1.0;
        dist[s] = 0.0;
        let mut heap = BinaryHeap::new();
        heap.push(Frontier { cost: 0.0, node: s });

        while let Some(Frontier { cost, node: v }) = heap.pop() {
            if settled.contains(v) || cost > dist[v] {
                continue;
            }
            settled.insert(v);
            stack.push(v);

            for edge in graph.edges(NodeIndex::new(v)) {
                let w = if edge.source().index() == v {
                    edge.target().index()
                } else {
                    edge.source().index()
                };
                if w == v || settled.contains(w) {
                    continue;
                }
                let alt = dist[v] + conductance_cost(edge.weight());
                if !alt.is_finite() {
                    continue;
                }
                if dist[w].is_finite() && same_cost(alt, dist[w]) {
                    sigma[w] += sigma[v];
                    predecessors[w].push((v, edge.id().index()));
                } else if alt < dist[w] {
                    dist[w] = alt;
                    sigma[w] = sigma[v];
                    predecessors[w].clear();
                    predecessors[w].push((v, edge.id().index()));
                    heap.push(Frontier { cost: alt, node: w });
                }
            }
        }

        let mut delta = vec![0.0; n];
        while let Some(w) = stack.pop() {
            for &(v, e) in &predecessors[w] {
                if sigma[w] > 0.0 {
                    let share = (sigma[v] / sigma[w]) * (1.0 + delta[w]);
                    cb[e] += share;
                    delta[v] += share;
                }
            }
        }
    }

    let max = cb.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for score in &mut cb {
            *score /= max;
        }
    }
    cb
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
