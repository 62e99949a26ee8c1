//! Null-model randomization of a simple graph.
//!
//! # Policies
//!
//! - [`RandomizePolicy::Weights`]: keep nodes and edges, permute the
//!   capacities over the edges uniformly at random.
//! - [`RandomizePolicy::Full`]: keep the nodes, draw a fresh edge set of the
//!   same size. Candidate pairs are drawn uniformly; a candidate is rejected
//!   when it duplicates an accepted edge, when its straight segment leaves
//!   the mask, or (with `planar`) when it crosses an accepted edge. The
//!   original capacities are permuted over the new edges.
//!
//! # Termination
//!
//! Full reshuffling works in rounds. Each round has a budget of draws; a
//! round that cannot place every edge is discarded. After `max_attempts`
//! rounds the randomizer gives up with
//! [`CytoError::RandomizationConstraintExhausted`]. Targets that exceed the
//! number of node pairs, or the planar bound `3n - 6`, fail up front.
//!
//! # Determinism
//!
//! Callers seed one [`ChaCha8Rng`] per `(seed, frame, repeat)` through
//! [`repeat_rng`], so results do not depend on which thread runs a repeat.

use std::collections::HashSet;

use cytonet_core::config::{RandomizeConfig, RandomizePolicy};
use cytonet_core::error::{CytoError, Result};
use cytonet_core::volume::{Mask, Point3};
use petgraph::graph::NodeIndex;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::geometry::paths_cross;
use crate::graph::types::{
    EdgeOrigin, Filament, FilamentGraph, GraphStage, Junction, RawGraph, SimpleGraph,
};

/// Draws allowed per target edge in one round.
const DRAWS_PER_EDGE: usize = 64;
/// Lower bound on the draws of one round, for very small targets.
const MIN_DRAWS_PER_ROUND: usize = 256;

/// The random stream for one `(frame, repeat)` unit.
#[must_use]
pub fn repeat_rng(seed: u64, frame: usize, repeat: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ (frame as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    rng.set_stream(repeat as u64);
    rng
}

/// Produce one randomized counterpart of `simple` under `config.policy`.
///
/// # Errors
///
/// Returns [`CytoError::RandomizationConstraintExhausted`] when a full
/// reshuffle cannot place the target number of edges.
#[instrument(skip(simple, mask, config, rng), fields(policy = config.policy.as_str(), planar = config.planar))]
pub fn randomize<R: Rng>(
    simple: &SimpleGraph,
    mask: &Mask,
    config: &RandomizeConfig,
    rng: &mut R,
) -> Result<RawGraph> {
    match config.policy {
        RandomizePolicy::Weights => Ok(shuffle_weights(simple, rng)),
        RandomizePolicy::Full => reshuffle_edges(simple, mask, config, rng),
    }
}

/// Permute capacities over the fixed edge set.
#[must_use]
pub fn shuffle_weights<R: Rng>(simple: &SimpleGraph, rng: &mut R) -> RawGraph {
    let mut capacities = simple.capacities();
    capacities.shuffle(rng);
    let mut graph = simple.graph.clone();
    for (filament, capacity) in graph.edge_weights_mut().zip(capacities) {
        filament.capacity = capacity;
        filament.centrality = 0.0;
    }
    RawGraph { graph }
}

/// Draw a new edge set over the same nodes.
///
/// # Errors
///
/// Returns [`CytoError::RandomizationConstraintExhausted`] if the target edge
/// count is infeasible or no round succeeds within `config.max_attempts`.
pub fn reshuffle_edges<R: Rng>(
    simple: &SimpleGraph,
    mask: &Mask,
    config: &RandomizeConfig,
    rng: &mut R,
) -> Result<RawGraph> {
    let positions = simple.positions();
    let n = positions.len();
    let target = simple.edge_count();

    let pair_limit = n * n.saturating_sub(1) / 2;
    if target > pair_limit {
        return Err(CytoError::RandomizationConstraintExhausted {
            attempts: 0,
            reason: format!("{target} edges requested but only {pair_limit} node pairs exist"),
        });
    }
    if config.planar && n >= 3 && target > 3 * n - 6 {
        return Err(CytoError::RandomizationConstraintExhausted {
            attempts: 0,
            reason: format!("{target} edges exceed the planar bound {} for {n} nodes", 3 * n - 6),
        });
    }

    let draws = (DRAWS_PER_EDGE * target).max(MIN_DRAWS_PER_ROUND);
    for round in 1..=config.max_attempts {
        if let Some(pairs) = draw_round(&positions, mask, config.planar, target, draws, rng) {
            debug!(round, edges = pairs.len(), "randomized edge set accepted");
            let mut capacities = simple.capacities();
            capacities.shuffle(rng);
            return Ok(assemble(&positions, &pairs, &capacities));
        }
    }

    Err(CytoError::RandomizationConstraintExhausted {
        attempts: config.max_attempts,
        reason: format!(
            "could not place {target} {}edges among {n} nodes",
            if config.planar { "non-crossing " } else { "" }
        ),
    })
}

/// One round of rejection sampling. `None` when the draw budget runs out.
fn draw_round<R: Rng>(
    positions: &[Point3],
    mask: &Mask,
    planar: bool,
    target: usize,
    draws: usize,
    rng: &mut R,
) -> Option<Vec<(usize, usize)>> {
    let n = positions.len();
    let mut accepted: Vec<(usize, usize)> = Vec::with_capacity(target);
    let mut seen: HashSet<(usize, usize)> = HashSet::with_capacity(target);

    for _ in 0..draws {
        if accepted.len() == target {
            break;
        }
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        if a == b {
            continue;
        }
        let pair = (a.min(b), a.max(b));
        if seen.contains(&pair) {
            continue;
        }
        let segment = [positions[pair.0], positions[pair.1]];
        if !mask.contains_segment(&segment[0], &segment[1]) {
            continue;
        }
        if planar
            && accepted.iter().any(|&(u, v)| {
                let shared: Vec<Point3> = [u, v]
                    .into_iter()
                    .filter(|&k| k == pair.0 || k == pair.1)
                    .map(|k| positions[k])
                    .collect();
                paths_cross(&segment, &[positions[u], positions[v]], &shared)
            })
        {
            continue;
        }
        seen.insert(pair);
        accepted.push(pair);
    }

    (accepted.len() == target).then_some(accepted)
}

fn assemble(positions: &[Point3], pairs: &[(usize, usize)], capacities: &[f64]) -> RawGraph {
    let mut graph = FilamentGraph::with_capacity(positions.len(), pairs.len());
    for &p in positions {
        graph.add_node(Junction::at(p));
    }
    for (&(u, v), &capacity) in pairs.iter().zip(capacities) {
        graph.add_edge(
            NodeIndex::new(u),
            NodeIndex::new(v),
            Filament::straight(capacity, positions[u], positions[v], EdgeOrigin::Randomized),
        );
    }
    RawGraph { graph }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
