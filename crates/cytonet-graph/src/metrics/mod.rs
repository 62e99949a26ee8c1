//! Scalar descriptors of a normalized filament network.
//!
//! # Overview
//!
//! [`compute_metrics`] turns a [`NormalizedGraph`] into a [`MetricsRecord`]:
//!
//! | field                    | definition                                              |
//! |--------------------------|---------------------------------------------------------|
//! | `node_count`             | junctions                                               |
//! | `edge_count`             | filaments                                               |
//! | `component_count`        | connected components                                    |
//! | `avg_capacity`           | mean edge capacity                                      |
//! | `assortativity`          | degree assortativity (Newman)                           |
//! | `avg_path_length`        | mean shortest-path cost over connected node pairs       |
//! | `cv_path_length`         | coefficient of variation of those costs                 |
//! | `algebraic_connectivity` | second-smallest eigenvalue of the weighted Laplacian    |
//! | `cv_edge_angles`         | coefficient of variation of lateral chord orientations  |
//! | `crossing_number`        | edge pairs whose paths cross away from shared junctions |
//!
//! Path costs treat capacity as a conductance: an edge costs `1 / capacity`.
//!
//! ## Undefined values
//!
//! Statistics that need more data than the graph offers are `None` rather
//! than NaN or a division error: a coefficient of variation over fewer than
//! two distinct values, assortativity of a degree-regular graph, the spectrum
//! of a single node.

pub mod assortativity;
pub mod betweenness;
pub mod layout;
pub mod paths;
pub mod spectral;

use petgraph::algo::connected_components;
use serde::Serialize;
use tracing::instrument;

use crate::graph::types::{Filament, GraphStage, NormalizedGraph};

/// Descriptors of one normalized graph, in table column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
    pub avg_capacity: Option<f64>,
    pub assortativity: Option<f64>,
    pub avg_path_length: Option<f64>,
    pub cv_path_length: Option<f64>,
    pub algebraic_connectivity: Option<f64>,
    pub cv_edge_angles: Option<f64>,
    pub crossing_number: usize,
}

/// Compute every descriptor of `ng`.
#[must_use]
#[instrument(skip(ng), fields(nodes = ng.node_count(), edges = ng.edge_count()))]
pub fn compute_metrics(ng: &NormalizedGraph) -> MetricsRecord {
    let graph = &ng.graph;
    let capacities = ng.capacities();
    let path_lengths = paths::pairwise_path_lengths(graph);
    let angles = layout::edge_angles(graph);

    MetricsRecord {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        component_count: connected_components(graph),
        avg_capacity: mean(&capacities),
        assortativity: assortativity::degree_assortativity(graph),
        avg_path_length: mean(&path_lengths),
        cv_path_length: coefficient_of_variation(&path_lengths),
        algebraic_connectivity: spectral::algebraic_connectivity(graph),
        cv_edge_angles: coefficient_of_variation(&angles),
        crossing_number: layout::crossing_number(graph),
    }
}

/// Cost of traversing a filament: the inverse of its capacity. Edges without
/// positive finite capacity do not conduct.
#[must_use]
pub fn conductance_cost(filament: &Filament) -> f64 {
    if filament.capacity > 0.0 && filament.capacity.is_finite() {
        filament.capacity.recip()
    } else {
        f64::INFINITY
    }
}

/// Arithmetic mean; `None` for an empty sample.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation over the mean.
///
/// `None` when the sample has fewer than two distinct values or a zero mean.
#[must_use]
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let mut distinct = values.to_vec();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    if distinct.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    if mu == 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt() / mu.abs())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
