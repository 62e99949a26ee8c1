//! Rescale capacities so they sum to one.

use cytonet_core::error::{CytoError, Result};
use tracing::{instrument, warn};

use super::types::{AnnotatedGraph, FilamentGraph, GraphStage, NormalizedGraph};

/// Divide every capacity by the total capacity.
///
/// # Errors
///
/// Returns [`CytoError::ZeroCapacity`] when the total is zero, negative or
/// not finite.
#[instrument(skip(annotated), fields(edges = annotated.edge_count()))]
pub fn normalize(annotated: AnnotatedGraph) -> Result<NormalizedGraph> {
    let mut graph = annotated.graph;
    let scale = rescale(&mut graph)?;
    Ok(NormalizedGraph { graph, scale })
}

impl NormalizedGraph {
    /// Normalize again. Capacities already sum to one, so this changes them
    /// only by rounding.
    ///
    /// # Errors
    ///
    /// Returns [`CytoError::ZeroCapacity`] under the same conditions as
    /// [`normalize`].
    pub fn renormalize(&self) -> Result<Self> {
        let mut graph = self.graph.clone();
        let scale = rescale(&mut graph)?;
        Ok(Self {
            graph,
            scale: self.scale * scale,
        })
    }
}

fn rescale(graph: &mut FilamentGraph) -> Result<f64> {
    let total: f64 = graph.raw_edges().iter().map(|e| e.weight.capacity).sum();
    if !(total.is_finite() && total > 0.0) {
        warn!(total, "cannot normalize capacities");
        return Err(CytoError::ZeroCapacity { total });
    }
    for filament in graph.edge_weights_mut() {
        filament.capacity /= total;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{EdgeOrigin, Filament, RawGraph};
    use cytonet_core::volume::Point3;

    fn annotated(capacities: &[f64]) -> AnnotatedGraph {
        let p: Vec<Point3> = (0..=capacities.len())
            .map(|i| Point3::new(i as f64, 0.0, 0.0))
            .collect();
        let raw = RawGraph::from_parts(
            &p,
            capacities.iter().enumerate().map(|(i, &c)| {
                (i, i + 1, Filament::straight(c, p[i], p[i + 1], EdgeOrigin::Traced))
            }),
        );
        AnnotatedGraph { graph: raw.graph }
    }

    #[test]
    fn capacities_sum_to_one() {
        let ng = normalize(annotated(&[1.0, 3.0])).expect("normalize");
        assert!((ng.total_capacity() - 1.0).abs() < 1e-12);
        assert!((ng.scale - 4.0).abs() < 1e-12);
        assert!((ng.capacities()[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn zero_total_is_rejected() {
        let err = normalize(annotated(&[0.0, 0.0])).expect_err("zero");
        assert_eq!(err, CytoError::ZeroCapacity { total: 0.0 });
    }

    #[test]
    fn graph_without_edges_is_rejected() {
        assert!(matches!(
            normalize(annotated(&[])),
            Err(CytoError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn renormalize_is_idempotent() {
        let once = normalize(annotated(&[0.1, 0.7, 2.9])).expect("normalize");
        let twice = once.renormalize().expect("renormalize");
        for (a, b) in once.capacities().iter().zip(twice.capacities()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
