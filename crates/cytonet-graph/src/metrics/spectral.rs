//! Algebraic connectivity of the capacity-weighted Laplacian.
//!
//! Small graphs take the full dense eigendecomposition. Larger ones run
//! Lanczos on a sparse Laplacian restricted to the complement of the constant
//! vector, where the smallest eigenvalue is the Fiedler value itself.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use petgraph::visit::EdgeRef;
use tracing::trace;

use crate::graph::types::FilamentGraph;

/// Graphs up to this many nodes use the dense solver.
const DENSE_LIMIT: usize = 400;

/// Lanczos steps between convergence checks.
const CHECK_EVERY: usize = 8;

/// Residual bound, relative to the spectral radius bound.
const TOLERANCE: f64 = 1e-11;

/// Weighted Laplacian `L = D - A` with `A[u][v]` the summed capacity of the
/// edges between `u` and `v`. Self-loops contribute nothing.
#[must_use]
pub fn weighted_laplacian(graph: &FilamentGraph) -> DMatrix<f64> {
    let n = graph.node_count();
    let mut laplacian = DMatrix::zeros(n, n);
    for edge in graph.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        if u == v {
            continue;
        }
        let w = edge.weight().capacity;
        laplacian[(u, v)] -= w;
        laplacian[(v, u)] -= w;
        laplacian[(u, u)] += w;
        laplacian[(v, v)] += w;
    }
    laplacian
}

/// Second-smallest eigenvalue of the weighted Laplacian (Fiedler value).
///
/// `None` for graphs with fewer than two nodes.
#[must_use]
pub fn algebraic_connectivity(graph: &FilamentGraph) -> Option<f64> {
    match graph.node_count() {
        0 | 1 => None,
        n if n <= DENSE_LIMIT => dense_fiedler(graph),
        _ => Some(lanczos_fiedler(&SparseLaplacian::new(graph))),
    }
}

fn dense_fiedler(graph: &FilamentGraph) -> Option<f64> {
    let eigen = SymmetricEigen::new(weighted_laplacian(graph));
    let mut eigenvalues: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
    eigenvalues.sort_by(f64::total_cmp);
    eigenvalues.get(1).copied()
}

/// Laplacian as weighted degrees plus adjacency lists.
struct SparseLaplacian {
    degree: Vec<f64>,
    neighbours: Vec<Vec<(usize, f64)>>,
}

impl SparseLaplacian {
    fn new(graph: &FilamentGraph) -> Self {
        let n = graph.node_count();
        let mut degree = vec![0.0; n];
        let mut neighbours = vec![Vec::new(); n];
        for edge in graph.edge_references() {
            let (u, v) = (edge.source().index(), edge.target().index());
            if u == v {
                continue;
            }
            let w = edge.weight().capacity;
            degree[u] += w;
            degree[v] += w;
            neighbours[u].push((v, w));
            neighbours[v].push((u, w));
        }
        Self { degree, neighbours }
    }

    fn len(&self) -> usize {
        self.degree.len()
    }

    fn apply(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.len(), |i, _| {
            let pulled: f64 = self.neighbours[i].iter().map(|&(j, w)| w * x[j]).sum();
            self.degree[i].mul_add(x[i], -pulled)
        })
    }

    /// Gershgorin bound on the largest eigenvalue.
    fn radius(&self) -> f64 {
        2.0 * self.degree.iter().copied().fold(0.0, f64::max)
    }
}

/// Smallest eigenvalue of the tridiagonal `(alpha, beta)` and the Lanczos
/// residual `next_beta * |last component of its eigenvector|`.
fn smallest_ritz(alpha: &[f64], beta: &[f64], next_beta: f64) -> (f64, f64) {
    let m = alpha.len();
    let tridiagonal = DMatrix::from_fn(m, m, |r, c| match r.abs_diff(c) {
        0 => alpha[r],
        1 => beta[r.min(c)],
        _ => 0.0,
    });
    let eigen = SymmetricEigen::new(tridiagonal);
    let (k, theta) = eigen
        .eigenvalues
        .iter()
        .copied()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0));
    (theta, next_beta * eigen.eigenvectors[(m - 1, k)].abs())
}

/// Lanczos with full reorthogonalization on the complement of the constant
/// vector. Needs at least two nodes.
fn lanczos_fiedler(laplacian: &SparseLaplacian) -> f64 {
    let n = laplacian.len();
    let ones = DVector::from_element(n, 1.0 / (n as f64).sqrt());
    let deflate = |v: &mut DVector<f64>| {
        let c = ones.dot(&*v);
        v.axpy(-c, &ones, 1.0);
    };

    // Deterministic start with no constant component.
    let mut start = DVector::from_fn(n, |i, _| ((i as f64 + 1.0) * 0.618_033_988_749_895).fract() - 0.5);
    deflate(&mut start);
    start.normalize_mut();

    let tolerance = TOLERANCE * laplacian.radius().max(1.0);
    let mut basis = vec![start];
    let mut alpha = Vec::new();
    let mut beta = Vec::new();
    loop {
        let current = &basis[basis.len() - 1];
        let mut w = laplacian.apply(current);
        alpha.push(current.dot(&w));
        // Two Gram-Schmidt sweeps keep the basis orthogonal to working precision.
        for _ in 0..2 {
            deflate(&mut w);
            for q in &basis {
                let c = q.dot(&w);
                w.axpy(-c, q, 1.0);
            }
        }
        let next_beta = w.norm();
        let m = alpha.len();
        let last = m == n - 1 || next_beta <= tolerance;
        if last || m % CHECK_EVERY == 0 {
            let (theta, residual) = smallest_ritz(&alpha, &beta, next_beta);
            if last || residual <= tolerance {
                trace!(nodes = n, steps = m, residual, "lanczos converged");
                return theta;
            }
        }
        beta.push(next_beta);
        basis.push(w / next_beta);
    }
}
