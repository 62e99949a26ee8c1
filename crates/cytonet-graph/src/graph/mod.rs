//! Typed filament-graph stages.
//!
//! # Overview
//!
//! Each stage consumes or borrows the previous one and returns the next;
//! the wrapper types carry the invariant that holds at that point.
//!
//! ## Pipeline
//!
//! ```text
//! detector / randomizer
//!        ↓
//! RawGraph        (multigraph, self-loops allowed)
//!        ↓  unify::unify()
//! SimpleGraph     (one edge per pair, content hash)
//!        ↓  connect::repair()
//! ConnectedGraph  (one component)
//!        ↓  annotate::annotate()
//! AnnotatedGraph  (edge betweenness)
//!        ↓  normalize::normalize()
//! NormalizedGraph (capacities sum to one)
//!        ↓  metrics::compute_metrics()
//! MetricsRecord
//! ```
//!
//! ## Typical Usage
//!
//! ```rust,ignore
//! use cytonet_graph::graph::{annotate, normalize, repair, unify};
//! use cytonet_graph::metrics::compute_metrics;
//!
//! let simple = unify(&raw);
//! let connected = repair(&simple, &mask, false)?;
//! let normalized = normalize(annotate(connected))?;
//! let record = compute_metrics(&normalized);
//! ```

pub mod annotate;
pub mod connect;
pub mod normalize;
pub mod types;
pub mod unify;

pub use annotate::annotate;
pub use connect::repair;
pub use normalize::normalize;
pub use types::{
    AnnotatedGraph, ConnectedGraph, EdgeOrigin, Filament, FilamentGraph, GraphStage, Junction,
    NormalizedGraph, RawGraph, SimpleGraph,
};
pub use unify::unify;
