#![forbid(unsafe_code)]
//! cytonet-extract library.
//!
//! Raster side of the pipeline: one frame's intensity volume to a skeleton
//! ([`skeleton`]) and the skeleton to a raw geometric multigraph
//! ([`detect`]).
//!
//! # Conventions
//!
//! - **Axes**: rasters are indexed `[x, y, z]`; filters act per z-slice,
//!   connectivity is 26-neighbour in 3-D.
//! - **Errors**: stage functions return `cytonet_core::error::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod detect;
pub mod filter;
pub mod lattice;
pub mod skeleton;
pub mod thin;
pub mod threshold;

pub use detect::detect_graph;
pub use skeleton::{SkeletonResult, extract_skeleton};

use cytonet_core::config::PipelineConfig;
use cytonet_core::error::Result;
use cytonet_core::volume::{Mask, Volume};
use cytonet_graph::graph::RawGraph;

/// Skeletonize `volume` and trace it into a raw graph.
///
/// # Errors
///
/// Propagates [`extract_skeleton`] and [`detect_graph`] errors.
pub fn trace_frame(volume: &Volume, mask: &Mask, config: &PipelineConfig) -> Result<RawGraph> {
    let extracted = extract_skeleton(volume, mask, &config.skeleton)?;
    detect_graph(&extracted.skeleton, &extracted.smoothed, config.geometry.z_spacing)
}
