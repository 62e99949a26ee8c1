#![forbid(unsafe_code)]
//! cytonet-graph library.
//!
//! Geometric filament graphs: the typed stages from raw multigraph to
//! normalized network, scalar metrics, null-model randomization and GML
//! export.
//!
//! # Conventions
//!
//! - **Errors**: stage functions return `cytonet_core::error::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod export;
pub mod geometry;
pub mod graph;
pub mod metrics;
pub mod randomize;
