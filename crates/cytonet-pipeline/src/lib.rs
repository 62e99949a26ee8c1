#![forbid(unsafe_code)]
//! cytonet-pipeline library.
//!
//! Runs a stack of frames through extraction, the real-graph chain and the
//! randomized repeats ([`orchestrator`]), then writes the tables and graph
//! exports of the run ([`report`]).
//!
//! # Conventions
//!
//! - **Errors**: stage errors are recorded per unit of work, never
//!   propagated; output writers return `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod orchestrator;
pub mod report;

pub use orchestrator::{
    Cancellation, FailureRecord, MetricsRow, Orchestrator, RunReport, RunSummary, Stage,
};
pub use report::write_outputs;
