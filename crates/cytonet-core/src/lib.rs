#![forbid(unsafe_code)]
//! cytonet-core library.
//!
//! Data model, configuration and input loading shared by every cytonet crate.
//!
//! # Conventions
//!
//! - **Errors**: stage functions return [`error::Result`] with a
//!   [`CytoError`]; binaries wrap them in `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod io;
pub mod tracks;
pub mod volume;

pub use config::{GeometryConfig, PipelineConfig, RandomizeConfig, RandomizePolicy, SkeletonConfig};
pub use error::{CytoError, ErrorCode};
pub use volume::{Mask, Point3, Skeleton, Volume};
