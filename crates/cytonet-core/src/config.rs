use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CytoError;

/// Every tunable of the extraction and randomization pipeline.
///
/// Stages receive the sub-struct they need by reference; nothing reads
/// process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub skeleton: SkeletonConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub randomize: RandomizeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonConfig {
    /// Width (Gaussian sigma, pixels) of the smoothing and ridge filters.
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    /// Side of the lateral window used by the adaptive threshold; odd.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Connected components with fewer voxels are discarded.
    #[serde(default = "default_min_component_size")]
    pub min_component_size: usize,
    /// Skeleton voxels below this fraction of the mean ridge response are cut.
    #[serde(default = "default_intensity_fraction")]
    pub intensity_fraction: f64,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            line_width: default_line_width(),
            block_size: default_block_size(),
            min_component_size: default_min_component_size(),
            intensity_fraction: default_intensity_fraction(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Distance between z-slices in lateral pixel units.
    #[serde(default = "default_z_spacing")]
    pub z_spacing: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            z_spacing: default_z_spacing(),
        }
    }
}

/// What the null model is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RandomizePolicy {
    /// Keep the topology, permute capacities over the edges.
    #[default]
    Weights,
    /// Draw a new edge set over the same node positions.
    Full,
}

impl RandomizePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weights => "weights",
            Self::Full => "full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomizeConfig {
    #[serde(default)]
    pub policy: RandomizePolicy,
    /// Reject randomized edge sets whose paths cross.
    #[serde(default = "default_true")]
    pub planar: bool,
    /// Randomized graphs generated per frame.
    #[serde(default = "default_repeats")]
    pub repeats: usize,
    /// Rejection-sampling rounds before giving up on a repeat.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base seed; each `(frame, repeat)` derives its own stream from it.
    #[serde(default)]
    pub seed: u64,
}

impl Default for RandomizeConfig {
    fn default() -> Self {
        Self {
            policy: RandomizePolicy::default(),
            planar: default_true(),
            repeats: default_repeats(),
            max_attempts: default_max_attempts(),
            seed: 0,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns [`CytoError::ConfigInvalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CytoError> {
        let s = &self.skeleton;
        if !(s.line_width.is_finite() && s.line_width > 0.0) {
            return Err(invalid(format!(
                "skeleton.line_width must be > 0, got {}",
                s.line_width
            )));
        }
        if s.block_size < 3 || s.block_size % 2 == 0 {
            return Err(invalid(format!(
                "skeleton.block_size must be odd and >= 3, got {}",
                s.block_size
            )));
        }
        if !(s.intensity_fraction > 0.0 && s.intensity_fraction <= 1.0) {
            return Err(invalid(format!(
                "skeleton.intensity_fraction must be in (0, 1], got {}",
                s.intensity_fraction
            )));
        }
        if !(self.geometry.z_spacing.is_finite() && self.geometry.z_spacing > 0.0) {
            return Err(invalid(format!(
                "geometry.z_spacing must be > 0, got {}",
                self.geometry.z_spacing
            )));
        }
        if self.randomize.max_attempts == 0 {
            return Err(invalid("randomize.max_attempts must be > 0".to_string()));
        }
        Ok(())
    }

    /// Render as TOML, as accepted by [`load_config`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

fn invalid(message: String) -> CytoError {
    CytoError::ConfigInvalid(message)
}

/// Load a config file. Missing sections and fields take their defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<PipelineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Location of the per-user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cytonet/config.toml"))
}

/// Load the explicit config file if given, otherwise the per-user one,
/// otherwise the defaults.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn resolve_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match user_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "loading user config");
            load_config(&path)
        }
        _ => Ok(PipelineConfig::default()),
    }
}

const fn default_true() -> bool {
    true
}

const fn default_line_width() -> f64 {
    2.0
}

const fn default_block_size() -> usize {
    101
}

const fn default_min_component_size() -> usize {
    25
}

const fn default_intensity_fraction() -> f64 {
    0.5
}

const fn default_z_spacing() -> f64 {
    7.75
}

const fn default_repeats() -> usize {
    20
}

const fn default_max_attempts() -> usize {
    50
}
