//! Skeleton extraction: intensity volume to 1-voxel-wide centerlines.
//!
//! # Overview
//!
//! ```text
//! volume ─ smooth ─┬─────────────────────────────────────────► smoothed
//!                  └ ridge ─ mask ─ threshold ─ size filter ─ thin ─ cut ─► skeleton
//! ```
//!
//! The smoothed volume is returned alongside the skeleton because the
//! detector integrates it along traced curves to weight edges.

use cytonet_core::config::SkeletonConfig;
use cytonet_core::error::{CytoError, Result};
use cytonet_core::io::check_lateral_extent;
use cytonet_core::volume::{Mask, Skeleton, Volume};
use ndarray::{Array3, Zip};
use tracing::{debug, instrument};

use crate::filter::{per_slice, ridge_plane, smooth_plane};
use crate::threshold::{adaptive_threshold, remove_small_components};
use crate::thin::thin;

/// Output of [`extract_skeleton`].
#[derive(Debug, Clone)]
pub struct SkeletonResult {
    pub skeleton: Skeleton,
    /// Gaussian-smoothed intensity, used for edge capacities.
    pub smoothed: Volume,
}

/// Reject inputs that cannot produce a meaningful skeleton.
fn validate(volume: &Volume, mask: &Mask) -> Result<()> {
    check_lateral_extent(volume, mask)?;
    mask.ensure_foreground()?;
    let (mean, variance) = volume.masked_moments(mask).ok_or(CytoError::EmptyMask)?;
    if !variance.is_finite() || variance <= f64::EPSILON * mean.mul_add(mean, 1.0) {
        return Err(CytoError::DegenerateVolume(format!(
            "intensity inside the mask is constant ({mean})"
        )));
    }
    Ok(())
}

/// Mean of `values` over the set voxels of `foreground`.
fn mean_over(values: &Array3<f64>, foreground: &Array3<bool>) -> Option<f64> {
    let (sum, count) = Zip::from(values)
        .and(foreground)
        .fold((0.0, 0usize), |(s, c), &v, &f| if f { (s + v, c + 1) } else { (s, c) });
    (count > 0).then(|| sum / count as f64)
}

/// Extract the filament skeleton of one frame.
///
/// # Errors
///
/// - [`CytoError::DegenerateVolume`] if the volume does not match the mask
///   or is constant inside it.
/// - [`CytoError::EmptyMask`] if the mask has no foreground.
/// - [`CytoError::DegenerateSkeleton`] if nothing survives the filters.
#[instrument(skip_all, fields(shape = ?volume.shape(), line_width = config.line_width))]
pub fn extract_skeleton(
    volume: &Volume,
    mask: &Mask,
    config: &SkeletonConfig,
) -> Result<SkeletonResult> {
    validate(volume, mask)?;
    let sigma = config.line_width;

    let smoothed = per_slice(volume.data(), |plane| smooth_plane(plane, sigma));
    let mut ridge = per_slice(&smoothed, |plane| ridge_plane(plane, sigma));
    for ((x, y, _), r) in ridge.indexed_iter_mut() {
        if !mask.contains_pixel(x, y) {
            *r = 0.0;
        }
    }

    let mut foreground = adaptive_threshold(&ridge, config.block_size);
    let removed = remove_small_components(&mut foreground, config.min_component_size);
    debug!(
        foreground = foreground.iter().filter(|&&v| v).count(),
        removed, "thresholded ridge response"
    );

    let mut thinned = thin(foreground);

    if let Some(mean) = mean_over(&ridge, &thinned) {
        let cut = config.intensity_fraction * mean;
        Zip::from(&mut thinned).and(&ridge).for_each(|s, &r| {
            if *s && r < cut {
                *s = false;
            }
        });
    }

    let skeleton = Skeleton::new(thinned);
    let voxels = skeleton.voxel_count();
    if voxels == 0 {
        return Err(CytoError::DegenerateSkeleton(
            "no voxels survive thresholding and thinning".to_string(),
        ));
    }
    debug!(voxels, "skeleton extracted");

    Ok(SkeletonResult {
        skeleton,
        smoothed: Volume::new(smoothed),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
