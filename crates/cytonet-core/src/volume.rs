//! Raster data model: intensity volumes, region-of-interest masks and
//! skeletons, plus the real-valued [`Point3`] used for node positions.
//!
//! # Axes
//!
//! All rasters are indexed `[x, y, z]`, where `x` and `y` are the two lateral
//! axes of the source image (rows and columns) and `z` the slice axis. A 2-D
//! plane is promoted to a volume with a single slice. Real coordinates use
//! lateral pixel units on every axis: slice `k` sits at `z = k * z_spacing`.

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{CytoError, Result};

// ---------------------------------------------------------------------------
// Point3
// ---------------------------------------------------------------------------

/// A position in real (pixel-unit) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Position of voxel `(x, y, z)` with slices `z_spacing` apart.
    #[must_use]
    pub fn from_voxel(x: usize, y: usize, z: usize, z_spacing: f64) -> Self {
        Self::new(x as f64, y as f64, z as f64 * z_spacing)
    }

    /// Euclidean distance in 3-D.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
    }

    /// Distance of the lateral projections (z ignored).
    #[must_use]
    pub fn lateral_distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Total ordering over `(x, y, z)` used for deterministic tie-breaks.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
            .then_with(|| self.z.total_cmp(&other.z))
    }
}

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// Intensity samples of one time frame. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<f64>,
}

impl Volume {
    #[must_use]
    pub const fn new(data: Array3<f64>) -> Self {
        Self { data }
    }

    /// Promote a single 2-D plane to a one-slice volume.
    #[must_use]
    pub fn from_plane(plane: Array2<f64>) -> Self {
        Self {
            data: plane.insert_axis(Axis(2)),
        }
    }

    #[must_use]
    pub const fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// `(nx, ny, nz)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn lateral_shape(&self) -> (usize, usize) {
        let (nx, ny, _) = self.data.dim();
        (nx, ny)
    }

    #[must_use]
    pub fn slices(&self) -> usize {
        self.data.dim().2
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.data[[x, y, z]]
    }

    /// Mean and variance of the samples that fall inside `mask`.
    ///
    /// Returns `None` when the mask selects nothing.
    #[must_use]
    pub fn masked_moments(&self, mask: &Mask) -> Option<(f64, f64)> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for ((x, y, _), &v) in self.data.indexed_iter() {
            if mask.contains_pixel(x, y) {
                count += 1;
                sum += v;
                sum_sq += v * v;
            }
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        Some((mean, variance))
    }
}

// ---------------------------------------------------------------------------
// Mask
// ---------------------------------------------------------------------------

/// Binary lateral region of interest shared by every slice and frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array2<bool>,
}

/// Lateral step used when testing whether a straight segment stays inside
/// the mask, in pixels.
const SEGMENT_SAMPLE_STEP: f64 = 0.25;

impl Mask {
    #[must_use]
    pub const fn new(data: Array2<bool>) -> Self {
        Self { data }
    }

    /// Threshold raw values at zero.
    #[must_use]
    pub fn from_values(values: &Array2<f64>) -> Self {
        Self {
            data: values.mapv(|v| v > 0.0),
        }
    }

    /// A mask covering the whole `nx × ny` plane.
    #[must_use]
    pub fn full(nx: usize, ny: usize) -> Self {
        Self {
            data: Array2::from_elem((nx, ny), true),
        }
    }

    #[must_use]
    pub const fn data(&self) -> &Array2<bool> {
        &self.data
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Return [`CytoError::EmptyMask`] unless some pixel is foreground.
    ///
    /// # Errors
    ///
    /// Returns [`CytoError::EmptyMask`] for an all-background mask.
    pub fn ensure_foreground(&self) -> Result<()> {
        if self.is_empty() {
            Err(CytoError::EmptyMask)
        } else {
            Ok(())
        }
    }

    #[must_use]
    pub fn contains_pixel(&self, x: usize, y: usize) -> bool {
        self.data.get((x, y)).copied().unwrap_or(false)
    }

    /// True when the lateral projection of `p` rounds to a foreground pixel.
    #[must_use]
    pub fn contains_point(&self, p: &Point3) -> bool {
        let (rx, ry) = (p.x.round(), p.y.round());
        if rx < 0.0 || ry < 0.0 || !rx.is_finite() || !ry.is_finite() {
            return false;
        }
        self.contains_pixel(rx as usize, ry as usize)
    }

    /// True when every sample along the lateral projection of the straight
    /// segment `a → b` lies inside the mask.
    #[must_use]
    pub fn contains_segment(&self, a: &Point3, b: &Point3) -> bool {
        let steps = (a.lateral_distance(b) / SEGMENT_SAMPLE_STEP).ceil().max(1.0) as usize;
        (0..=steps).all(|i| {
            let t = i as f64 / steps as f64;
            let p = Point3::new(
                (b.x - a.x).mul_add(t, a.x),
                (b.y - a.y).mul_add(t, a.y),
                (b.z - a.z).mul_add(t, a.z),
            );
            self.contains_point(&p)
        })
    }
}

// ---------------------------------------------------------------------------
// Skeleton
// ---------------------------------------------------------------------------

/// Binary volume of 1-voxel-wide filament centerlines.
///
/// Each extraction step builds a fresh skeleton; nothing mutates one after
/// it has been handed downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    data: Array3<bool>,
}

impl Skeleton {
    #[must_use]
    pub const fn new(data: Array3<bool>) -> Self {
        Self { data }
    }

    #[must_use]
    pub const fn data(&self) -> &Array3<bool> {
        &self.data
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn is_set(&self, x: usize, y: usize, z: usize) -> bool {
        self.data.get((x, y, z)).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Coordinates of every set voxel in memory order.
    #[must_use]
    pub fn voxels(&self) -> Vec<(usize, usize, usize)> {
        self.data
            .indexed_iter()
            .filter_map(|(idx, &v)| v.then_some(idx))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_is_promoted_to_single_slice() {
        let v = Volume::from_plane(Array2::zeros((4, 5)));
        assert_eq!(v.shape(), (4, 5, 1));
        assert_eq!(v.slices(), 1);
    }

    #[test]
    fn voxel_position_scales_z() {
        let p = Point3::from_voxel(1, 2, 3, 7.75);
        assert!((p.z - 23.25).abs() < 1e-12);
        assert!((p.x - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mask_threshold_at_zero() {
        let mut values = Array2::zeros((3, 3));
        values[[1, 1]] = 0.2;
        values[[0, 2]] = -1.0;
        let mask = Mask::from_values(&values);
        assert_eq!(mask.foreground_count(), 1);
        assert!(mask.contains_pixel(1, 1));
        assert!(!mask.contains_pixel(0, 2));
        assert!(!mask.contains_pixel(9, 9), "out of bounds is background");
    }

    #[test]
    fn empty_mask_is_rejected() {
        let mask = Mask::new(Array2::from_elem((2, 2), false));
        assert_eq!(mask.ensure_foreground(), Err(CytoError::EmptyMask));
        assert!(Mask::full(2, 2).ensure_foreground().is_ok());
    }

    #[test]
    fn segment_leaving_mask_is_detected() {
        // Foreground everywhere except column y = 2.
        let mut data = Array2::from_elem((5, 5), true);
        for x in 0..5 {
            data[[x, 2]] = false;
        }
        let mask = Mask::new(data);
        let a = Point3::new(1.0, 0.0, 0.0);
        let b = Point3::new(1.0, 4.0, 0.0);
        let c = Point3::new(4.0, 0.0, 0.0);
        assert!(!mask.contains_segment(&a, &b), "crosses the gap");
        assert!(mask.contains_segment(&a, &c), "stays left of the gap");
    }

    #[test]
    fn masked_moments_ignore_background() {
        let mut data = Array3::zeros((2, 2, 1));
        data[[0, 0, 0]] = 2.0;
        data[[1, 1, 0]] = 100.0;
        let mut m = Array2::from_elem((2, 2), false);
        m[[0, 0]] = true;
        m[[0, 1]] = true;
        let (mean, var) = Volume::new(data)
            .masked_moments(&Mask::new(m))
            .expect("mask has foreground");
        assert!((mean - 1.0).abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn skeleton_lists_voxels() {
        let mut data = Array3::from_elem((3, 3, 1), false);
        data[[0, 1, 0]] = true;
        data[[2, 2, 0]] = true;
        let s = Skeleton::new(data);
        assert_eq!(s.voxel_count(), 2);
        assert_eq!(s.voxels(), vec![(0, 1, 0), (2, 2, 0)]);
    }
}
