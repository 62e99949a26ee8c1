//! Smoothing and ridge enhancement on lateral planes.
//!
//! # Overview
//!
//! Both filters work slice by slice: z-spacing in confocal stacks is several
//! times the lateral pixel size, so mixing slices would blur filaments that
//! only share a column.
//!
//! - [`smooth_plane`]: separable Gaussian, radius `⌈3σ⌉`, replicate borders.
//! - [`ridge_plane`]: Hessian of the smoothed plane by central differences;
//!   the response is `max(0, −λ_min) · σ²`, large on bright line-like
//!   structures of width about `σ` and zero on blobs' flanks and dark valleys.

use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Normalized 1-D Gaussian kernel of radius `⌈3σ⌉`.
#[must_use]
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil().max(0.0) as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Convolve every line along `axis` with `kernel`, clamping at the borders.
fn convolve_axis(plane: &ArrayView2<'_, f64>, kernel: &[f64], axis: usize) -> Array2<f64> {
    let (nx, ny) = plane.dim();
    let radius = (kernel.len() / 2) as isize;
    Array2::from_shape_fn((nx, ny), |(x, y)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let offset = k as isize - radius;
                let sample = if axis == 0 {
                    plane[[clamp_index(x, offset, nx), y]]
                } else {
                    plane[[x, clamp_index(y, offset, ny)]]
                };
                w * sample
            })
            .sum()
    })
}

const fn clamp_index(i: usize, offset: isize, len: usize) -> usize {
    let j = i as isize + offset;
    if j < 0 {
        0
    } else if j as usize >= len {
        len - 1
    } else {
        j as usize
    }
}

/// Gaussian-smooth one plane with standard deviation `sigma` (pixels).
#[must_use]
pub fn smooth_plane(plane: &ArrayView2<'_, f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 || plane.is_empty() {
        return plane.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let rows = convolve_axis(plane, &kernel, 0);
    convolve_axis(&rows.view(), &kernel, 1)
}

/// Ridge response of an already smoothed plane at scale `sigma`.
#[must_use]
pub fn ridge_plane(smoothed: &ArrayView2<'_, f64>, sigma: f64) -> Array2<f64> {
    let (nx, ny) = smoothed.dim();
    let scale = sigma * sigma;
    Array2::from_shape_fn((nx, ny), |(x, y)| {
        let at = |dx: isize, dy: isize| {
            smoothed[[clamp_index(x, dx, nx), clamp_index(y, dy, ny)]]
        };
        let centre = at(0, 0);
        let hxx = at(1, 0) - 2.0 * centre + at(-1, 0);
        let hyy = at(0, 1) - 2.0 * centre + at(0, -1);
        let hxy = (at(1, 1) - at(1, -1) - at(-1, 1) + at(-1, -1)) / 4.0;
        let half_trace = 0.5 * (hxx + hyy);
        let radius = (0.5 * (hxx - hyy)).hypot(hxy);
        let lambda_min = half_trace - radius;
        (-lambda_min).max(0.0) * scale
    })
}

/// Apply `f` to every z-slice of `volume` and stack the results.
#[must_use]
pub fn per_slice(volume: &Array3<f64>, f: impl Fn(&ArrayView2<'_, f64>) -> Array2<f64>) -> Array3<f64> {
    let mut out = Array3::zeros(volume.dim());
    for (k, slice) in volume.axis_iter(Axis(2)).enumerate() {
        out.index_axis_mut(Axis(2), k).assign(&f(&slice));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(2.0);
        assert_eq!(k.len(), 13);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((k[0] - k[12]).abs() < 1e-15);
        assert!(k[6] > k[5]);
    }

    #[test]
    fn smoothing_preserves_constant_plane() {
        let plane = Array2::from_elem((7, 9), 3.5);
        let out = smooth_plane(&plane.view(), 1.5);
        assert!(out.iter().all(|v| (v - 3.5).abs() < 1e-12));
    }

    #[test]
    fn smoothing_spreads_an_impulse() {
        let mut plane = Array2::zeros((11, 11));
        plane[[5, 5]] = 1.0;
        let out = smooth_plane(&plane.view(), 1.0);
        assert!(out[[5, 5]] < 1.0);
        assert!(out[[5, 6]] > 0.0);
        assert!((out.sum() - 1.0).abs() < 1e-9, "mass stays inside the plane");
    }

    #[test]
    fn bright_line_has_ridge_response_on_its_centre() {
        let mut plane = Array2::zeros((15, 15));
        for y in 0..15 {
            plane[[7, y]] = 10.0;
        }
        let smoothed = smooth_plane(&plane.view(), 1.0);
        let ridge = ridge_plane(&smoothed.view(), 1.0);
        assert!(ridge[[7, 7]] > 0.0);
        assert!(ridge[[7, 7]] > ridge[[4, 7]]);
        assert!(ridge[[0, 7]].abs() < 1e-6, "flat background has no ridge");
    }

    #[test]
    fn dark_valley_has_no_ridge_response() {
        let mut plane = Array2::from_elem((15, 15), 10.0);
        for y in 0..15 {
            plane[[7, y]] = 0.0;
        }
        let smoothed = smooth_plane(&plane.view(), 1.0);
        let ridge = ridge_plane(&smoothed.view(), 1.0);
        assert!(ridge[[7, 7]].abs() < 1e-12);
    }
}
