//! Adaptive local thresholding and small-component removal.

use std::collections::VecDeque;

use fixedbitset::FixedBitSet;
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::lattice::{linear, neighbours26};

/// Summed-area table with a zero guard row and column.
fn integral_image(plane: &ArrayView2<'_, f64>) -> Array2<f64> {
    let (nx, ny) = plane.dim();
    let mut table = Array2::zeros((nx + 1, ny + 1));
    for x in 0..nx {
        let mut row = 0.0;
        for y in 0..ny {
            row += plane[[x, y]];
            table[[x + 1, y + 1]] = table[[x, y + 1]] + row;
        }
    }
    table
}

/// Foreground where the response is positive and above the mean of the
/// `block × block` lateral window around it (clipped at the borders).
#[must_use]
pub fn adaptive_threshold(response: &Array3<f64>, block: usize) -> Array3<bool> {
    let (nx, ny, _) = response.dim();
    let half = block / 2;
    let mut out = Array3::from_elem(response.dim(), false);

    for (k, plane) in response.axis_iter(Axis(2)).enumerate() {
        let table = integral_image(&plane);
        let mut slice = out.index_axis_mut(Axis(2), k);
        for ((x, y), cell) in slice.indexed_iter_mut() {
            let value = plane[[x, y]];
            if value <= 0.0 {
                continue;
            }
            let (x0, x1) = (x.saturating_sub(half), (x + half + 1).min(nx));
            let (y0, y1) = (y.saturating_sub(half), (y + half + 1).min(ny));
            let sum = table[[x1, y1]] - table[[x0, y1]] - table[[x1, y0]] + table[[x0, y0]];
            let area = ((x1 - x0) * (y1 - y0)) as f64;
            *cell = value > sum / area;
        }
    }
    out
}

/// Clear every 26-connected foreground component with fewer than
/// `min_size` voxels. Returns the number of components removed.
pub fn remove_small_components(foreground: &mut Array3<bool>, min_size: usize) -> usize {
    let shape = foreground.dim();
    let mut visited = FixedBitSet::with_capacity(shape.0 * shape.1 * shape.2);
    let mut removed = 0;
    let mut queue = VecDeque::new();

    let seeds: Vec<_> = foreground
        .indexed_iter()
        .filter_map(|(idx, &v)| v.then_some(idx))
        .collect();

    for seed in seeds {
        if visited.put(linear(shape, seed)) {
            continue;
        }
        let mut component = vec![seed];
        queue.push_back(seed);
        while let Some(voxel) = queue.pop_front() {
            for n in neighbours26(shape, voxel) {
                if foreground[[n.0, n.1, n.2]] && !visited.put(linear(shape, n)) {
                    component.push(n);
                    queue.push_back(n);
                }
            }
        }
        if component.len() < min_size {
            removed += 1;
            for (x, y, z) in component {
                foreground[[x, y, z]] = false;
            }
        }
    }
    removed
}
