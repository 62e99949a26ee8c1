//! Loading intensity stacks and masks from disk.
//!
//! # Formats
//!
//! - **Stacks** are `.npy` arrays of `u8`, `u16`, `f32` or `f64`. A 3-D
//!   array is read as `(t, x, y)` (one plane per frame, promoted to a single
//!   slice); a 4-D array as `(t, x, y, z)`.
//! - **Masks** are `.npy` arrays (2-D, or 3-D max-projected over `z`) or
//!   8/16-bit raster images (`.png`, `.tif`, `.tiff`). Values are thresholded
//!   at zero.
//!
//! Every failure is reported as [`CytoError::InputLoad`] carrying the path.

use std::path::Path;

use ndarray::{Array2, ArrayD, Axis, Ix2, Ix3, Ix4};
use ndarray_npy::read_npy;
use tracing::{debug, instrument};

use crate::error::{CytoError, Result};
use crate::volume::{Mask, Volume};

/// Read every frame of a stack.
///
/// # Errors
///
/// Returns [`CytoError::InputLoad`] when the file is unreadable, has an
/// unsupported element type, or is not 3-D/4-D, and
/// [`CytoError::DegenerateVolume`] when it has no frames.
#[instrument]
pub fn load_stack(path: &Path) -> Result<Vec<Volume>> {
    let array = read_npy_as_f64(path, "stack")?;
    let frames = stack_frames(array).map_err(|reason| CytoError::input_load("stack", path, reason))?;
    if frames.is_empty() {
        return Err(CytoError::DegenerateVolume(format!(
            "{} contains no frames",
            path.display()
        )));
    }
    debug!(frames = frames.len(), shape = ?frames[0].shape(), "stack loaded");
    Ok(frames)
}

/// Split a `(t, x, y)` or `(t, x, y, z)` array into per-frame volumes.
///
/// # Errors
///
/// Returns a description of the problem if the array has another rank.
pub fn stack_frames(array: ArrayD<f64>) -> std::result::Result<Vec<Volume>, String> {
    match array.ndim() {
        3 => {
            let array = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| e.to_string())?;
            Ok(array
                .axis_iter(Axis(0))
                .map(|plane| Volume::from_plane(plane.to_owned()))
                .collect())
        }
        4 => {
            let array = array
                .into_dimensionality::<Ix4>()
                .map_err(|e| e.to_string())?;
            Ok(array
                .axis_iter(Axis(0))
                .map(|frame| Volume::new(frame.to_owned()))
                .collect())
        }
        n => Err(format!("expected a 3-D (t, x, y) or 4-D (t, x, y, z) array, got {n}-D")),
    }
}

/// Read a mask from `.npy` or a raster image.
///
/// # Errors
///
/// Returns [`CytoError::InputLoad`] on read or decode failures, and
/// [`CytoError::EmptyMask`] when no pixel is foreground.
#[instrument]
pub fn load_mask(path: &Path) -> Result<Mask> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let values = match extension.as_deref() {
        Some("npy") => mask_values_from_npy(path)?,
        Some("png" | "tif" | "tiff") => mask_values_from_image(path)?,
        other => {
            return Err(CytoError::input_load(
                "mask",
                path,
                format!("unsupported extension {other:?}"),
            ));
        }
    };

    let mask = Mask::from_values(&values);
    mask.ensure_foreground()?;
    debug!(
        shape = ?mask.shape(),
        foreground = mask.foreground_count(),
        "mask loaded"
    );
    Ok(mask)
}

fn mask_values_from_npy(path: &Path) -> Result<Array2<f64>> {
    let array = read_npy_as_f64(path, "mask")?;
    match array.ndim() {
        2 => array
            .into_dimensionality::<Ix2>()
            .map_err(|e| CytoError::input_load("mask", path, e)),
        3 => {
            let volume = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| CytoError::input_load("mask", path, e))?;
            Ok(volume.fold_axis(Axis(2), f64::NEG_INFINITY, |&acc, &v| acc.max(v)))
        }
        n => Err(CytoError::input_load(
            "mask",
            path,
            format!("expected a 2-D or 3-D array, got {n}-D"),
        )),
    }
}

fn mask_values_from_image(path: &Path) -> Result<Array2<f64>> {
    let image = image::open(path)
        .map_err(|e| CytoError::input_load("mask", path, e))?
        .into_luma16();
    let (width, height) = image.dimensions();
    Ok(Array2::from_shape_fn(
        (height as usize, width as usize),
        |(row, col)| f64::from(image.get_pixel(col as u32, row as u32)[0]),
    ))
}

/// Read an `.npy` array of any supported element type as `f64`.
fn read_npy_as_f64(path: &Path, what: &'static str) -> Result<ArrayD<f64>> {
    if !path.exists() {
        return Err(CytoError::input_load(what, path, "file does not exist"));
    }
    if let Ok(array) = read_npy::<_, ArrayD<f64>>(path) {
        return Ok(array);
    }
    if let Ok(array) = read_npy::<_, ArrayD<f32>>(path) {
        return Ok(array.mapv(f64::from));
    }
    if let Ok(array) = read_npy::<_, ArrayD<u16>>(path) {
        return Ok(array.mapv(f64::from));
    }
    read_npy::<_, ArrayD<u8>>(path)
        .map(|array| array.mapv(f64::from))
        .map_err(|e| CytoError::input_load(what, path, e))
}

/// Check that a frame's lateral extent matches the mask.
///
/// # Errors
///
/// Returns [`CytoError::DegenerateVolume`] on mismatch.
pub fn check_lateral_extent(volume: &Volume, mask: &Mask) -> Result<()> {
    if volume.lateral_shape() == mask.shape() {
        Ok(())
    } else {
        Err(CytoError::DegenerateVolume(format!(
            "frame lateral shape {:?} does not match mask shape {:?}",
            volume.lateral_shape(),
            mask.shape()
        )))
    }
}
