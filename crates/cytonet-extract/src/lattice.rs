//! Voxel neighbourhoods on `[x, y, z]` rasters.

/// Offsets of the 26-neighbourhood, in a fixed order.
const OFFSETS_26: [(isize, isize, isize); 26] = {
    let mut out = [(0, 0, 0); 26];
    let mut i = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[i] = (dx, dy, dz);
                    i += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
};

/// In-bounds 26-neighbours of `voxel` in a raster of `shape`.
pub fn neighbours26(
    shape: (usize, usize, usize),
    voxel: (usize, usize, usize),
) -> impl Iterator<Item = (usize, usize, usize)> {
    OFFSETS_26.iter().filter_map(move |&(dx, dy, dz)| {
        let x = voxel.0.checked_add_signed(dx)?;
        let y = voxel.1.checked_add_signed(dy)?;
        let z = voxel.2.checked_add_signed(dz)?;
        (x < shape.0 && y < shape.1 && z < shape.2).then_some((x, y, z))
    })
}

/// Row-major linear index of `voxel`.
#[must_use]
pub const fn linear(shape: (usize, usize, usize), voxel: (usize, usize, usize)) -> usize {
    (voxel.0 * shape.1 + voxel.1) * shape.2 + voxel.2
}
