//! Topology-preserving 3-D thinning.
//!
//! Directional peeling over the six face directions. In the pass for
//! direction `d` a voxel is a candidate when its `+d` face neighbour is
//! background and its `-d` face neighbour is foreground, so a layer is only
//! peeled off material that lies behind it. Candidates are then deleted one
//! at a time, each re-checked against the current raster: a voxel goes only
//! if it is not a curve end (exactly one 26-neighbour) and is simple for
//! (26, 6) connectivity. Passes repeat until nothing changes.
//!
//! Out-of-bounds voxels count as background, so a single-slice raster is
//! never peeled along `z` and reduces to the 2-D case.

use ndarray::Array3;

type Voxel = [usize; 3];

/// Peeling order. Slices come first: filaments are usually thickest along
/// `z`, and collapsing that axis before the lateral ones keeps curve ends
/// from being shaved while two layers still overlap.
const DIRECTIONS: [[isize; 3]; 6] = [
    [0, 0, 1],
    [0, 0, -1],
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
];

const CENTER: usize = 13;

/// Offset of cube position `i` (`0..27`, `x` major).
const fn offset(i: usize) -> [isize; 3] {
    [(i / 9) as isize - 1, ((i / 3) % 3) as isize - 1, (i % 3) as isize - 1]
}

fn shifted(grid: &Array3<bool>, v: Voxel, d: [isize; 3]) -> bool {
    let (nx, ny, nz) = grid.dim();
    match (
        v[0].checked_add_signed(d[0]),
        v[1].checked_add_signed(d[1]),
        v[2].checked_add_signed(d[2]),
    ) {
        (Some(x), Some(y), Some(z)) if x < nx && y < ny && z < nz => grid[[x, y, z]],
        _ => false,
    }
}

/// The 3×3×3 neighbourhood of `v` as a bitmask, bit `i` for cube position `i`.
fn cube(grid: &Array3<bool>, v: Voxel) -> u32 {
    (0..27)
        .filter(|&i| i != CENTER && shifted(grid, v, offset(i)))
        .fold(0, |mask, i| mask | (1 << i))
}

/// Count the connected groups of `members`, optionally only those touching
/// `anchors`.
fn components(members: u32, anchors: u32, adjacent: fn([isize; 3], [isize; 3]) -> bool) -> usize {
    let mut unseen = members;
    let mut count = 0;
    while unseen != 0 {
        let seed = unseen.trailing_zeros() as usize;
        unseen &= !(1 << seed);
        let mut group = 1u32 << seed;
        let mut frontier = vec![seed];
        while let Some(i) = frontier.pop() {
            let mut rest = unseen;
            while rest != 0 {
                let j = rest.trailing_zeros() as usize;
                rest &= !(1 << j);
                if adjacent(offset(i), offset(j)) {
                    unseen &= !(1 << j);
                    group |= 1 << j;
                    frontier.push(j);
                }
            }
        }
        if group & anchors != 0 {
            count += 1;
        }
    }
    count
}

fn adjacent26(a: [isize; 3], b: [isize; 3]) -> bool {
    (0..3).all(|k| (a[k] - b[k]).abs() <= 1)
}

fn adjacent6(a: [isize; 3], b: [isize; 3]) -> bool {
    (0..3).map(|k| (a[k] - b[k]).abs()).sum::<isize>() == 1
}

fn manhattan(i: usize) -> isize {
    offset(i).iter().map(|c| c.abs()).sum()
}

/// Cube positions of the 18-neighbourhood and of the six face neighbours.
fn masks() -> (u32, u32) {
    (0..27).filter(|&i| i != CENTER).fold((0, 0), |(n18, n6), i| {
        let m = manhattan(i);
        (
            if m <= 2 { n18 | (1 << i) } else { n18 },
            if m == 1 { n6 | (1 << i) } else { n6 },
        )
    })
}

/// A voxel is simple when its foreground neighbours form one 26-connected
/// group and the background of its 18-neighbourhood forms exactly one
/// 6-connected group touching it.
fn is_simple(neighbourhood: u32) -> bool {
    let (n18, n6) = masks();
    let background = !neighbourhood & n18;
    components(neighbourhood, u32::MAX, adjacent26) == 1 && components(background, n6, adjacent6) == 1
}

const fn is_curve_end(neighbourhood: u32) -> bool {
    neighbourhood.count_ones() == 1
}

/// One peeling pass along `d`. Returns the number of voxels deleted.
fn peel(grid: &mut Array3<bool>, d: [isize; 3]) -> usize {
    let back = [-d[0], -d[1], -d[2]];
    let candidates: Vec<Voxel> = grid
        .indexed_iter()
        .filter(|&(_, &set)| set)
        .map(|((x, y, z), _)| [x, y, z])
        .filter(|&v| !shifted(grid, v, d) && shifted(grid, v, back))
        .collect();

    let mut deleted = 0;
    for v in candidates {
        let neighbourhood = cube(grid, v);
        if !is_curve_end(neighbourhood) && is_simple(neighbourhood) {
            grid[v] = false;
            deleted += 1;
        }
    }
    deleted
}

/// Thin `foreground` to 26-connected curves of one voxel width.
#[must_use]
pub fn thin(mut foreground: Array3<bool>) -> Array3<bool> {
    loop {
        let deleted: usize = DIRECTIONS.iter().map(|&d| peel(&mut foreground, d)).sum();
        if deleted == 0 {
            break;
        }
    }
    foreground
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(shape: (usize, usize, usize), voxels: impl IntoIterator<Item = Voxel>) -> Array3<bool> {
        let mut grid = Array3::from_elem(shape, false);
        for v in voxels {
            grid[v] = true;
        }
        grid
    }

    fn degree(grid: &Array3<bool>, v: Voxel) -> u32 {
        cube(grid, v).count_ones()
    }

    fn set(grid: &Array3<bool>) -> Vec<Voxel> {
        grid.indexed_iter()
            .filter(|&(_, &v)| v)
            .map(|((x, y, z), _)| [x, y, z])
            .collect()
    }

    #[test]
    fn thick_bar_becomes_one_pixel_wide() {
        let bar = (3..6).flat_map(|x| (2..18).map(move |y| [x, y, 0]));
        let thin = thin(filled((9, 20, 1), bar));
        for y in 2..18 {
            let column: usize = (0..9).filter(|&x| thin[[x, y, 0]]).count();
            assert_eq!(column, 1, "column {y} should hold a single pixel");
        }
        assert!((2..18).all(|y| thin[[4, y, 0]]), "centre line survives");
    }

    #[test]
    fn one_pixel_line_is_untouched() {
        let line: Vec<Voxel> = (1..9).map(|y| [2, y, 0]).collect();
        let thin = thin(filled((5, 10, 1), line.clone()));
        assert_eq!(set(&thin), line);
    }

    #[test]
    fn stacked_lines_collapse_to_one() {
        let stacked = (0..11).flat_map(|y| [[4, y, 0], [4, y, 1]]);
        let thin = thin(filled((9, 11, 2), stacked));
        let voxels = set(&thin);
        assert_eq!(voxels.len(), 11);
        for y in 0..11 {
            assert_eq!(voxels.iter().filter(|v| v[1] == y).count(), 1, "row {y}");
        }
    }

    #[test]
    fn square_tube_across_slices_becomes_a_curve() {
        let tube = (3..6).flat_map(|x| (1..15).flat_map(move |y| (1..4).map(move |z| [x, y, z])));
        let thin = thin(filled((9, 16, 5), tube));
        let voxels = set(&thin);
        assert!(voxels.len() >= 10, "curve keeps its length, got {}", voxels.len());
        let ends = voxels.iter().filter(|&&v| degree(&thin, v) == 1).count();
        let interior = voxels.iter().filter(|&&v| degree(&thin, v) == 2).count();
        assert_eq!(ends, 2);
        assert_eq!(interior, voxels.len() - 2);
    }

    #[test]
    fn staircase_corner_is_removed() {
        let step = [[2, 1, 0], [2, 2, 0], [2, 3, 0], [3, 3, 0], [3, 4, 0], [3, 5, 0]];
        let thin = thin(filled((6, 7, 1), step));
        assert!(
            set(&thin).iter().all(|&v| degree(&thin, v) <= 2),
            "no voxel keeps three neighbours"
        );
    }

    #[test]
    fn ring_keeps_its_hole() {
        let mut ring = Vec::new();
        for x in 2..9 {
            for y in 2..9 {
                if !(4..7).contains(&x) || !(4..7).contains(&y) {
                    ring.push([x, y, 0]);
                }
            }
        }
        let thin = thin(filled((11, 11, 1), ring));
        assert!(!thin[[5, 5, 0]]);
        let voxels = set(&thin);
        assert!(voxels.len() >= 8);
        // The loop still surrounds the hole on every side.
        assert!(voxels.iter().any(|v| v[0] < 4));
        assert!(voxels.iter().any(|v| v[0] > 6));
        assert!(voxels.iter().any(|v| v[1] < 4));
        assert!(voxels.iter().any(|v| v[1] > 6));
    }

    #[test]
    fn isolated_voxel_survives() {
        let thin = thin(filled((3, 3, 3), [[1, 1, 1]]));
        assert!(thin[[1, 1, 1]]);
    }

    #[test]
    fn simple_point_classification() {
        // Centre of a straight run: removing it splits the run.
        let grid = filled((3, 3, 1), [[0, 1, 0], [1, 1, 0], [2, 1, 0]]);
        assert!(!is_simple(cube(&grid, [1, 1, 0])));
        // Corner of an L: the two arms stay 26-connected without it.
        let grid = filled((3, 3, 1), [[0, 1, 0], [1, 1, 0], [1, 2, 0]]);
        assert!(is_simple(cube(&grid, [1, 1, 0])));
        // Interior of a solid block.
        let grid = Array3::from_elem((3, 3, 3), true);
        assert!(!is_simple(cube(&grid, [1, 1, 1])));
    }
}
