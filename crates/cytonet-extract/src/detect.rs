//! Node/edge detection: skeleton voxels to a raw geometric multigraph.
//!
//! # Overview
//!
//! 0. The skeleton is re-thinned in 3-D, so input that is still two voxels
//!    thick somewhere (stacked slices, hand-built rasters) is reduced to
//!    curves first. An already thin skeleton passes through unchanged.
//! 1. Every skeleton voxel whose 26-neighbour count is not two is a node
//!    voxel (endpoints have one, branch points three or more).
//! 2. 26-adjacent node voxels merge into one junction placed at their
//!    centroid.
//! 3. The remaining curve voxels split into 26-connected runs. Each run is
//!    walked from one end to the other and becomes a filament between the
//!    junctions touching its ends. Runs with no end (closed rings) carry no
//!    junction and are skipped.
//!
//! Short spurs survive as edges; the unifier and the component-size filter
//! upstream deal with them.

use std::collections::{BTreeSet, HashMap, VecDeque};

use cytonet_core::error::{CytoError, Result};
use cytonet_core::volume::{Point3, Skeleton, Volume};
use cytonet_graph::graph::{EdgeOrigin, Filament, RawGraph};
use tracing::{debug, instrument};

use crate::lattice::neighbours26;
use crate::thin::thin;

type Voxel = (usize, usize, usize);

/// Group `members` into 26-connected clusters. Returns the cluster id of
/// every member, ids assigned in sorted seed order.
fn cluster(shape: Voxel, members: &BTreeSet<Voxel>) -> (HashMap<Voxel, usize>, Vec<Vec<Voxel>>) {
    let mut label = HashMap::with_capacity(members.len());
    let mut clusters = Vec::new();
    for &seed in members {
        if label.contains_key(&seed) {
            continue;
        }
        let id = clusters.len();
        let mut group = vec![seed];
        label.insert(seed, id);
        let mut queue = VecDeque::from([seed]);
        while let Some(v) = queue.pop_front() {
            for n in neighbours26(shape, v) {
                if members.contains(&n) && !label.contains_key(&n) {
                    label.insert(n, id);
                    group.push(n);
                    queue.push_back(n);
                }
            }
        }
        clusters.push(group);
    }
    (label, clusters)
}

fn centroid(voxels: &[Voxel], z_spacing: f64) -> Point3 {
    let n = voxels.len() as f64;
    let (sx, sy, sz) = voxels.iter().fold((0.0, 0.0, 0.0), |(a, b, c), &(x, y, z)| {
        (a + x as f64, b + y as f64, c + z as f64)
    });
    Point3::new(sx / n, sy / n, sz / n * z_spacing)
}

/// Walk a curve run from `start`, always stepping to the smallest unvisited
/// neighbour in the run.
fn walk(shape: Voxel, run: &BTreeSet<Voxel>, start: Voxel) -> Vec<Voxel> {
    let mut order = vec![start];
    let mut seen = BTreeSet::from([start]);
    let mut current = start;
    loop {
        let next = neighbours26(shape, current)
            .filter(|n| run.contains(n) && !seen.contains(n))
            .min();
        match next {
            Some(n) => {
                seen.insert(n);
                order.push(n);
                current = n;
            }
            None => break,
        }
    }
    order
}

/// Junction ids adjacent to `voxel`, ascending.
fn touching(shape: Voxel, voxel: Voxel, label: &HashMap<Voxel, usize>) -> Vec<usize> {
    let ids: BTreeSet<usize> = neighbours26(shape, voxel)
        .filter_map(|n| label.get(&n).copied())
        .collect();
    ids.into_iter().collect()
}

/// Trace `skeleton` into a raw multigraph weighted by `smoothed` intensity.
///
/// # Errors
///
/// Returns [`CytoError::DegenerateSkeleton`] when no filament connects two
/// junctions.
#[instrument(skip_all, fields(voxels = skeleton.voxel_count(), z_spacing = z_spacing))]
pub fn detect_graph(skeleton: &Skeleton, smoothed: &Volume, z_spacing: f64) -> Result<RawGraph> {
    let skeleton = &Skeleton::new(thin(skeleton.data().clone()));
    let shape = skeleton.shape();
    let degree = |v: Voxel| {
        neighbours26(shape, v)
            .filter(|&(x, y, z)| skeleton.is_set(x, y, z))
            .count()
    };

    let (nodes, curves): (BTreeSet<Voxel>, BTreeSet<Voxel>) =
        skeleton.voxels().into_iter().partition(|&v| degree(v) != 2);

    let (node_label, node_clusters) = cluster(shape, &nodes);
    let (_, runs) = cluster(shape, &curves);
    let position = |(x, y, z): Voxel| Point3::from_voxel(x, y, z, z_spacing);

    let mut edges: Vec<(usize, usize, Filament)> = Vec::new();
    let mut rings = 0usize;
    for run in runs {
        let members: BTreeSet<Voxel> = run.iter().copied().collect();
        let ends: Vec<Voxel> = members
            .iter()
            .copied()
            .filter(|&v| {
                neighbours26(shape, v)
                    .filter(|n| members.contains(n))
                    .count()
                    < 2
            })
            .collect();
        let Some(&start) = ends.first() else {
            rings += 1;
            continue;
        };

        let traced = walk(shape, &members, start);
        let Some(&last) = traced.last() else {
            continue;
        };
        let (from, to) = if traced.len() == 1 {
            let ids = touching(shape, start, &node_label);
            match ids.as_slice() {
                [] => continue,
                [only] => (*only, *only),
                [a, b, ..] => (*a, *b),
            }
        } else {
            let (Some(&a), Some(&b)) = (
                touching(shape, start, &node_label).first(),
                touching(shape, last, &node_label).first(),
            ) else {
                continue;
            };
            (a, b)
        };

        let capacity = members
            .iter()
            .map(|&(x, y, z)| smoothed.get(x, y, z))
            .sum::<f64>()
            / members.len() as f64;

        let mut path = Vec::with_capacity(traced.len() + 2);
        path.push(centroid(&node_clusters[from], z_spacing));
        path.extend(traced.iter().copied().map(position));
        path.push(centroid(&node_clusters[to], z_spacing));
        edges.push((from, to, Filament::along(capacity, path, EdgeOrigin::Traced)));
    }

    if edges.is_empty() {
        return Err(CytoError::DegenerateSkeleton(format!(
            "{} junctions but no traced filament between them",
            node_clusters.len()
        )));
    }

    // Drop junctions no filament touches and compact the ids.
    let mut remap: Vec<Option<usize>> = vec![None; node_clusters.len()];
    let mut positions = Vec::new();
    for &(a, b, _) in &edges {
        for id in [a, b] {
            if remap[id].is_none() {
                remap[id] = Some(positions.len());
                positions.push(centroid(&node_clusters[id], z_spacing));
            }
        }
    }
    let edge_count = edges.len();
    let raw = RawGraph::from_parts(
        &positions,
        edges.into_iter().filter_map(|(a, b, f)| Some((remap[a]?, remap[b]?, f))),
    );
    debug!(
        junctions = positions.len(),
        filaments = edge_count,
        rings,
        "traced skeleton"
    );
    Ok(raw)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
