//! Planar geometry on the lateral projection of edge paths.
//!
//! Crossing tests ignore `z`: two filaments cross when their projections onto
//! the imaging plane intersect somewhere other than a junction they share.

use cytonet_core::volume::Point3;

/// Absolute tolerance for intersection parameters and degenerate segments.
const EPS: f64 = 1e-9;

/// Two contacts closer than this to a shared junction count as touching it.
const NODE_EPS: f64 = 1e-6;

/// How two closed segments meet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    None,
    /// A single common point `(x, y)`.
    Point(f64, f64),
    /// Collinear segments sharing a stretch of positive length.
    Overlap,
}

fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax.mul_add(by, -(ay * bx))
}

fn point_on_segment(p: (f64, f64), a: &Point3, b: &Point3) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx.mul_add(dx, dy * dy);
    if len_sq < EPS * EPS {
        return (p.0 - a.x).hypot(p.1 - a.y) < EPS;
    }
    let t = ((p.0 - a.x).mul_add(dx, (p.1 - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (dx.mul_add(t, a.x), dy.mul_add(t, a.y));
    (p.0 - cx).hypot(p.1 - cy) < EPS
}

/// Classify the lateral contact between segments `p1 → p2` and `q1 → q2`.
#[must_use]
pub fn segment_contact(p1: &Point3, p2: &Point3, q1: &Point3, q2: &Point3) -> Contact {
    let (dpx, dpy) = (p2.x - p1.x, p2.y - p1.y);
    let (dqx, dqy) = (q2.x - q1.x, q2.y - q1.y);
    let p_len = dpx.hypot(dpy);
    let q_len = dqx.hypot(dqy);

    // Degenerate segments behave as points.
    if p_len < EPS {
        return if point_on_segment((p1.x, p1.y), q1, q2) {
            Contact::Point(p1.x, p1.y)
        } else {
            Contact::None
        };
    }
    if q_len < EPS {
        return if point_on_segment((q1.x, q1.y), p1, p2) {
            Contact::Point(q1.x, q1.y)
        } else {
            Contact::None
        };
    }

    let (ox, oy) = (q1.x - p1.x, q1.y - p1.y);
    let denom = cross(dpx, dpy, dqx, dqy);

    if denom.abs() > EPS * p_len * q_len {
        let t = cross(ox, oy, dqx, dqy) / denom;
        let u = cross(ox, oy, dpx, dpy) / denom;
        if (-EPS..=1.0 + EPS).contains(&t) && (-EPS..=1.0 + EPS).contains(&u) {
            return Contact::Point(dpx.mul_add(t, p1.x), dpy.mul_add(t, p1.y));
        }
        return Contact::None;
    }

    // Parallel: only collinear segments can meet.
    if cross(ox, oy, dpx, dpy).abs() > EPS * p_len {
        return Contact::None;
    }
    let len_sq = p_len * p_len;
    let t0 = ox.mul_add(dpx, oy * dpy) / len_sq;
    let t1 = (q2.x - p1.x).mul_add(dpx, (q2.y - p1.y) * dpy) / len_sq;
    let lo = t0.min(t1).max(0.0);
    let hi = t0.max(t1).min(1.0);
    if lo > hi + EPS {
        Contact::None
    } else if (hi - lo) * p_len <= EPS {
        Contact::Point(dpx.mul_add(lo, p1.x), dpy.mul_add(lo, p1.y))
    } else {
        Contact::Overlap
    }
}

/// Lateral bounding box `(min_x, min_y, max_x, max_y)` of a polyline.
#[must_use]
pub fn bounding_box(path: &[Point3]) -> (f64, f64, f64, f64) {
    path.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    )
}

fn boxes_overlap(a: (f64, f64, f64, f64), b: (f64, f64, f64, f64)) -> bool {
    a.0 <= b.2 + EPS && b.0 <= a.2 + EPS && a.1 <= b.3 + EPS && b.1 <= a.3 + EPS
}

/// True when polylines `a` and `b` meet anywhere other than at one of the
/// `shared` junction positions.
#[must_use]
pub fn paths_cross(a: &[Point3], b: &[Point3], shared: &[Point3]) -> bool {
    if a.len() < 2 || b.len() < 2 || !boxes_overlap(bounding_box(a), bounding_box(b)) {
        return false;
    }
    for sa in a.windows(2) {
        let box_a = bounding_box(sa);
        for sb in b.windows(2) {
            if !boxes_overlap(box_a, bounding_box(sb)) {
                continue;
            }
            match segment_contact(&sa[0], &sa[1], &sb[0], &sb[1]) {
                Contact::None => {}
                Contact::Overlap => return true,
                Contact::Point(x, y) => {
                    let at_shared = shared
                        .iter()
                        .any(|s| (s.x - x).hypot(s.y - y) < NODE_EPS);
                    if !at_shared {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Orientation of the lateral chord from the first to the last point of a
/// path, folded into `[0, π)`. `None` when the chord has no lateral extent.
#[must_use]
pub fn chord_angle(path: &[Point3]) -> Option<f64> {
    let (first, last) = (path.first()?, path.last()?);
    let (dx, dy) = (last.x - first.x, last.y - first.y);
    if dx.hypot(dy) < EPS {
        return None;
    }
    let angle = dy.atan2(dx).rem_euclid(std::f64::consts::PI);
    Some(if angle >= std::f64::consts::PI { 0.0 } else { angle })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
