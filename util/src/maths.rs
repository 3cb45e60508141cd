//! Maths utility functions
//!
//! Rigid-body helpers (mid-coordinates, axis orientation) and planar polygon
//! helpers used by the balance controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector2, Vector3};
use num_traits::Float;

// ---------------------------------------------------------------------------
// SCALAR FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Clamp a value into `[-limit, limit]`.
pub fn clamp_abs<T>(value: T, limit: T) -> T
where
    T: Float
{
    clamp(&value, &-limit.abs(), &limit.abs())
}

// ---------------------------------------------------------------------------
// RIGID BODY FUNCTIONS
// ---------------------------------------------------------------------------

/// Skew-symmetric matrix such that `cross_matrix(a) * b == a.cross(&b)`.
pub fn cross_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0
    )
}

/// Rotate `rot` by the smallest rotation that brings its `local_axis` onto the
/// world `axis`.
///
/// Used to level a frame while keeping its heading. When the two axes are
/// exactly opposite the rotation is undefined and `rot` is returned.
pub fn orient_rot_to_axis(
    rot: &UnitQuaternion<f64>,
    axis: &Vector3<f64>,
    local_axis: &Vector3<f64>
) -> UnitQuaternion<f64> {
    let local_dir = rot * local_axis;
    match UnitQuaternion::rotation_between(&local_dir, axis) {
        Some(q) => q * rot,
        None => *rot
    }
}

/// Level `coords` so that its Z axis lies along `axis`, keeping the origin.
pub fn orient_coord_to_axis(coords: &Isometry3<f64>, axis: &Vector3<f64>) -> Isometry3<f64> {
    Isometry3::from_parts(
        coords.translation,
        orient_rot_to_axis(&coords.rotation, axis, &Vector3::z())
    )
}

/// Interpolate between two rotations, `t = 0` giving `a`.
///
/// Works on the relative axis-angle so that it is defined for every pair,
/// including half-turns.
pub fn slerp(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>, t: f64) -> UnitQuaternion<f64> {
    let rel = a.inverse() * b;
    a * UnitQuaternion::from_scaled_axis(rel.scaled_axis() * t)
}

/// Interpolate between two poses, `t = 0` giving `a`.
pub fn calc_mid_coords_pair(a: &Isometry3<f64>, b: &Isometry3<f64>, t: f64) -> Isometry3<f64> {
    let p = a.translation.vector * (1.0 - t) + b.translation.vector * t;
    Isometry3::from_parts(Translation3::from(p), slerp(&a.rotation, &b.rotation, t))
}

/// Weighted mid pose of a set of poses.
///
/// Poses with a non-positive weight are ignored. If every weight is
/// non-positive the identity is returned.
pub fn calc_mid_coords(coords: &[Isometry3<f64>], weights: &[f64]) -> Isometry3<f64> {
    let mut sum_weight = 0.0;
    let mut mid = Isometry3::identity();

    for (c, w) in coords.iter().zip(weights.iter()) {
        if *w <= 0.0 {
            continue
        }
        if sum_weight == 0.0 {
            mid = *c;
        }
        else {
            mid = calc_mid_coords_pair(&mid, c, w / (sum_weight + w));
        }
        sum_weight += w;
    }

    mid
}

// ---------------------------------------------------------------------------
// POLYGON FUNCTIONS
// ---------------------------------------------------------------------------

/// Convex hull of a planar point set, counter-clockwise, without repeating
/// the first vertex.
///
/// Any polygon given to the other polygon helpers should go through this
/// first: it fixes the winding regardless of the input order and drops
/// collinear and interior points.
pub fn convex_hull(points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let mut pts: Vec<Vector2<f64>> = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup_by(|a, b| (*a - *b).norm() < 1e-12);

    if pts.len() < 3 {
        return pts
    }

    // Monotone chain, lower then upper hull
    let mut hull: Vec<Vector2<f64>> = Vec::with_capacity(pts.len() * 2);
    for p in pts.iter() {
        while hull.len() >= 2 && cross2(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross2(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();

    hull
}

/// True if `p` is inside or on the boundary of the counter-clockwise convex
/// polygon `hull`.
pub fn is_inside_hull(p: &Vector2<f64>, hull: &[Vector2<f64>]) -> bool {
    match hull.len() {
        0 => false,
        1 => (p - hull[0]).norm() < 1e-12,
        2 => (nearest_point_on_segment(p, &hull[0], &hull[1]) - p).norm() < 1e-12,
        n => (0..n).all(|i| cross2(&hull[i], &hull[(i + 1) % n], p) >= 0.0)
    }
}

/// Point of the counter-clockwise convex polygon `hull` nearest to `p`.
///
/// Returns `p` itself if it is inside. An empty hull also returns `p`.
pub fn calc_nearest_point_of_hull(p: &Vector2<f64>, hull: &[Vector2<f64>]) -> Vector2<f64> {
    if hull.is_empty() || is_inside_hull(p, hull) {
        return *p
    }
    if hull.len() == 1 {
        return hull[0]
    }

    let n = hull.len();
    let mut best = hull[0];
    let mut best_dist = f64::INFINITY;
    for i in 0..n {
        let q = nearest_point_on_segment(p, &hull[i], &hull[(i + 1) % n]);
        let d = (q - p).norm_squared();
        if d < best_dist {
            best_dist = d;
            best = q;
        }
    }

    best
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Z component of `(b - a) x (c - a)`, positive for a left turn.
fn cross2(a: &Vector2<f64>, b: &Vector2<f64>, c: &Vector2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn nearest_point_on_segment(p: &Vector2<f64>, a: &Vector2<f64>, b: &Vector2<f64>) -> Vector2<f64> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 0.0 {
        return *a
    }
    let t = clamp(&((p - a).dot(&ab) / len2), &0.0, &1.0);
    a + ab * t
}
