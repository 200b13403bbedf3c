//! Triangle predicates: ray casts, triangle-triangle overlap and
//! closest-point queries.

// Barycentric determinant terms look suspicious to clippy but are correct
#![allow(clippy::suspicious_operation_groupings)]

use mesh_types::{Point3, Triangle, Vector3};

/// Ray-triangle intersection using the Möller-Trumbore algorithm.
///
/// # Arguments
///
/// * `origin` - Ray origin
/// * `direction` - Ray direction (does not need to be normalized)
/// * `tri` - Triangle to test
/// * `epsilon` - Tolerance for parallel rays and hits behind the origin
///
/// # Returns
///
/// `Some(t)` where the hit point is `origin + t * direction`, or `None`.
#[must_use]
pub fn ray_triangle_intersect(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    tri: &Triangle,
    epsilon: f64,
) -> Option<f64> {
    let edge1 = tri.v1 - tri.v0;
    let edge2 = tri.v2 - tri.v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    // Ray is parallel to triangle
    if a.abs() < epsilon {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - tri.v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > epsilon).then_some(t)
}

/// Signed distance from a point to a plane given by a point and unit normal.
#[inline]
#[must_use]
pub fn signed_distance_to_plane(
    point: &Point3<f64>,
    plane_point: &Point3<f64>,
    plane_normal: &Vector3<f64>,
) -> f64 {
    (point - plane_point).dot(plane_normal)
}

/// Test whether two triangles intersect or touch within `tolerance`.
///
/// Non-coplanar pairs use the plane-separation reject followed by an
/// interval test along the planes' intersection line. Coplanar pairs are
/// tested with 2D separating axes in the dominant projection plane.
/// Degenerate triangles never intersect.
///
/// # Example
///
/// ```
/// use mesh_boolean::intersect::triangles_intersect;
/// use mesh_types::{Point3, Triangle};
///
/// let a = Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(2.0, 0.0, 0.0),
///     Point3::new(0.0, 2.0, 0.0),
/// );
/// let b = Triangle::new(
///     Point3::new(0.5, 0.5, -1.0),
///     Point3::new(0.5, 0.5, 1.0),
///     Point3::new(1.5, 0.5, 0.0),
/// );
/// assert!(triangles_intersect(&a, &b, 1e-9));
/// ```
#[must_use]
pub fn triangles_intersect(a: &Triangle, b: &Triangle, tolerance: f64) -> bool {
    let (Some(na), Some(nb)) = (a.normal(), b.normal()) else {
        return false;
    };

    let db = b.vertices().map(|p| signed_distance_to_plane(&p, &a.v0, &na));
    if separated(&db, tolerance) {
        return false;
    }
    let da = a.vertices().map(|p| signed_distance_to_plane(&p, &b.v0, &nb));
    if separated(&da, tolerance) {
        return false;
    }

    let dir = na.cross(&nb);
    if db.iter().all(|d| d.abs() <= tolerance) || dir.norm_squared() < 1e-24 {
        return coplanar_overlap(a, b, &na, tolerance);
    }

    let (Some(ia), Some(ib)) = (
        crossing_interval(a, &da, &dir, tolerance),
        crossing_interval(b, &db, &dir, tolerance),
    ) else {
        return false;
    };

    let slack = tolerance * dir.norm();
    ia.0 <= ib.1 + slack && ib.0 <= ia.1 + slack
}

/// True if every distance is strictly on one side beyond the tolerance.
fn separated(d: &[f64; 3], tolerance: f64) -> bool {
    d.iter().all(|&x| x > tolerance) || d.iter().all(|&x| x < -tolerance)
}

/// Interval of `dir`-projections where the triangle meets the other plane.
fn crossing_interval(
    tri: &Triangle,
    dist: &[f64; 3],
    dir: &Vector3<f64>,
    tolerance: f64,
) -> Option<(f64, f64)> {
    let verts = tri.vertices();
    let proj = verts.map(|p| p.coords.dot(dir));
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut push = |x: f64| {
        lo = lo.min(x);
        hi = hi.max(x);
    };

    for i in 0..3 {
        if dist[i].abs() <= tolerance {
            push(proj[i]);
        }
        let j = (i + 1) % 3;
        let crosses = (dist[i] > tolerance && dist[j] < -tolerance)
            || (dist[i] < -tolerance && dist[j] > tolerance);
        if crosses {
            let t = dist[i] / (dist[i] - dist[j]);
            push(proj[i] + (proj[j] - proj[i]) * t);
        }
    }

    (lo <= hi).then_some((lo, hi))
}

/// 2D separating-axis overlap test for two coplanar triangles.
fn coplanar_overlap(a: &Triangle, b: &Triangle, normal: &Vector3<f64>, tolerance: f64) -> bool {
    // Drop the dominant normal axis
    let (u, v) = dominant_plane_axes(normal);
    let to_2d = |t: &Triangle| t.vertices().map(|p| [p[u], p[v]]);
    let pa = to_2d(a);
    let pb = to_2d(b);

    for poly in [&pa, &pb] {
        for i in 0..3 {
            let e0 = poly[i];
            let e1 = poly[(i + 1) % 3];
            let axis = [e0[1] - e1[1], e1[0] - e0[0]];
            let len = axis[0].hypot(axis[1]);
            if len < f64::EPSILON {
                continue;
            }
            let project = |pts: &[[f64; 2]; 3]| {
                pts.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                    let s = (p[0] * axis[0] + p[1] * axis[1]) / len;
                    (lo.min(s), hi.max(s))
                })
            };
            let (a_lo, a_hi) = project(&pa);
            let (b_lo, b_hi) = project(&pb);
            if a_hi + tolerance < b_lo || b_hi + tolerance < a_lo {
                return false;
            }
        }
    }
    true
}

/// The two coordinate axes spanning the projection plane that best
/// preserves area for the given normal.
#[must_use]
pub fn dominant_plane_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let n = normal.abs();
    if n.x >= n.y && n.x >= n.z {
        (1, 2)
    } else if n.y >= n.z {
        (2, 0)
    } else {
        (0, 1)
    }
}

/// Closest point on a triangle to `p`.
///
/// Region-based method (vertex, edge and face Voronoi regions); exact for
/// degenerate triangles as well.
#[must_use]
pub fn closest_point_on_triangle(p: &Point3<f64>, tri: &Triangle) -> Point3<f64> {
    let (a, b, c) = (tri.v0, tri.v1, tri.v2);
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() < f64::MIN_POSITIVE {
        return a;
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}
