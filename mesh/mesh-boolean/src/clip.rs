//! Plane clipping of convex polygons.
//!
//! Faces are refined by cutting them with the planes of the triangles they
//! cross. Each cut splits a convex polygon into a front and a back part,
//! which stay convex, so fragments can be fan-triangulated at the end.

use mesh_types::{Point3, Triangle, Vector3};
use smallvec::SmallVec;

/// Convex polygon as an ordered vertex loop.
pub type Polygon = SmallVec<[Point3<f64>; 8]>;

/// An oriented plane `normal · p = offset` with unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vector3<f64>,
    /// Signed distance of the plane from the origin along `normal`.
    pub offset: f64,
}

/// Outcome of clipping a polygon against a plane.
#[derive(Debug, Clone)]
pub enum PolygonSplit {
    /// Every vertex lies within tolerance of the plane.
    Coplanar,
    /// Entirely on the positive side (touching allowed).
    Front,
    /// Entirely on the negative side (touching allowed).
    Back,
    /// The plane cuts through the polygon.
    Spanning {
        /// Part on the positive side.
        front: Polygon,
        /// Part on the negative side.
        back: Polygon,
    },
}

impl Plane {
    /// Plane through a point with the given normal, or `None` for a zero
    /// normal.
    #[must_use]
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>) -> Option<Self> {
        let n = normal.try_normalize(f64::EPSILON)?;
        Some(Self {
            normal: n,
            offset: n.dot(&point.coords),
        })
    }

    /// Plane of a triangle, oriented by its winding.
    #[must_use]
    pub fn from_triangle(tri: &Triangle) -> Option<Self> {
        Self::from_point_normal(&tri.v0, &tri.normal_unnormalized())
    }

    /// Signed distance from the plane (positive on the normal side).
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.offset
    }

    /// Same plane with the opposite orientation.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Clip a convex polygon against this plane.
    ///
    /// Vertices within `epsilon` of the plane count as on it and end up in
    /// both halves, so no slivers thinner than `epsilon` are produced.
    #[must_use]
    pub fn split_polygon(&self, polygon: &[Point3<f64>], epsilon: f64) -> PolygonSplit {
        let dist: SmallVec<[f64; 8]> = polygon.iter().map(|p| self.signed_distance(p)).collect();
        let any_front = dist.iter().any(|&d| d > epsilon);
        let any_back = dist.iter().any(|&d| d < -epsilon);

        match (any_front, any_back) {
            (false, false) => return PolygonSplit::Coplanar,
            (true, false) => return PolygonSplit::Front,
            (false, true) => return PolygonSplit::Back,
            (true, true) => {}
        }

        let mut front = Polygon::new();
        let mut back = Polygon::new();
        let n = polygon.len();

        for i in 0..n {
            let j = (i + 1) % n;
            let (pi, di) = (polygon[i], dist[i]);
            let (pj, dj) = (polygon[j], dist[j]);

            if di > epsilon {
                front.push(pi);
            } else if di < -epsilon {
                back.push(pi);
            } else {
                front.push(pi);
                back.push(pi);
            }

            let crosses = (di > epsilon && dj < -epsilon) || (di < -epsilon && dj > epsilon);
            if crosses {
                let t = di / (di - dj);
                let p = pi + (pj - pi) * t;
                front.push(p);
                back.push(p);
            }
        }

        PolygonSplit::Spanning { front, back }
    }
}

/// Area of a planar convex polygon.
#[must_use]
pub fn polygon_area(polygon: &[Point3<f64>]) -> f64 {
    let Some(first) = polygon.first() else {
        return 0.0;
    };
    let mut sum = Vector3::zeros();
    for w in polygon.windows(2).skip(1) {
        sum += (w[0] - first).cross(&(w[1] - first));
    }
    sum.norm() * 0.5
}

/// Centroid of a planar convex polygon (area-weighted over its fan).
#[must_use]
pub fn polygon_centroid(polygon: &[Point3<f64>]) -> Option<Point3<f64>> {
    let first = *polygon.first()?;
    let mut total = 0.0;
    let mut weighted = Vector3::zeros();
    for w in polygon.windows(2).skip(1) {
        let area = (w[0] - first).cross(&(w[1] - first)).norm();
        total += area;
        weighted += (first.coords + w[0].coords + w[1].coords) * (area / 3.0);
    }
    (total > 0.0).then(|| Point3::from(weighted / total))
}

/// Fan-triangulate a convex polygon. Winding follows the vertex order.
#[must_use]
pub fn fan_triangulate(polygon: &[Point3<f64>]) -> Vec<Triangle> {
    let Some(&first) = polygon.first() else {
        return Vec::new();
    };
    polygon
        .windows(2)
        .skip(1)
        .map(|w| Triangle::new(first, w[0], w[1]))
        .collect()
}
