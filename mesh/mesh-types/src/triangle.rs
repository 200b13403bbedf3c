//! Triangle with resolved corner positions.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Squared-length floor below which a face normal is treated as undefined.
const DEGENERATE_NORMAL_SQ: f64 = f64::EPSILON * f64::EPSILON;

/// A triangle with its three corners, in face winding order.
///
/// Produced by [`MeshTopology::triangle`](crate::MeshTopology::triangle);
/// the intersection predicates work on these rather than on indices.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    /// First corner.
    pub v0: Point3<f64>,
    /// Second corner.
    pub v1: Point3<f64>,
    /// Third corner.
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Triangle from three corners.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// `(v1 - v0) × (v2 - v0)`; its length is twice the area.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{Triangle, Point3};
    ///
    /// let tri = Triangle::new(
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(2.0, 0.0, 0.0),
    ///     Point3::new(0.0, 2.0, 0.0),
    /// );
    /// assert!((tri.normal_unnormalized().z - 4.0).abs() < 1e-10);
    /// ```
    #[inline]
    #[must_use]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Outward unit normal by the right-hand rule. `None` for slivers with
    /// (numerically) zero area.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        (n.norm_squared() > DEGENERATE_NORMAL_SQ).then(|| n.normalize())
    }

    /// Mean of the corners.
    #[inline]
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Directed edges `v0→v1`, `v1→v2`, `v2→v0`.
    #[inline]
    #[must_use]
    pub const fn edges(&self) -> [(Point3<f64>, Point3<f64>); 3] {
        [(self.v0, self.v1), (self.v1, self.v2), (self.v2, self.v0)]
    }

    /// Corners as an array.
    #[inline]
    #[must_use]
    pub const fn vertices(&self) -> [Point3<f64>; 3] {
        [self.v0, self.v1, self.v2]
    }
}
