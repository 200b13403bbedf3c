//! Mesh vertex.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A mesh vertex.
///
/// Only the position is stored. Normals are derived from faces where an
/// algorithm needs them, so transforms and offsets never leave stale data
/// behind.
///
/// # Example
///
/// ```
/// use mesh_types::{Vertex, Point3};
///
/// let v = Vertex::from_coords(1.0, 2.0, 3.0);
/// assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
/// assert_eq!(Vertex::from([1.0, 2.0, 3.0]), v);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in world or body-local space, depending on the owner.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Vertex at `position`.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Vertex at `(x, y, z)`.
    #[inline]
    #[must_use]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// No coordinate is NaN or infinite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::from_coords(x, y, z)
    }
}
