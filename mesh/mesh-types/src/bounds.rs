//! Axis-aligned bounding boxes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis-aligned box with inclusive bounds.
///
/// The empty box has `min = +inf` and `max = -inf`, so it is the identity
/// for [`union`](Self::union) and never intersects anything.
///
/// # Example
///
/// ```
/// use mesh_types::{Aabb, Point3};
///
/// let a = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// let b = Aabb::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
///
/// // Shared faces count as contact.
/// assert!(a.intersects(&b, 0.0));
/// assert!(a.union(&b).contains(&Point3::new(1.5, 0.5, 0.5)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Lower corner.
    pub min: Point3<f64>,
    /// Upper corner.
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Box spanned by two corners in any order.
    #[must_use]
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// The empty box.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::from(Vector3::repeat(f64::INFINITY)),
            max: Point3::from(Vector3::repeat(f64::NEG_INFINITY)),
        }
    }

    /// Tight box around `points`; empty for no points.
    #[must_use]
    pub fn from_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Self {
        points.fold(Self::empty(), |mut acc, p| {
            acc.expand_to_include(p);
            acc
        })
    }

    /// Tight box around one triangle.
    #[must_use]
    pub fn from_triangle(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Self {
        Self::from_points([v0, v1, v2].into_iter())
    }

    /// `min > max` on some axis.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Extent per axis.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Midpoint of the corners.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Corner-to-corner length; 0.0 when empty.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.size().norm() }
    }

    /// Axis with the largest extent (0 = x, 1 = y, 2 = z). Ties go to the
    /// lower axis.
    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let s = self.size();
        (1..3).fold(0, |best, i| if s[i] > s[best] { i } else { best })
    }

    /// `point` lies inside or on the boundary.
    #[inline]
    #[must_use]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// The boxes overlap once each is padded by `tolerance`.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        (0..3).all(|i| {
            self.min[i] <= other.max[i] + tolerance && other.min[i] <= self.max[i] + tolerance
        })
    }

    /// Smallest box holding both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Grow to include `point`.
    #[inline]
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }
}
