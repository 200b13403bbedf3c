//! Read-only mesh access.

use crate::{Aabb, Triangle};

/// Indexed face access shared by the BVH, the boolean engine and the
/// snapshot code.
pub trait MeshTopology {
    /// Vertex count.
    fn vertex_count(&self) -> usize;

    /// Face count.
    fn face_count(&self) -> usize;

    /// True when there is nothing to intersect: no vertices or no faces.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Vertex indices of face `index`.
    fn face(&self, index: usize) -> Option<[u32; 3]>;

    /// Face `index` with resolved corners. `None` if the face or one of its
    /// vertex indices is out of range.
    fn triangle(&self, index: usize) -> Option<Triangle>;

    /// Every face that resolves, in face order.
    fn triangles(&self) -> impl Iterator<Item = Triangle>;
}

/// Bounding box of a vertex set.
pub trait MeshBounds {
    /// Tight axis-aligned box, or [`Aabb::empty`] without vertices.
    fn bounds(&self) -> Aabb;
}
