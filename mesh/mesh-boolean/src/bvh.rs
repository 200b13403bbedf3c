//! Bounding Volume Hierarchy for accelerated intersection queries.
//!
//! Face-level hierarchy over a triangle mesh. Supports box queries against a
//! single tree and simultaneous descent of two trees ([`Bvh::overlap_with`]),
//! which turns an O(n·m) face pair scan into O(n log n + k).

use mesh_types::{Aabb, IndexedMesh, MeshTopology, Point3};
use rayon::prelude::*;
use smallvec::SmallVec;

/// BVH node containing either leaf faces or child nodes.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node containing face indices.
    Leaf {
        /// Bounding box of all faces in this leaf.
        bbox: Aabb,
        /// Face indices stored in this leaf.
        triangles: SmallVec<[u32; 8]>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounding box of all faces in this subtree.
        bbox: Aabb,
        /// Left child node.
        left: Box<Self>,
        /// Right child node.
        right: Box<Self>,
    },
}

impl BvhNode {
    /// Get the bounding box of this node.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding Volume Hierarchy for triangle meshes.
///
/// Built once per mesh and immutable afterwards. Each face keeps its own
/// box so leaf queries are filtered per face, not per leaf.
#[derive(Debug, Clone)]
pub struct Bvh {
    root: Option<BvhNode>,
    face_boxes: Vec<Aabb>,
}

impl Bvh {
    /// Build a BVH from a mesh.
    ///
    /// Faces referencing missing vertices get an empty box and never match
    /// a query.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The mesh to build the BVH for
    /// * `max_leaf_size` - Maximum faces per leaf node
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::unit_cube;
    /// use mesh_boolean::bvh::Bvh;
    ///
    /// let bvh = Bvh::build(&unit_cube(), 4);
    /// assert_eq!(bvh.triangle_count(), 12);
    /// ```
    #[must_use]
    pub fn build(mesh: &IndexedMesh, max_leaf_size: usize) -> Self {
        let face_boxes: Vec<Aabb> = (0..mesh.face_count())
            .map(|i| face_box(mesh, i))
            .collect();
        Self::from_boxes(face_boxes, max_leaf_size, None)
    }

    /// Build a BVH using parallel construction for large meshes.
    ///
    /// Subtrees with at least `parallel_threshold` faces are built with
    /// `rayon::join`. The resulting tree is identical to [`Bvh::build`].
    #[must_use]
    pub fn build_parallel(
        mesh: &IndexedMesh,
        max_leaf_size: usize,
        parallel_threshold: usize,
    ) -> Self {
        let face_boxes: Vec<Aabb> = (0..mesh.face_count())
            .into_par_iter()
            .map(|i| face_box(mesh, i))
            .collect();
        Self::from_boxes(face_boxes, max_leaf_size, Some(parallel_threshold.max(2)))
    }

    fn from_boxes(face_boxes: Vec<Aabb>, max_leaf_size: usize, parallel: Option<usize>) -> Self {
        if face_boxes.is_empty() {
            return Self {
                root: None,
                face_boxes,
            };
        }
        let indices: Vec<u32> = (0..face_boxes.len() as u32).collect();
        let root = build_recursive(&face_boxes, indices, max_leaf_size.max(1), parallel);
        Self {
            root: Some(root),
            face_boxes,
        }
    }

    /// Faces whose boxes intersect the query box (within tolerance).
    #[must_use]
    pub fn query(&self, query_bbox: &Aabb, tolerance: f64) -> Vec<u32> {
        let mut result = Vec::new();
        if let Some(ref root) = self.root {
            self.query_recursive(root, query_bbox, tolerance, &mut result);
        }
        result
    }

    fn query_recursive(
        &self,
        node: &BvhNode,
        query_bbox: &Aabb,
        tolerance: f64,
        result: &mut Vec<u32>,
    ) {
        if !node.bbox().intersects(query_bbox, tolerance) {
            return;
        }
        match node {
            BvhNode::Leaf { triangles, .. } => {
                result.extend(
                    triangles
                        .iter()
                        .copied()
                        .filter(|&t| self.face_boxes[t as usize].intersects(query_bbox, tolerance)),
                );
            }
            BvhNode::Internal { left, right, .. } => {
                self.query_recursive(left, query_bbox, tolerance, result);
                self.query_recursive(right, query_bbox, tolerance, result);
            }
        }
    }

    /// Faces whose boxes contain the point (within tolerance).
    #[must_use]
    pub fn query_point(&self, point: &Point3<f64>, tolerance: f64) -> Vec<u32> {
        self.query(&Aabb::new(*point, *point), tolerance)
    }

    /// Face pairs `(self_face, other_face)` with overlapping boxes.
    ///
    /// Sorted, so the result is deterministic.
    #[must_use]
    pub fn overlap_candidates(&self, other: &Self, tolerance: f64) -> Vec<(u32, u32)> {
        self.overlap_with(other, tolerance, |_, _| true)
    }

    /// Face pairs `(self_face, other_face)` with overlapping boxes that
    /// also pass `accept`.
    ///
    /// Both trees are descended simultaneously; subtrees whose boxes are
    /// disjoint are pruned. Returns an empty vector if no boxes overlap.
    /// The result is sorted.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{cuboid, unit_cube, Point3};
    /// use mesh_boolean::bvh::Bvh;
    ///
    /// let a = Bvh::build(&unit_cube(), 4);
    /// let far = cuboid(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
    /// let b = Bvh::build(&far, 4);
    /// assert!(a.overlap_with(&b, 0.0, |_, _| true).is_empty());
    /// ```
    pub fn overlap_with<F>(&self, other: &Self, tolerance: f64, mut accept: F) -> Vec<(u32, u32)>
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut pairs = Vec::new();
        if let (Some(a), Some(b)) = (&self.root, &other.root) {
            self.overlap_recursive(other, a, b, tolerance, &mut accept, &mut pairs);
        }
        pairs.sort_unstable();
        pairs
    }

    fn overlap_recursive<F>(
        &self,
        other: &Self,
        a: &BvhNode,
        b: &BvhNode,
        tolerance: f64,
        accept: &mut F,
        pairs: &mut Vec<(u32, u32)>,
    ) where
        F: FnMut(u32, u32) -> bool,
    {
        if !a.bbox().intersects(b.bbox(), tolerance) {
            return;
        }

        match (a, b) {
            (BvhNode::Leaf { triangles: ta, .. }, BvhNode::Leaf { triangles: tb, .. }) => {
                for &fa in ta {
                    let box_a = &self.face_boxes[fa as usize];
                    for &fb in tb {
                        if box_a.intersects(&other.face_boxes[fb as usize], tolerance)
                            && accept(fa, fb)
                        {
                            pairs.push((fa, fb));
                        }
                    }
                }
            }
            (BvhNode::Internal { left, right, .. }, BvhNode::Leaf { .. }) => {
                self.overlap_recursive(other, left, b, tolerance, accept, pairs);
                self.overlap_recursive(other, right, b, tolerance, accept, pairs);
            }
            (BvhNode::Leaf { .. }, BvhNode::Internal { left, right, .. }) => {
                self.overlap_recursive(other, a, left, tolerance, accept, pairs);
                self.overlap_recursive(other, a, right, tolerance, accept, pairs);
            }
            (
                BvhNode::Internal {
                    bbox: box_a,
                    left: la,
                    right: ra,
                },
                BvhNode::Internal {
                    bbox: box_b,
                    left: lb,
                    right: rb,
                },
            ) => {
                // Descend the larger volume first
                if box_a.diagonal() >= box_b.diagonal() {
                    self.overlap_recursive(other, la, b, tolerance, accept, pairs);
                    self.overlap_recursive(other, ra, b, tolerance, accept, pairs);
                } else {
                    self.overlap_recursive(other, a, lb, tolerance, accept, pairs);
                    self.overlap_recursive(other, a, rb, tolerance, accept, pairs);
                }
            }
        }
    }

    /// Bounding box of one face, if the index is valid.
    #[must_use]
    pub fn face_bbox(&self, face: u32) -> Option<&Aabb> {
        self.face_boxes.get(face as usize)
    }

    /// Total number of faces in the BVH.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.face_boxes.len()
    }

    /// Check if the BVH is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Bounding box of the whole tree.
    #[must_use]
    pub fn root_bbox(&self) -> Option<&Aabb> {
        self.root.as_ref().map(BvhNode::bbox)
    }

    /// Statistics about the tree structure.
    #[must_use]
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if let Some(ref root) = self.root {
            collect_stats(root, 0, &mut stats);
        }
        stats
    }
}

fn face_box(mesh: &IndexedMesh, face: usize) -> Aabb {
    mesh.triangle(face)
        .map_or_else(Aabb::empty, |t| Aabb::from_triangle(&t.v0, &t.v1, &t.v2))
}

fn build_recursive(
    boxes: &[Aabb],
    mut indices: Vec<u32>,
    max_leaf_size: usize,
    parallel: Option<usize>,
) -> BvhNode {
    let bbox = indices
        .iter()
        .fold(Aabb::empty(), |acc, &i| acc.union(&boxes[i as usize]));

    if indices.len() <= max_leaf_size {
        return BvhNode::Leaf {
            bbox,
            triangles: indices.into_iter().collect(),
        };
    }

    // Median split along the longest axis of the centroid bounds
    let centroid_bounds = indices.iter().fold(Aabb::empty(), |mut acc, &i| {
        acc.expand_to_include(&boxes[i as usize].center());
        acc
    });
    let axis = centroid_bounds.longest_axis();
    indices.sort_by(|&a, &b| {
        let ca = boxes[a as usize].center()[axis];
        let cb = boxes[b as usize].center()[axis];
        ca.partial_cmp(&cb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let right_indices = indices.split_off(indices.len() / 2);
    let left_indices = indices;

    let (left, right) = match parallel {
        Some(threshold) if left_indices.len() + right_indices.len() >= threshold => rayon::join(
            || build_recursive(boxes, left_indices, max_leaf_size, parallel),
            || build_recursive(boxes, right_indices, max_leaf_size, parallel),
        ),
        _ => (
            build_recursive(boxes, left_indices, max_leaf_size, parallel),
            build_recursive(boxes, right_indices, max_leaf_size, parallel),
        ),
    };

    BvhNode::Internal {
        bbox,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn collect_stats(node: &BvhNode, depth: usize, stats: &mut BvhStats) {
    stats.max_depth = stats.max_depth.max(depth);

    match node {
        BvhNode::Leaf { triangles, .. } => {
            stats.leaf_count += 1;
            stats.total_triangles_in_leaves += triangles.len();
            stats.max_leaf_size = stats.max_leaf_size.max(triangles.len());
        }
        BvhNode::Internal { left, right, .. } => {
            stats.internal_count += 1;
            collect_stats(left, depth + 1, stats);
            collect_stats(right, depth + 1, stats);
        }
    }
}

/// Statistics about BVH structure.
#[derive(Debug, Default, Clone)]
pub struct BvhStats {
    /// Number of internal (branch) nodes.
    pub internal_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Maximum depth of the tree.
    pub max_depth: usize,
    /// Maximum number of faces in any leaf.
    pub max_leaf_size: usize,
    /// Total faces stored across all leaves.
    pub total_triangles_in_leaves: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use mesh_types::{Vertex, cuboid, unit_cube};

    fn cube_at(x: f64) -> IndexedMesh {
        cuboid(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn test_bvh_build_empty() {
        let bvh = Bvh::build(&IndexedMesh::new(), 8);
        assert!(bvh.is_empty());
        assert_eq!(bvh.triangle_count(), 0);
        assert!(bvh.root_bbox().is_none());
    }

    #[test]
    fn test_bvh_build_box() {
        let bvh = Bvh::build(&unit_cube(), 4);
        assert_eq!(bvh.triangle_count(), 12);

        let stats = bvh.stats();
        assert!(stats.leaf_count > 1);
        assert!(stats.max_leaf_size <= 4);
        assert_eq!(stats.total_triangles_in_leaves, 12);

        let root = bvh.root_bbox().unwrap();
        assert_eq!(root.min, Point3::origin());
        assert_eq!(root.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_bvh_query() {
        let bvh = Bvh::build(&unit_cube(), 1);

        let all = bvh.query(&Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(2.0, 2.0, 2.0)), 0.0);
        assert_eq!(all.len(), 12);

        let near_corner = bvh.query_point(&Point3::origin(), 0.01);
        assert!(!near_corner.is_empty());
        assert!(near_corner.len() < 12);

        assert!(bvh.query_point(&Point3::new(10.0, 10.0, 10.0), 0.1).is_empty());
    }

    #[test]
    fn test_bvh_parallel_build_matches_sequential() {
        let mesh = unit_cube();
        let seq = Bvh::build(&mesh, 2);
        let par = Bvh::build_parallel(&mesh, 2, 2);
        assert_eq!(seq.stats().leaf_count, par.stats().leaf_count);
        let other = Bvh::build(&cube_at(0.5), 2);
        assert_eq!(
            seq.overlap_candidates(&other, 0.0),
            par.overlap_candidates(&other, 0.0)
        );
    }

    #[test]
    fn test_overlap_disjoint_is_empty() {
        let a = Bvh::build(&cube_at(0.0), 4);
        let b = Bvh::build(&cube_at(3.0), 4);
        assert!(a.overlap_candidates(&b, 0.0).is_empty());
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = Bvh::build(&cube_at(0.0), 2);
        let b = Bvh::build(&cube_at(0.5), 3);

        let ab = a.overlap_candidates(&b, 0.0);
        let mut ba: Vec<(u32, u32)> = b
            .overlap_candidates(&a, 0.0)
            .into_iter()
            .map(|(x, y)| (y, x))
            .collect();
        ba.sort_unstable();

        assert!(!ab.is_empty());
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_overlap_filter_rejects() {
        let a = Bvh::build(&cube_at(0.0), 4);
        let b = Bvh::build(&cube_at(0.5), 4);
        assert!(a.overlap_with(&b, 0.0, |_, _| false).is_empty());
    }

    #[test]
    fn test_face_with_missing_vertex_never_matches() {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        let bvh = Bvh::build(&mesh, 4);
        assert!(bvh.face_bbox(0).unwrap().is_empty());
        assert!(bvh.query_point(&Point3::origin(), 1.0).is_empty());
    }
}
