//! Per-body face hierarchies.

use crate::body::BodyId;
use crate::snapshot::MeshSnapshot;
use mesh_boolean::Bvh;
use mesh_boolean::intersect::triangles_intersect;
use mesh_types::{IndexedMesh, MeshTopology};
use tracing::debug;

/// Distance within which touching faces are reported as overlapping.
pub const CONTACT_TOLERANCE: f64 = 1e-9;

/// Refined meshes with at least this many faces build their BVH on the
/// rayon pool.
pub const PARALLEL_BUILD_FACES: usize = 16_384;

/// Immutable BVH over a snapshot's refined faces.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    snapshot: MeshSnapshot,
    bvh: Bvh,
}

impl SpatialIndex {
    /// Build the index. Returns `None` when the refined mesh has no faces.
    ///
    /// Meshes of [`PARALLEL_BUILD_FACES`] or more faces are split on the
    /// rayon pool; the tree is the same either way.
    ///
    /// # Example
    ///
    /// ```
    /// use sim_structure::{Body, BodyId, MeshSnapshot, SpatialIndex, StructureSettings};
    /// use mesh_types::{unit_cube, Vector3};
    ///
    /// let settings = StructureSettings::default().with_subdivision(0);
    /// let a = Body::new(BodyId::new(0), "a", unit_cube());
    /// let b = Body::new(BodyId::new(1), "b", unit_cube())
    ///     .with_translation(Vector3::new(0.5, 0.0, 0.0));
    ///
    /// let index_a = SpatialIndex::build(MeshSnapshot::capture(&a, &settings).unwrap(), 4).unwrap();
    /// let index_b = SpatialIndex::build(MeshSnapshot::capture(&b, &settings).unwrap(), 4).unwrap();
    ///
    /// assert!(!index_a.overlap(&index_b).is_empty());
    /// ```
    #[must_use]
    pub fn build(snapshot: MeshSnapshot, leaf_size: usize) -> Option<Self> {
        let faces = snapshot.refined.face_count();
        if faces == 0 {
            return None;
        }
        let bvh = if faces >= PARALLEL_BUILD_FACES {
            Bvh::build_parallel(&snapshot.refined, leaf_size, PARALLEL_BUILD_FACES / 4)
        } else {
            Bvh::build(&snapshot.refined, leaf_size)
        };
        let stats = bvh.stats();
        debug!(
            body = %snapshot.body,
            faces,
            leaves = stats.leaf_count,
            depth = stats.max_depth,
            "spatial index built"
        );
        Some(Self { snapshot, bvh })
    }

    /// Body this index was built for.
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.snapshot.body
    }

    /// The snapshot the index covers.
    #[must_use]
    pub fn snapshot(&self) -> &MeshSnapshot {
        &self.snapshot
    }

    /// Refined mesh whose faces the index covers.
    #[must_use]
    pub fn mesh(&self) -> &IndexedMesh {
        &self.snapshot.refined
    }

    /// The underlying hierarchy.
    #[must_use]
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Face pairs `(self face, other face)` whose triangles touch or cross.
    ///
    /// Both trees are descended together and pruned by node boxes; surviving
    /// leaf pairs are filtered by face boxes and an exact triangle test.
    /// Pairs are sorted.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> Vec<(u32, u32)> {
        let mesh_a = self.mesh();
        let mesh_b = other.mesh();
        self.bvh.overlap_with(&other.bvh, CONTACT_TOLERANCE, |fa, fb| {
            match (mesh_a.triangle(fa as usize), mesh_b.triangle(fb as usize)) {
                (Some(ta), Some(tb)) => triangles_intersect(&ta, &tb, CONTACT_TOLERANCE),
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::config::StructureSettings;
    use mesh_types::{Vector3, unit_cube};

    fn index_at(id: u64, offset: Vector3<f64>, subdivision: u32) -> SpatialIndex {
        let settings = StructureSettings::default().with_subdivision(subdivision);
        let body = Body::new(BodyId::new(id), "cube", unit_cube()).with_translation(offset);
        SpatialIndex::build(MeshSnapshot::capture(&body, &settings).unwrap(), 4).unwrap()
    }

    #[test]
    fn test_disjoint_bodies_have_no_pairs() {
        let a = index_at(0, Vector3::zeros(), 1);
        let b = index_at(1, Vector3::new(3.0, 0.0, 0.0), 1);
        assert!(a.overlap(&b).is_empty());
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = index_at(0, Vector3::zeros(), 1);
        let b = index_at(1, Vector3::new(0.9, 0.1, -0.2), 1);

        let ab = a.overlap(&b);
        let mut ba: Vec<(u32, u32)> = b.overlap(&a).into_iter().map(|(x, y)| (y, x)).collect();
        ba.sort_unstable();

        assert!(!ab.is_empty());
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_touching_faces_overlap() {
        let a = index_at(0, Vector3::zeros(), 0);
        let b = index_at(1, Vector3::new(1.0, 0.0, 0.0), 0);
        assert!(!a.overlap(&b).is_empty());
    }

    #[test]
    fn test_pairs_index_refined_faces() {
        let a = index_at(0, Vector3::zeros(), 2);
        let b = index_at(1, Vector3::new(0.5, 0.5, 0.5), 2);
        let faces_a = a.mesh().face_count() as u32;
        let faces_b = b.mesh().face_count() as u32;
        for (fa, fb) in a.overlap(&b) {
            assert!(fa < faces_a);
            assert!(fb < faces_b);
        }
        assert_eq!(a.body(), BodyId::new(0));
    }

    #[test]
    fn test_large_snapshot_builds_same_tree_in_parallel() {
        let a = index_at(0, Vector3::zeros(), 6);
        let b = index_at(1, Vector3::new(0.9, 0.0, 0.0), 1);
        let faces = a.mesh().face_count();
        assert!(faces >= PARALLEL_BUILD_FACES);

        let stats = a.bvh().stats();
        assert_eq!(stats.total_triangles_in_leaves, faces);
        assert!(stats.max_leaf_size <= 4);

        let sequential = Bvh::build(a.mesh(), 4);
        assert_eq!(sequential.stats().leaf_count, stats.leaf_count);
        assert_eq!(
            sequential.overlap_candidates(b.bvh(), 0.0),
            a.bvh().overlap_candidates(b.bvh(), 0.0)
        );
    }

    #[test]
    fn test_build_refuses_empty_snapshot() {
        let snapshot = MeshSnapshot {
            body: BodyId::new(9),
            origin: mesh_types::Point3::origin(),
            world: IndexedMesh::new(),
            solid: IndexedMesh::new(),
            refined: IndexedMesh::new(),
            subdivision: 0,
        };
        assert!(SpatialIndex::build(snapshot, 4).is_none());
    }
}
