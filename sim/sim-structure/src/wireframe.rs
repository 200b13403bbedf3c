//! Edge wireframes.
//!
//! A body can be split into one segment body per mesh edge. The segments are
//! two-vertex meshes with no faces, placed in world space, so a host can
//! build a strut lattice from them. They are never overlap sources.

use crate::body::{Body, BodyId};
use crate::error::{StructureError, StructureResult};
use crate::scene::{MemoryScene, Scene};
use hashbrown::HashSet;
use mesh_types::{IndexedMesh, Vertex};
use tracing::debug;

/// Unique undirected edges of `mesh` in first-seen order.
///
/// Each edge is reported once as `[a, b]` with the vertices in the order
/// the first face using it lists them. Faces with out-of-range indices are
/// skipped.
///
/// # Example
///
/// ```
/// use sim_structure::wireframe::mesh_edges;
/// use mesh_types::unit_cube;
///
/// // 12 cube edges plus one diagonal per side
/// assert_eq!(mesh_edges(&unit_cube()).len(), 18);
/// ```
#[must_use]
pub fn mesh_edges(mesh: &IndexedMesh) -> Vec<[u32; 2]> {
    let count = mesh.vertices.len();
    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for face in &mesh.faces {
        if face.iter().any(|&i| i as usize >= count) {
            continue;
        }
        for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
            if a != b && seen.insert((a.min(b), a.max(b))) {
                edges.push([a, b]);
            }
        }
    }
    edges
}

/// Replace `id`'s wireframe with one segment body per edge of its mesh.
///
/// Segments are named `"{name}_edge{k}"`, carry `id` as their parent and
/// copy its passive flag. Segments from an earlier split of the same body
/// are removed first. The source body is left in place.
///
/// # Errors
///
/// Returns [`StructureError::BodyNotFound`] if `id` is not in the scene.
pub fn split_into_edges(scene: &mut MemoryScene, id: BodyId) -> StructureResult<Vec<BodyId>> {
    let body = scene.body(id).ok_or(StructureError::BodyNotFound(id.raw()))?;
    let name = body.name.clone();
    let passive = body.passive;
    let world = body.world_mesh();

    let stale: Vec<_> = scene
        .bodies()
        .iter()
        .filter(|b| !b.is_collider && b.parent == Some(id))
        .map(|b| b.id)
        .collect();
    let removed = stale.len();
    for old in stale {
        scene.remove(old);
    }

    let mut segments = Vec::new();
    for (k, [a, b]) in mesh_edges(&world).into_iter().enumerate() {
        let mut mesh = IndexedMesh::with_capacity(2, 0);
        mesh.vertices.push(Vertex::new(world.vertices[a as usize].position));
        mesh.vertices.push(Vertex::new(world.vertices[b as usize].position));

        let segment = scene.next_body_id();
        scene.insert(
            Body::new(segment, format!("{name}_edge{k}"), mesh)
                .with_passive(passive)
                .with_parent(id),
        );
        segments.push(segment);
    }

    debug!(body = %id, segments = segments.len(), removed, "wireframe split");
    Ok(segments)
}
