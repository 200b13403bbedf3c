//! World-space mesh snapshots.
//!
//! A [`MeshSnapshot`] is an owned copy of a body's geometry prepared for one
//! synthesis run:
//!
//! 1. **World** - local mesh with the world transform applied
//! 2. **Solid** - world mesh offset by the signed margin
//! 3. **Refined** - solid mesh after midpoint subdivision
//!
//! The spatial index is built over the refined mesh, exact-volume contacts
//! use the solid and world meshes. Snapshots are discarded after the run.

use crate::body::{Body, BodyId};
use crate::config::StructureSettings;
use hashbrown::HashMap;
use mesh_types::{IndexedMesh, MeshTopology, Point3, Vector3, Vertex};
use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Vertex displacement at sharp corners is capped at this multiple of the
/// margin.
const MAX_OFFSET_FACTOR: f64 = 4.0;

/// Normals closer than this (by `1 - cos`) count as one plane when offsetting.
const NORMAL_MERGE_TOLERANCE: f64 = 1e-9;

/// Geometry of one body prepared for overlap queries.
#[derive(Debug, Clone)]
pub struct MeshSnapshot {
    /// Body the snapshot was taken from.
    pub body: BodyId,
    /// World position of the body's local origin.
    pub origin: Point3<f64>,
    /// Transformed mesh without margin.
    pub world: IndexedMesh,
    /// Transformed mesh with the margin applied.
    pub solid: IndexedMesh,
    /// Solid mesh after subdivision. Overlap face indices refer to this mesh.
    pub refined: IndexedMesh,
    /// Subdivision level actually applied.
    pub subdivision: u32,
}

impl MeshSnapshot {
    /// Capture a body's geometry using the run settings.
    ///
    /// Returns `None` for bodies without vertices or faces.
    ///
    /// # Example
    ///
    /// ```
    /// use sim_structure::{Body, BodyId, MeshSnapshot, StructureSettings};
    /// use mesh_types::{unit_cube, MeshTopology};
    ///
    /// let body = Body::new(BodyId::new(0), "cube", unit_cube());
    /// let settings = StructureSettings::default().with_subdivision(2);
    ///
    /// let snapshot = MeshSnapshot::capture(&body, &settings).unwrap();
    /// assert_eq!(snapshot.refined.face_count(), 12 * 16);
    /// ```
    #[must_use]
    pub fn capture(body: &Body, settings: &StructureSettings) -> Option<Self> {
        if body.mesh.is_empty() {
            debug!(body = %body.id, name = %body.name, "skipping empty mesh");
            return None;
        }

        let world = body.world_mesh();
        let solid = if settings.margin == 0.0 {
            world.clone()
        } else {
            let mut solid = world.clone();
            offset_surface(&mut solid, settings.margin);
            solid
        };

        let levels = effective_subdivision(
            solid.face_count(),
            settings.subdivision,
            settings.max_snapshot_faces,
        );
        if levels < settings.subdivision {
            warn!(
                body = %body.id,
                requested = settings.subdivision,
                applied = levels,
                limit = settings.max_snapshot_faces,
                "subdivision reduced to stay under the snapshot face limit"
            );
        }
        let refined = subdivide(&solid, levels);

        debug!(
            body = %body.id,
            vertices = refined.vertex_count(),
            faces = refined.face_count(),
            subdivision = levels,
            "snapshot captured"
        );

        Some(Self {
            body: body.id,
            origin: body.origin(),
            world,
            solid,
            refined,
            subdivision: levels,
        })
    }
}

/// Move every face plane of `mesh` by `margin` along its outward normal.
///
/// Each vertex is displaced by the least-squares solution of `n_i · d = margin`
/// over the distinct normals of its adjacent faces, so flat regions move by
/// exactly `margin` and box corners move along their diagonal. Displacements
/// are clamped to `4·|margin|`. Winding is unchanged.
pub fn offset_surface(mesh: &mut IndexedMesh, margin: f64) {
    if margin == 0.0 || mesh.is_empty() {
        return;
    }

    let mut adjacent: Vec<SmallVec<[Vector3<f64>; 6]>> = vec![SmallVec::new(); mesh.vertices.len()];
    for i in 0..mesh.face_count() {
        let (Some(tri), Some(face)) = (mesh.triangle(i), mesh.face(i)) else {
            continue;
        };
        let Some(normal) = tri.normal() else {
            continue;
        };
        for &v in &face {
            let normals = &mut adjacent[v as usize];
            if !normals
                .iter()
                .any(|n| n.dot(&normal) > 1.0 - NORMAL_MERGE_TOLERANCE)
            {
                normals.push(normal);
            }
        }
    }

    let limit = MAX_OFFSET_FACTOR * margin.abs();
    for (vertex, normals) in mesh.vertices.iter_mut().zip(&adjacent) {
        let mut d = vertex_displacement(normals, margin);
        let len = d.norm();
        if len > limit {
            d *= limit / len;
        }
        vertex.position += d;
    }
}

fn vertex_displacement(normals: &[Vector3<f64>], margin: f64) -> Vector3<f64> {
    match normals {
        [] => Vector3::zeros(),
        [n] => n * margin,
        _ => {
            let rows = DMatrix::from_fn(normals.len(), 3, |r, c| normals[r][c]);
            let rhs = DVector::from_element(normals.len(), margin);
            match rows.pseudo_inverse(1e-12) {
                Ok(pinv) => {
                    let d = pinv * rhs;
                    Vector3::new(d[0], d[1], d[2])
                }
                Err(_) => {
                    let sum: Vector3<f64> = normals.iter().sum();
                    sum.try_normalize(1e-12).map_or_else(Vector3::zeros, |n| n * margin)
                }
            }
        }
    }
}

/// Highest level `<= requested` whose face count stays within `max_faces`.
#[must_use]
pub fn effective_subdivision(face_count: usize, requested: u32, max_faces: usize) -> u32 {
    let mut level = requested;
    while level > 0 {
        let projected = (face_count as u128).saturating_mul(4_u128.saturating_pow(level));
        if projected <= max_faces as u128 {
            break;
        }
        level -= 1;
    }
    level
}

/// Midpoint-subdivide `mesh` `levels` times.
///
/// Every triangle becomes four per level, so each original edge ends up in
/// `2^levels` segments. Shared edges share midpoints.
#[must_use]
pub fn subdivide(mesh: &IndexedMesh, levels: u32) -> IndexedMesh {
    let mut current = mesh.clone();
    for _ in 0..levels {
        current = subdivide_midpoint(&current);
    }
    current
}

fn subdivide_midpoint(mesh: &IndexedMesh) -> IndexedMesh {
    let mut vertices = mesh.vertices.clone();
    let mut faces = Vec::with_capacity(mesh.faces.len() * 4);
    let mut edge_midpoints: HashMap<(u32, u32), u32> = HashMap::new();

    let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Vertex>| -> u32 {
        let key = (a.min(b), a.max(b));
        *edge_midpoints.entry(key).or_insert_with(|| {
            let p = nalgebra::center(
                &vertices[a as usize].position,
                &vertices[b as usize].position,
            );
            vertices.push(Vertex::new(p));
            (vertices.len() - 1) as u32
        })
    };

    for &[v0, v1, v2] in &mesh.faces {
        if [v0, v1, v2].iter().any(|&v| v as usize >= mesh.vertices.len()) {
            continue;
        }
        let m01 = midpoint(v0, v1, &mut vertices);
        let m12 = midpoint(v1, v2, &mut vertices);
        let m20 = midpoint(v2, v0, &mut vertices);

        faces.push([v0, m01, m20]);
        faces.push([v1, m12, m01]);
        faces.push([v2, m20, m12]);
        faces.push([m01, m12, m20]);
    }

    IndexedMesh::from_parts(vertices, faces)
}
