//! Exact boolean intersection of two closed meshes.
//!
//! Every face of each mesh is cut by the planes of the faces of the other
//! mesh it touches. Coplanar contacts are cut by the other face's edge
//! planes instead, so fragment boundaries line up on shared planes. Each
//! fragment is then classified against the other mesh and kept when it
//! bounds the common volume:
//!
//! | Fragment of | Inside | On surface, same facing | On surface, opposite | Outside |
//! |-------------|--------|-------------------------|----------------------|---------|
//! | A           | keep   | keep                    | drop                 | drop    |
//! | B           | keep   | drop                    | drop                 | drop    |

use crate::bvh::Bvh;
use crate::classify::{FragmentLocation, classify_fragment};
use crate::clip::{Plane, Polygon, PolygonSplit, fan_triangulate, polygon_area, polygon_centroid};
use crate::config::BooleanConfig;
use crate::error::{BooleanError, BooleanResult};
use crate::intersect::{signed_distance_to_plane, triangles_intersect};
use crate::weld::weld_vertices;
use mesh_types::{Aabb, IndexedMesh, MeshBounds, MeshTopology, Vector3, Vertex};
use rayon::prelude::*;
use tracing::debug;

/// Ray-cast epsilon for fragment classification.
const RAY_EPSILON: f64 = 1e-12;

/// Statistics from a boolean operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanStats {
    /// Fragments of mesh A kept in the result.
    pub faces_from_a: usize,
    /// Fragments of mesh B kept in the result.
    pub faces_from_b: usize,
    /// Fragments produced by splitting mesh A.
    pub fragments_a: usize,
    /// Fragments produced by splitting mesh B.
    pub fragments_b: usize,
    /// Fragments found lying on the other mesh's surface.
    pub coplanar_fragments: usize,
    /// Whether the bounding boxes of the meshes overlapped at all.
    pub meshes_intersected: bool,
}

/// Result of a boolean operation.
#[derive(Debug, Clone)]
pub struct BooleanOperationResult {
    /// The resulting mesh.
    pub mesh: IndexedMesh,
    /// Statistics about the operation.
    pub stats: BooleanStats,
}

#[derive(Debug)]
struct Fragment {
    polygon: Polygon,
    normal: Vector3<f64>,
}

/// Intersection A ∩ B with default configuration.
///
/// # Errors
///
/// Returns `BooleanError` if either mesh is empty, has out-of-range face
/// indices or non-finite coordinates.
///
/// # Example
///
/// ```
/// use mesh_boolean::intersection;
/// use mesh_types::{cuboid, Point3};
///
/// let a = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// let b = cuboid(Point3::new(0.5, 0.0, 0.0), Point3::new(1.5, 1.0, 1.0));
/// let common = intersection(&a, &b)?;
/// assert!((common.signed_volume() - 0.5).abs() < 1e-9);
/// # Ok::<(), mesh_boolean::BooleanError>(())
/// ```
pub fn intersection(mesh_a: &IndexedMesh, mesh_b: &IndexedMesh) -> BooleanResult<IndexedMesh> {
    intersection_with_config(mesh_a, mesh_b, &BooleanConfig::default()).map(|r| r.mesh)
}

/// Intersection A ∩ B with custom configuration.
///
/// The result is welded and wound outward. An empty mesh means the solids
/// do not share any volume.
///
/// # Errors
///
/// Returns `BooleanError` if:
/// - `config` fails [`BooleanConfig::validate`]
/// - Either mesh is empty
/// - A face references a missing vertex
/// - A coordinate is not finite
/// - Splitting exceeds `config.max_fragments`
pub fn intersection_with_config(
    mesh_a: &IndexedMesh,
    mesh_b: &IndexedMesh,
    config: &BooleanConfig,
) -> BooleanResult<BooleanOperationResult> {
    config.validate()?;
    validate(mesh_a, "A")?;
    validate(mesh_b, "B")?;

    let bounds_a = mesh_a.bounds();
    let bounds_b = mesh_b.bounds();
    if !bounds_a.intersects(&bounds_b, config.coplanar_tolerance) {
        return Ok(BooleanOperationResult {
            mesh: IndexedMesh::new(),
            stats: BooleanStats::default(),
        });
    }

    let bvh_a = Bvh::build(mesh_a, config.bvh_leaf_size);
    let bvh_b = Bvh::build(mesh_b, config.bvh_leaf_size);

    let fragments_a = split_faces(mesh_a, mesh_b, &bvh_b, config)?;
    let fragments_b = split_faces(mesh_b, mesh_a, &bvh_a, config)?;

    let locations_a = classify_all(&fragments_a, mesh_b, &bvh_b, config);
    let locations_b = classify_all(&fragments_b, mesh_a, &bvh_a, config);

    let mut stats = BooleanStats {
        fragments_a: fragments_a.len(),
        fragments_b: fragments_b.len(),
        coplanar_fragments: locations_a
            .iter()
            .chain(&locations_b)
            .filter(|l| {
                matches!(
                    l,
                    FragmentLocation::CoplanarSame | FragmentLocation::CoplanarOpposite
                )
            })
            .count(),
        meshes_intersected: true,
        ..BooleanStats::default()
    };

    let mut result = IndexedMesh::new();
    for (fragment, location) in fragments_a.iter().zip(&locations_a) {
        if matches!(
            location,
            FragmentLocation::Inside | FragmentLocation::CoplanarSame
        ) {
            append_polygon(&mut result, &fragment.polygon);
            stats.faces_from_a += 1;
        }
    }
    for (fragment, location) in fragments_b.iter().zip(&locations_b) {
        if *location == FragmentLocation::Inside {
            append_polygon(&mut result, &fragment.polygon);
            stats.faces_from_b += 1;
        }
    }

    weld_vertices(&mut result, config.vertex_weld_tolerance);

    debug!(
        fragments_a = stats.fragments_a,
        fragments_b = stats.fragments_b,
        kept_a = stats.faces_from_a,
        kept_b = stats.faces_from_b,
        faces = result.faces.len(),
        "boolean intersection finished"
    );

    Ok(BooleanOperationResult {
        mesh: result,
        stats,
    })
}

fn validate(mesh: &IndexedMesh, name: &str) -> BooleanResult<()> {
    if mesh.is_empty() {
        return Err(BooleanError::EmptyMesh {
            details: format!("mesh {name} has no vertices or no faces"),
        });
    }
    let n = mesh.vertices.len();
    if let Some(face) = mesh
        .faces
        .iter()
        .find(|f| f.iter().any(|&i| i as usize >= n))
    {
        return Err(BooleanError::DegenerateMesh {
            details: format!("mesh {name} face {face:?} references a missing vertex (of {n})"),
        });
    }
    if !mesh.is_finite() {
        return Err(BooleanError::NumericalError {
            details: format!("mesh {name} has non-finite vertex coordinates"),
        });
    }
    Ok(())
}

/// Cut every face of `mesh` by the planes of the `other` faces it touches.
fn split_faces(
    mesh: &IndexedMesh,
    other: &IndexedMesh,
    other_bvh: &Bvh,
    config: &BooleanConfig,
) -> BooleanResult<Vec<Fragment>> {
    let mut fragments = Vec::with_capacity(mesh.faces.len());

    for tri in mesh.triangles() {
        let Some(normal) = tri.normal() else {
            continue;
        };
        let face_box = Aabb::from_triangle(&tri.v0, &tri.v1, &tri.v2);

        let mut cutters: Vec<Plane> = Vec::new();
        for face in other_bvh.query(&face_box, config.coplanar_tolerance) {
            let Some(other_tri) = other.triangle(face as usize) else {
                continue;
            };
            if !triangles_intersect(&tri, &other_tri, config.coplanar_tolerance) {
                continue;
            }
            let Some(other_normal) = other_tri.normal() else {
                continue;
            };

            let coplanar = other_tri
                .vertices()
                .iter()
                .all(|p| signed_distance_to_plane(p, &tri.v0, &normal).abs() <= config.coplanar_tolerance);

            if coplanar {
                for (start, end) in other_tri.edges() {
                    if let Some(plane) =
                        Plane::from_point_normal(&start, &other_normal.cross(&(end - start)))
                    {
                        cutters.push(plane);
                    }
                }
            } else if let Some(plane) = Plane::from_triangle(&other_tri) {
                cutters.push(plane);
            }
        }

        let mut pieces: Vec<Polygon> = vec![tri.vertices().into_iter().collect()];
        for plane in &cutters {
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for piece in pieces {
                match plane.split_polygon(&piece, config.split_tolerance) {
                    PolygonSplit::Spanning { front, back } => {
                        next.push(front);
                        next.push(back);
                    }
                    PolygonSplit::Coplanar | PolygonSplit::Front | PolygonSplit::Back => {
                        next.push(piece);
                    }
                }
            }
            pieces = next;
        }

        fragments.extend(
            pieces
                .into_iter()
                .filter(|p| p.len() >= 3 && polygon_area(p) >= config.min_fragment_area)
                .map(|polygon| Fragment { polygon, normal }),
        );

        if fragments.len() > config.max_fragments {
            return Err(BooleanError::FragmentLimit {
                fragments: fragments.len(),
                limit: config.max_fragments,
            });
        }
    }

    Ok(fragments)
}

fn classify_all(
    fragments: &[Fragment],
    other: &IndexedMesh,
    other_bvh: &Bvh,
    config: &BooleanConfig,
) -> Vec<FragmentLocation> {
    let classify = |fragment: &Fragment| {
        polygon_centroid(&fragment.polygon).map_or(FragmentLocation::Outside, |centroid| {
            classify_fragment(
                &centroid,
                &fragment.normal,
                other,
                other_bvh,
                config.classification_tolerance,
                RAY_EPSILON,
            )
        })
    };

    if config.parallel {
        fragments.par_iter().map(classify).collect()
    } else {
        fragments.iter().map(classify).collect()
    }
}

fn append_polygon(result: &mut IndexedMesh, polygon: &[mesh_types::Point3<f64>]) {
    for tri in fan_triangulate(polygon) {
        let base = result.vertices.len() as u32;
        result.vertices.push(Vertex::new(tri.v0));
        result.vertices.push(Vertex::new(tri.v1));
        result.vertices.push(Vertex::new(tri.v2));
        result.faces.push([base, base + 1, base + 2]);
    }
}
