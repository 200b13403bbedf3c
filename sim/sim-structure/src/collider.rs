//! Collider proxy generation and checks.
//!
//! A collider proxy is a simplified copy of a body's mesh (usually its convex
//! hull) that the host simulates in place of the render mesh. Proxies are
//! stored as bodies of their own with [`Body::is_collider`] set, so they
//! never act as overlap sources during synthesis.

use crate::body::{Body, BodyId};
use crate::config::{ColliderParams, ColliderShape, StructureSettings};
use crate::error::{ColliderError, StructureError, StructureResult};
use crate::index::SpatialIndex;
use crate::overlap::detect_overlaps;
use crate::progress::NullProgress;
use crate::scene::{MemoryScene, Scene};
use crate::snapshot::MeshSnapshot;
use chull::ConvexHullWrapper;
use hashbrown::HashSet;
use mesh_boolean::holes::fill_small_holes;
use mesh_boolean::weld::weld_vertices;
use mesh_types::{Aabb, IndexedMesh, Vertex};
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, warn};

/// Relative tolerance for the hull degeneracy tests.
const HULL_EPSILON: f64 = 1e-10;

/// Build a collider mesh from `mesh`.
///
/// The input is welded, boundary loops of up to
/// [`ColliderParams::fill_hole_sides`] edges are capped, and the result is
/// scaled about its vertex centroid by
/// [`ColliderParams::scale`], then scaled in its principal frame by
/// [`ColliderParams::axis_scale`]. The principal frame has x along the
/// farthest pair of vertices and is centred on that pair's midpoint.
///
/// # Errors
///
/// - [`ColliderError::InvalidParams`] if `params` fails validation
/// - [`ColliderError::EmptyMesh`] if `mesh` has no usable geometry
/// - [`ColliderError::DegenerateHull`] if a convex hull is requested for
///   flat or collinear input
///
/// # Example
///
/// ```
/// use sim_structure::{generate_collider, ColliderParams};
/// use mesh_types::{unit_cube, Vector3};
///
/// let params = ColliderParams::default().with_scale(Vector3::new(2.0, 1.0, 1.0));
/// let collider = generate_collider(&unit_cube(), &params)?;
///
/// assert_eq!(collider.faces.len(), 12);
/// assert!((collider.volume() - 2.0).abs() < 1e-9);
/// # Ok::<(), sim_structure::ColliderError>(())
/// ```
pub fn generate_collider(
    mesh: &IndexedMesh,
    params: &ColliderParams,
) -> Result<IndexedMesh, ColliderError> {
    params.validate()?;

    let mut welded = mesh.clone();
    if !welded.faces.is_empty() {
        weld_vertices(&mut welded, params.weld_distance);
        if params.fill_hole_sides > 0 {
            fill_small_holes(&mut welded, params.fill_hole_sides);
        }
    }
    if welded.vertices.is_empty() {
        return Err(ColliderError::EmptyMesh {
            details: format!(
                "{} vertices, {} faces after welding",
                mesh.vertices.len(),
                mesh.faces.len()
            ),
        });
    }

    if let Some(center) = welded.vertex_centroid() {
        welded.scale_about(&center, &params.scale);
    }
    if params.axis_scale != Vector3::new(1.0, 1.0, 1.0) {
        scale_principal(&mut welded, &params.axis_scale);
    }

    match params.shape {
        ColliderShape::Mesh => Ok(welded),
        ColliderShape::ConvexHull => {
            let points: Vec<_> = welded.vertices.iter().map(|v| v.position).collect();
            convex_hull(&points)
        }
    }
}

/// Farthest pair of points, as `(a, b)` with `a` first in input order.
///
/// Quadratic in the number of points. Returns `None` for fewer than two
/// points.
#[must_use]
pub fn principal_axis(points: &[Point3<f64>]) -> Option<(Point3<f64>, Point3<f64>)> {
    let mut best: Option<(f64, usize, usize)> = None;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = (points[j] - points[i]).norm_squared();
            if best.is_none_or(|(b, _, _)| d > b) {
                best = Some((d, i, j));
            }
        }
    }
    best.map(|(_, i, j)| (points[i], points[j]))
}

fn scale_principal(mesh: &mut IndexedMesh, factors: &Vector3<f64>) {
    let points: Vec<_> = mesh.vertices.iter().map(|v| v.position).collect();
    let Some((a, b)) = principal_axis(&points) else {
        return;
    };
    let Some(axis) = (b - a).try_normalize(f64::EPSILON) else {
        return;
    };

    let side = Vector3::z()
        .cross(&axis)
        .try_normalize(1e-9)
        .or_else(|| Vector3::x().cross(&axis).try_normalize(1e-9))
        .unwrap_or_else(Vector3::y);
    let up = axis.cross(&side);

    // Columns are the principal frame axes; its transpose is the inverse.
    let frame = Matrix3::from_columns(&[axis, side, up]);
    let transform = frame * Matrix3::from_diagonal(factors) * frame.transpose();
    let center = nalgebra::center(&a, &b);

    for vertex in &mut mesh.vertices {
        vertex.position = center + transform * (vertex.position - center);
    }
}

/// Convex hull of a point set as a closed CCW mesh.
///
/// The point spread is checked first so flat input fails with a clear
/// reason, then the hull is built by quickhull. Faces are oriented away
/// from the hull's vertex centroid and unused input points are dropped.
///
/// # Errors
///
/// - [`ColliderError::EmptyMesh`] if there are fewer than four finite points
/// - [`ColliderError::DegenerateHull`] if the points are coincident,
///   collinear or coplanar, or quickhull gives up
///
/// # Example
///
/// ```
/// use sim_structure::convex_hull;
/// use mesh_types::Point3;
///
/// let points = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
///     Point3::new(0.1, 0.1, 0.1),
/// ];
/// let hull = convex_hull(&points)?;
///
/// assert_eq!(hull.vertices.len(), 4);
/// assert!((hull.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
/// # Ok::<(), sim_structure::ColliderError>(())
/// ```
#[allow(clippy::cast_possible_truncation)]
pub fn convex_hull(points: &[Point3<f64>]) -> Result<IndexedMesh, ColliderError> {
    let points: Vec<_> = points
        .iter()
        .copied()
        .filter(|p| p.coords.iter().all(|c| c.is_finite()))
        .collect();
    if points.len() < 4 {
        return Err(ColliderError::EmptyMesh {
            details: format!("convex hull needs 4 points, got {}", points.len()),
        });
    }

    let scale = Aabb::from_points(points.iter()).diagonal().max(f64::MIN_POSITIVE);
    check_spread(&points, HULL_EPSILON * scale)?;

    let coords: Vec<Vec<f64>> = points.iter().map(|p| vec![p.x, p.y, p.z]).collect();
    let hull = ConvexHullWrapper::try_new(&coords, None).map_err(|err| {
        ColliderError::DegenerateHull {
            details: format!("quickhull failed: {err:?}"),
        }
    })?;
    let (verts, indices) = hull.vertices_indices();
    let verts: Vec<Point3<f64>> = verts
        .iter()
        .map(|v| match v.as_slice() {
            [x, y, z] => Ok(Point3::new(*x, *y, *z)),
            _ => Err(ColliderError::DegenerateHull {
                details: format!("hull vertex has {} coordinates", v.len()),
            }),
        })
        .collect::<Result<_, _>>()?;
    if indices.iter().any(|&i| i >= verts.len()) {
        return Err(ColliderError::DegenerateHull {
            details: "hull face references a missing vertex".to_string(),
        });
    }

    // Keep referenced vertices only, in their original order.
    let mut used = vec![false; verts.len()];
    for &i in &indices {
        used[i] = true;
    }
    let mut remap = vec![0u32; verts.len()];
    let mut mesh = IndexedMesh::with_capacity(verts.len(), indices.len() / 3);
    for (old, point) in verts.iter().enumerate().filter(|(i, _)| used[*i]) {
        remap[old] = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex::new(*point));
    }

    let Some(interior) = mesh.vertex_centroid() else {
        return Err(ColliderError::DegenerateHull {
            details: "quickhull returned no faces".to_string(),
        });
    };
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]];
        let (pa, pb, pc) = (verts[a], verts[b], verts[c]);
        let mut face = [remap[a], remap[b], remap[c]];
        if (pb - pa).cross(&(pc - pa)).dot(&(interior - pa)) > 0.0 {
            face.swap(1, 2);
        }
        mesh.faces.push(face);
    }

    debug!(
        input = points.len(),
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "convex hull built"
    );
    Ok(mesh)
}

fn check_spread(points: &[Point3<f64>], eps: f64) -> Result<(), ColliderError> {
    let degenerate = |details: &str| ColliderError::DegenerateHull {
        details: details.to_string(),
    };
    let farthest = |score: &dyn Fn(&Point3<f64>) -> f64| {
        points
            .iter()
            .map(|p| (*p, score(p)))
            .fold((Point3::origin(), f64::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 { cur } else { best }
            })
    };

    let (a, _) = farthest(&|p| -p.x);
    let (b, d1) = farthest(&|p| (p - a).norm());
    if d1 <= eps {
        return Err(degenerate("all points coincide"));
    }
    let dir = (b - a) / d1;
    let (c, d2) = farthest(&|p| (p - a).cross(&dir).norm());
    if d2 <= eps {
        return Err(degenerate("points are collinear"));
    }
    let normal = (b - a).cross(&(c - a)).normalize();
    let (_, d3) = farthest(&|p| normal.dot(&(p - a)).abs());
    if d3 <= eps {
        return Err(degenerate("points are coplanar"));
    }
    Ok(())
}

/// Generate a collider for `parent` and store it in the scene as a child
/// body named `"{parent}_collider"`.
///
/// Any collider previously attached to `parent` is replaced. The proxy
/// shares the parent's world transform, mass and passive flag.
///
/// # Errors
///
/// - [`StructureError::BodyNotFound`] if `parent` is not in the scene
/// - [`StructureError::Collider`] if generation fails
pub fn attach_collider(
    scene: &mut MemoryScene,
    parent: BodyId,
    params: &ColliderParams,
) -> StructureResult<BodyId> {
    let body = scene
        .body(parent)
        .ok_or(StructureError::BodyNotFound(parent.raw()))?;
    let mesh = generate_collider(&body.mesh, params)?;
    let name = format!("{}_collider", body.name);
    let (world, mass, passive) = (body.world, body.mass, body.passive);

    let stale: Vec<_> = scene
        .bodies()
        .iter()
        .filter(|b| b.is_collider && b.parent == Some(parent))
        .map(|b| b.id)
        .collect();
    for id in stale {
        scene.remove(id);
    }

    let id = scene.next_body_id();
    scene.insert(
        Body::new(id, name, mesh)
            .with_world(world)
            .with_mass(mass)
            .with_passive(passive)
            .as_collider_of(parent),
    );
    debug!(%parent, collider = %id, "collider attached");
    Ok(id)
}

/// Two collider proxies whose surfaces intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColliderOverlap {
    /// Lower-indexed proxy.
    pub first: BodyId,
    /// Higher-indexed proxy.
    pub second: BodyId,
    /// Body `first` was generated for.
    pub first_parent: Option<BodyId>,
    /// Body `second` was generated for.
    pub second_parent: Option<BodyId>,
}

impl ColliderOverlap {
    /// The proxies' parents, skipping proxies without one.
    pub fn parents(&self) -> impl Iterator<Item = BodyId> {
        self.first_parent.into_iter().chain(self.second_parent)
    }
}

/// Find active collider proxies among `ids` whose world-space surfaces
/// intersect.
///
/// Non-collider, passive and unknown ids are ignored. Every pair found is
/// logged as a warning with the parents' names, since overlapping proxies
/// push apart on simulation start.
pub fn collider_overlaps<S: Scene + ?Sized>(
    scene: &S,
    ids: &[BodyId],
    leaf_size: usize,
) -> Vec<ColliderOverlap> {
    let settings = StructureSettings::fast().with_bvh_leaf_size(leaf_size);
    let indices: Vec<_> = ids
        .iter()
        .filter_map(|&id| scene.body(id))
        .filter(|body| body.is_collider && !body.passive)
        .filter_map(|body| MeshSnapshot::capture(body, &settings))
        .filter_map(|snapshot| SpatialIndex::build(snapshot, settings.bvh_leaf_size))
        .collect();

    let parent = |id| scene.body(id).and_then(|b| b.parent);
    let overlaps: Vec<_> = detect_overlaps(&indices, &mut NullProgress)
        .into_iter()
        .map(|pair| ColliderOverlap {
            first: pair.first,
            second: pair.second,
            first_parent: parent(pair.first),
            second_parent: parent(pair.second),
        })
        .collect();

    let name = |id: BodyId| scene.body(id).map_or_else(|| id.to_string(), |b| b.name.clone());
    for overlap in &overlaps {
        warn!(
            first = %name(overlap.first_parent.unwrap_or(overlap.first)),
            second = %name(overlap.second_parent.unwrap_or(overlap.second)),
            "colliders overlap"
        );
    }
    overlaps
}

/// Distinct parents of every overlapping proxy, in first-seen order.
///
/// This is the set a host highlights so the user can move the offending
/// bodies apart.
#[must_use]
pub fn overlapping_parents(overlaps: &[ColliderOverlap]) -> Vec<BodyId> {
    let mut seen = HashSet::new();
    overlaps
        .iter()
        .flat_map(ColliderOverlap::parents)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Mass of a solid with the collider's volume and the given density.
#[must_use]
pub fn mass_from_volume(collider: &IndexedMesh, density: f64) -> f64 {
    collider.volume() * density
}

/// Set each parent's mass from its collider's world-space volume.
///
/// Returns the number of bodies updated. Parents without a collider keep
/// their mass.
pub fn assign_collider_masses(scene: &mut MemoryScene, density: f64) -> usize {
    let updates: Vec<_> = scene
        .bodies()
        .iter()
        .filter(|b| b.is_collider)
        .filter_map(|b| Some((b.parent?, mass_from_volume(&b.world_mesh(), density))))
        .collect();

    let mut updated = 0;
    for (parent, mass) in updates {
        if let Some(body) = scene.body_mut(parent) {
            body.mass = mass;
            updated += 1;
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::{MeshTopology, cuboid, unit_cube};

    fn grid_points() -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    points.push(Point3::new(f64::from(x), f64::from(y), f64::from(z)) * 0.5);
                }
            }
        }
        points
    }

    #[test]
    fn test_hull_of_grid_is_cube() {
        let hull = convex_hull(&grid_points()).unwrap();
        assert_relative_eq!(hull.signed_volume(), 1.0, epsilon = 1e-12);
        assert!(hull.faces.len() >= 12);
        for v in &hull.vertices {
            assert!(v.position.coords.iter().all(|c| *c == 0.0 || *c == 0.5 || *c == 1.0));
        }
    }

    #[test]
    fn test_hull_of_cube_matches_volume() {
        let hull = convex_hull(&unit_cube().vertices.iter().map(|v| v.position).collect::<Vec<_>>())
            .unwrap();
        assert_eq!(hull.vertices.len(), 8);
        assert_eq!(hull.faces.len(), 12);
        assert_relative_eq!(hull.signed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hull_rejects_flat_input() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert!(matches!(
            convex_hull(&points),
            Err(ColliderError::DegenerateHull { .. })
        ));
        assert!(matches!(
            convex_hull(&points[..3]),
            Err(ColliderError::EmptyMesh { .. })
        ));
    }

    #[test]
    fn test_principal_axis_picks_farthest_pair() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        assert_eq!(principal_axis(&points), Some((points[0], points[1])));
        assert_eq!(principal_axis(&points[..1]), None);
    }

    #[test]
    fn test_axis_scale_stretches_along_long_axis() {
        let bar = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
        let params = ColliderParams::default()
            .with_shape(ColliderShape::Mesh)
            .with_axis_scale(Vector3::new(1.0, 0.5, 0.5));
        let collider = generate_collider(&bar, &params).unwrap();

        assert_relative_eq!(collider.volume(), 1.0, epsilon = 1e-9);
        let bounds = Aabb::from_points(collider.vertices.iter().map(|v| &v.position));
        assert!(bounds.size().x > 3.5);
    }

    #[test]
    fn test_weld_merges_split_faces() {
        let mut mesh = unit_cube();
        let copy = mesh.clone();
        mesh.merge(&copy);
        let params = ColliderParams::default().with_shape(ColliderShape::Mesh);
        let collider = generate_collider(&mesh, &params).unwrap();
        assert_eq!(collider.vertices.len(), 8);
    }

    #[test]
    fn test_small_holes_are_capped_before_hull() {
        let mut open = unit_cube();
        open.faces.truncate(10);

        let params = ColliderParams::default().with_shape(ColliderShape::Mesh);
        let capped = generate_collider(&open, &params).unwrap();
        assert_eq!(capped.faces.len(), 12);
        assert_relative_eq!(capped.signed_volume(), 1.0, epsilon = 1e-12);

        let kept = generate_collider(&open, &params.with_fill_hole_sides(0)).unwrap();
        assert_eq!(kept.faces.len(), 10);
    }

    #[test]
    fn test_hull_faces_point_outward() {
        let mut points = grid_points();
        points.iter_mut().for_each(|p| *p = Point3::new(p.x * 4.0, p.y, p.z - 3.0));
        let hull = convex_hull(&points).unwrap();
        assert_relative_eq!(hull.signed_volume(), 4.0, epsilon = 1e-9);

        let center = Point3::new(2.0, 0.5, -2.5);
        for tri in hull.triangles() {
            let normal = (tri.v1 - tri.v0).cross(&(tri.v2 - tri.v0));
            if normal.norm() > 1e-12 {
                assert!(normal.dot(&(tri.v0 - center)) > 0.0);
            }
        }
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        assert!(matches!(
            generate_collider(&IndexedMesh::new(), &ColliderParams::default()),
            Err(ColliderError::EmptyMesh { .. })
        ));
    }

    #[test]
    fn test_attach_replaces_previous_collider() {
        let mut scene = MemoryScene::new();
        let parent = scene.add_body("brick", unit_cube());
        let first = attach_collider(&mut scene, parent, &ColliderParams::default()).unwrap();
        let second = attach_collider(&mut scene, parent, &ColliderParams::default()).unwrap();

        assert_ne!(first, second);
        assert!(scene.body(first).is_none());
        let collider = scene.body(second).unwrap();
        assert_eq!(collider.name, "brick_collider");
        assert_eq!(collider.parent, Some(parent));
        assert!(collider.is_collider);
        assert_eq!(scene.bodies().len(), 2);
    }

    #[test]
    fn test_attach_unknown_parent() {
        let mut scene = MemoryScene::new();
        assert_eq!(
            attach_collider(&mut scene, BodyId::new(5), &ColliderParams::default()),
            Err(StructureError::BodyNotFound(5))
        );
    }

    #[test]
    fn test_collider_overlaps_reports_touching_proxies() {
        let mut scene = MemoryScene::new();
        let a = scene.add_body("a", unit_cube());
        let b = scene.add_body("b", unit_cube());
        let c = scene.add_body("c", unit_cube());
        scene.translate(b, Vector3::new(0.5, 0.0, 0.0));
        scene.translate(c, Vector3::new(5.0, 0.0, 0.0));

        let params = ColliderParams::default();
        let ids: Vec<_> = [a, b, c]
            .into_iter()
            .map(|id| attach_collider(&mut scene, id, &params).unwrap())
            .collect();

        let mut all = ids.clone();
        all.push(a);
        let overlaps = collider_overlaps(&scene, &all, 4);
        assert_eq!(
            overlaps,
            vec![ColliderOverlap {
                first: ids[0],
                second: ids[1],
                first_parent: Some(a),
                second_parent: Some(b),
            }]
        );
        assert_eq!(overlapping_parents(&overlaps), vec![a, b]);
    }

    #[test]
    fn test_passive_proxies_are_not_checked() {
        let mut scene = MemoryScene::new();
        let floor = scene.add_body("floor", unit_cube());
        let a = scene.add_body("a", unit_cube());
        let b = scene.add_body("b", unit_cube());
        scene.translate(a, Vector3::new(0.5, 0.0, 0.0));
        scene.translate(b, Vector3::new(1.0, 0.0, 0.0));
        if let Some(body) = scene.body_mut(floor) {
            body.passive = true;
        }

        let params = ColliderParams::default();
        let ids: Vec<_> = [floor, a, b]
            .into_iter()
            .map(|id| attach_collider(&mut scene, id, &params).unwrap())
            .collect();
        assert!(scene.body(ids[0]).unwrap().passive);

        let overlaps = collider_overlaps(&scene, &ids, 4);
        assert_eq!(overlaps.len(), 1);
        assert_eq!((overlaps[0].first, overlaps[0].second), (ids[1], ids[2]));
        assert_eq!(overlapping_parents(&overlaps), vec![a, b]);
    }

    #[test]
    fn test_overlapping_parents_are_distinct() {
        let overlap = |first, second| ColliderOverlap {
            first: BodyId::new(first + 10),
            second: BodyId::new(second + 10),
            first_parent: Some(BodyId::new(first)),
            second_parent: Some(BodyId::new(second)),
        };
        let orphan = ColliderOverlap {
            first: BodyId::new(20),
            second: BodyId::new(21),
            first_parent: None,
            second_parent: Some(BodyId::new(2)),
        };
        let parents = overlapping_parents(&[overlap(0, 1), overlap(1, 2), orphan]);
        assert_eq!(parents, vec![BodyId::new(0), BodyId::new(1), BodyId::new(2)]);
    }

    #[test]
    fn test_masses_follow_collider_volume() {
        let mut scene = MemoryScene::new();
        let parent = scene.add_body("brick", unit_cube());
        let other = scene.add_body("loose", unit_cube());
        let params = ColliderParams::default().with_scale(Vector3::new(2.0, 2.0, 1.0));
        attach_collider(&mut scene, parent, &params).unwrap();

        assert_eq!(assign_collider_masses(&mut scene, 10.0), 1);
        assert_relative_eq!(scene.body(parent).unwrap().mass, 40.0, epsilon = 1e-9);
        assert_relative_eq!(scene.body(other).unwrap().mass, 1.0);
        assert_relative_eq!(mass_from_volume(&unit_cube(), 2.5), 2.5, epsilon = 1e-12);
    }
}
