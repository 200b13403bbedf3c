//! Fragment classification for boolean operations.
//!
//! Determines where a face fragment lies relative to another closed mesh:
//! inside, outside, or on its surface (with matching or opposing normal).

use crate::bvh::Bvh;
use crate::intersect::{closest_point_on_triangle, ray_triangle_intersect};
use mesh_types::{Aabb, IndexedMesh, MeshTopology, Point3, Vector3};

/// Normals whose dot product exceeds this are treated as parallel.
const PARALLEL_COS: f64 = 1.0 - 1e-6;

/// Ray directions for parity voting. Deliberately off-axis so rays do not
/// run along the edges and faces of axis-aligned geometry.
const RAY_DIRECTIONS: [[f64; 3]; 3] = [
    [0.801_7, 0.334_6, 0.495_2],
    [-0.287_4, 0.884_1, 0.368_5],
    [0.441_7, -0.552_9, -0.706_7],
];

/// Location of a fragment relative to another mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentLocation {
    /// Strictly inside the other mesh.
    Inside,
    /// Strictly outside the other mesh.
    Outside,
    /// On the other mesh's surface, facing the same way.
    CoplanarSame,
    /// On the other mesh's surface, facing the opposite way.
    CoplanarOpposite,
}

/// Test if a point is inside a closed mesh by ray-parity majority vote.
///
/// Casts three skewed rays and counts crossings with `mesh`'s faces; a
/// point is inside when at least two rays report an odd count. The BVH
/// must have been built over `mesh`.
///
/// # Example
///
/// ```
/// use mesh_types::{unit_cube, Point3};
/// use mesh_boolean::bvh::Bvh;
/// use mesh_boolean::classify::point_in_mesh_robust;
///
/// let cube = unit_cube();
/// let bvh = Bvh::build(&cube, 4);
/// assert!(point_in_mesh_robust(&Point3::new(0.5, 0.5, 0.5), &cube, &bvh, 1e-12));
/// assert!(!point_in_mesh_robust(&Point3::new(1.5, 0.5, 0.5), &cube, &bvh, 1e-12));
/// ```
#[must_use]
pub fn point_in_mesh_robust(
    point: &Point3<f64>,
    mesh: &IndexedMesh,
    bvh: &Bvh,
    epsilon: f64,
) -> bool {
    let Some(bounds) = bvh.root_bbox() else {
        return false;
    };
    if !bounds.contains(point) {
        return false;
    }

    let inside_votes = RAY_DIRECTIONS
        .iter()
        .filter(|d| {
            let dir = Vector3::new(d[0], d[1], d[2]);
            count_ray_crossings(point, &dir, mesh, bvh, bounds, epsilon) % 2 == 1
        })
        .count();

    inside_votes >= 2
}

/// Count ray crossings using the BVH to gather candidate faces.
fn count_ray_crossings(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    mesh: &IndexedMesh,
    bvh: &Bvh,
    bounds: &Aabb,
    epsilon: f64,
) -> usize {
    // Long enough to leave the mesh bounds from anywhere inside them
    let reach = bounds.diagonal() + 1.0;
    let ray_end = origin + direction.normalize() * reach;
    let ray_bbox = Aabb::new(*origin, ray_end);

    bvh.query(&ray_bbox, epsilon)
        .into_iter()
        .filter_map(|f| mesh.triangle(f as usize))
        .filter(|tri| ray_triangle_intersect(origin, direction, tri, epsilon).is_some())
        .count()
}

/// Classify a fragment of another mesh against `mesh`.
///
/// # Arguments
///
/// * `centroid` - An interior point of the fragment
/// * `normal` - Unit normal of the fragment
/// * `mesh`, `bvh` - The mesh to classify against and its hierarchy
/// * `surface_tolerance` - Distance under which the centroid counts as on
///   `mesh`'s surface
/// * `ray_epsilon` - Tolerance for the ray casts
#[must_use]
pub fn classify_fragment(
    centroid: &Point3<f64>,
    normal: &Vector3<f64>,
    mesh: &IndexedMesh,
    bvh: &Bvh,
    surface_tolerance: f64,
    ray_epsilon: f64,
) -> FragmentLocation {
    let tol_sq = surface_tolerance * surface_tolerance;

    for face in bvh.query_point(centroid, surface_tolerance) {
        let Some(tri) = mesh.triangle(face as usize) else {
            continue;
        };
        let Some(face_normal) = tri.normal() else {
            continue;
        };
        let cos = face_normal.dot(normal);
        if cos.abs() < PARALLEL_COS {
            continue;
        }
        if (closest_point_on_triangle(centroid, &tri) - centroid).norm_squared() <= tol_sq {
            return if cos > 0.0 {
                FragmentLocation::CoplanarSame
            } else {
                FragmentLocation::CoplanarOpposite
            };
        }
    }

    if point_in_mesh_robust(centroid, mesh, bvh, ray_epsilon) {
        FragmentLocation::Inside
    } else {
        FragmentLocation::Outside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::{cuboid, unit_cube};

    fn cube_with_bvh() -> (IndexedMesh, Bvh) {
        let cube = unit_cube();
        let bvh = Bvh::build(&cube, 2);
        (cube, bvh)
    }

    #[test]
    fn test_point_in_mesh() {
        let (cube, bvh) = cube_with_bvh();
        assert!(point_in_mesh_robust(&Point3::new(0.1, 0.9, 0.5), &cube, &bvh, 1e-12));
        assert!(!point_in_mesh_robust(&Point3::new(-0.1, 0.5, 0.5), &cube, &bvh, 1e-12));
    }

    #[test]
    fn test_point_at_center_of_offset_box() {
        let slab = cuboid(Point3::new(100.0, 0.0, 0.0), Point3::new(101.0, 0.01, 5.0));
        let bvh = Bvh::build(&slab, 4);
        assert!(point_in_mesh_robust(&Point3::new(100.5, 0.005, 2.5), &slab, &bvh, 1e-12));
    }

    #[test]
    fn test_empty_mesh_contains_nothing() {
        let mesh = IndexedMesh::new();
        let bvh = Bvh::build(&mesh, 4);
        assert!(!point_in_mesh_robust(&Point3::origin(), &mesh, &bvh, 1e-12));
    }

    #[test]
    fn test_classify_surface_fragments() {
        let (cube, bvh) = cube_with_bvh();
        let on_top = Point3::new(0.3, 0.4, 1.0);

        let same = classify_fragment(&on_top, &Vector3::z(), &cube, &bvh, 1e-7, 1e-12);
        assert_eq!(same, FragmentLocation::CoplanarSame);

        let opposite = classify_fragment(&on_top, &-Vector3::z(), &cube, &bvh, 1e-7, 1e-12);
        assert_eq!(opposite, FragmentLocation::CoplanarOpposite);
    }

    #[test]
    fn test_classify_volume_fragments() {
        let (cube, bvh) = cube_with_bvh();
        let inside = classify_fragment(
            &Point3::new(0.5, 0.5, 0.5),
            &Vector3::z(),
            &cube,
            &bvh,
            1e-7,
            1e-12,
        );
        assert_eq!(inside, FragmentLocation::Inside);

        // Perpendicular to the surface it touches: decided by ray casting
        let outside = classify_fragment(
            &Point3::new(1.5, 0.5, 0.5),
            &Vector3::z(),
            &cube,
            &bvh,
            1e-7,
            1e-12,
        );
        assert_eq!(outside, FragmentLocation::Outside);
    }
}
