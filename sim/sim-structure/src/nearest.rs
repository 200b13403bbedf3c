//! Closest point pairs between two sets of overlapping faces.

use crate::config::PointSource;
use hashbrown::HashSet;
use kiddo::{KdTree, SquaredEuclidean};
use mesh_types::{IndexedMesh, MeshTopology, Point3};
use nalgebra::UnitQuaternion;

/// Points are indexed in this fixed rotated frame so grids of coplanar or
/// axis-aligned points never share a coordinate on a split axis.
fn index_frame() -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(0.618_033_988_7, 0.414_213_562_3, 0.732_050_807_6)
}

/// Gather deduplicated points of the given faces.
///
/// Faces are visited in the order given; repeated positions keep their first
/// occurrence. Non-finite points are dropped.
#[must_use]
pub fn gather_points(
    mesh: &IndexedMesh,
    faces: impl IntoIterator<Item = u32>,
    source: PointSource,
) -> Vec<Point3<f64>> {
    let mut seen: HashSet<[u64; 3]> = HashSet::new();
    let mut points = Vec::new();
    let mut push = |p: Point3<f64>| {
        if !p.iter().all(|c| c.is_finite()) {
            return;
        }
        // `+ 0.0` folds -0.0 into 0.0 before hashing the bits.
        let key = [
            (p.x + 0.0).to_bits(),
            (p.y + 0.0).to_bits(),
            (p.z + 0.0).to_bits(),
        ];
        if seen.insert(key) {
            points.push(p);
        }
    };

    for face in faces {
        let Some(tri) = mesh.triangle(face as usize) else {
            continue;
        };
        if matches!(source, PointSource::Vertices | PointSource::Both) {
            for v in tri.vertices() {
                push(v);
            }
        }
        if matches!(source, PointSource::FaceCentroids | PointSource::Both) {
            push(tri.centroid());
        }
    }
    points
}

/// Anchor halfway between the closest points of two overlapping face sets.
///
/// Collects points of the faces named in `pairs` on each side, indexes the
/// second side in a k-d tree and finds the minimum distance `d` over every
/// first-side point. All point pairs within `d + tie_tolerance` are then
/// averaged, so symmetric contacts get a centred anchor instead of an
/// arbitrary corner.
///
/// Returns `None` when either side has no usable points.
///
/// # Example
///
/// ```
/// use sim_structure::{nearest::nearest_anchor, PointSource};
/// use mesh_types::{cuboid, Point3};
///
/// let a = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// let b = cuboid(Point3::new(1.5, 0.0, 0.0), Point3::new(2.5, 1.0, 1.0));
/// let all: Vec<(u32, u32)> = (0..12).flat_map(|i| (0..12).map(move |j| (i, j))).collect();
///
/// let anchor = nearest_anchor(&a, &b, &all, PointSource::Vertices, 1e-9).unwrap();
/// assert!((anchor.x - 1.25).abs() < 1e-12);
/// assert!((anchor.y - 0.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn nearest_anchor(
    mesh_a: &IndexedMesh,
    mesh_b: &IndexedMesh,
    pairs: &[(u32, u32)],
    source: PointSource,
    tie_tolerance: f64,
) -> Option<Point3<f64>> {
    let mut faces_a: Vec<u32> = pairs.iter().map(|&(a, _)| a).collect();
    let mut faces_b: Vec<u32> = pairs.iter().map(|&(_, b)| b).collect();
    faces_a.sort_unstable();
    faces_a.dedup();
    faces_b.sort_unstable();
    faces_b.dedup();

    let points_a = gather_points(mesh_a, faces_a, source);
    let points_b = gather_points(mesh_b, faces_b, source);
    if points_a.is_empty() || points_b.is_empty() {
        return None;
    }

    let frame = index_frame();
    let key = |p: &Point3<f64>| -> [f64; 3] {
        let r = frame * p;
        [r.x, r.y, r.z]
    };

    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, p) in points_b.iter().enumerate() {
        tree.add(&key(p), i as u64);
    }

    let queries: Vec<[f64; 3]> = points_a.iter().map(key).collect();
    let min_sq = queries
        .iter()
        .map(|q| tree.nearest_one::<SquaredEuclidean>(q).distance)
        .fold(f64::INFINITY, f64::min);
    if !min_sq.is_finite() {
        return None;
    }

    let radius = min_sq.sqrt() + tie_tolerance;
    let radius_sq = radius * radius;

    let mut ties: Vec<(usize, usize)> = Vec::new();
    for (ia, q) in queries.iter().enumerate() {
        for hit in tree.within::<SquaredEuclidean>(q, radius_sq) {
            ties.push((ia, hit.item as usize));
        }
    }
    if ties.is_empty() {
        return None;
    }
    ties.sort_unstable();

    let sum = ties.iter().fold(nalgebra::Vector3::zeros(), |acc, &(ia, ib)| {
        acc + nalgebra::center(&points_a[ia], &points_b[ib]).coords
    });
    Some(Point3::from(sum / ties.len() as f64))
}
