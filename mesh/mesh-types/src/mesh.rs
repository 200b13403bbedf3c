//! Indexed triangle mesh.

use crate::{Aabb, MeshBounds, MeshTopology, Triangle, Vertex};
use nalgebra::{Matrix4, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this magnitude a signed volume is treated as zero when computing
/// volume-weighted centroids.
const VOLUME_EPSILON: f64 = 1e-15;

/// Unit normals with `1 - dot` below this are one direction.
const NORMAL_MERGE_EPSILON: f64 = 1e-9;

/// Minimum `|n1 · (n2 × n3)|` for three directions to make a corner.
const CORNER_SPAN_EPSILON: f64 = 1e-4;

/// Corners closer than this fraction of the bounds diagonal are one corner.
const CORNER_MERGE_EPSILON: f64 = 1e-9;

fn spans_three_directions(dirs: &[Vector3<f64>]) -> bool {
    dirs.iter().enumerate().any(|(i, a)| {
        dirs[i + 1..].iter().enumerate().any(|(j, b)| {
            let ab = a.cross(b);
            dirs[i + j + 2..]
                .iter()
                .any(|c| ab.dot(c).abs() > CORNER_SPAN_EPSILON)
        })
    })
}

/// Triangle soup over a shared vertex array.
///
/// Body meshes, snapshots, boolean results and collider proxies all use this
/// one type. Closed meshes are expected to wind CCW seen from outside; open
/// meshes are accepted everywhere but have no meaningful volume.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex, MeshTopology};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex positions.
    pub vertices: Vec<Vertex>,

    /// Corner indices into `vertices`.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Empty mesh with room for the given counts.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Mesh from prepared arrays. Indices are not checked.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Apply a homogeneous transform to every vertex in place.
    ///
    /// Mirroring transforms also reverse the winding, so a closed mesh keeps
    /// a positive signed volume.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            vertex.position = matrix.transform_point(&vertex.position);
        }
        if matrix.fixed_view::<3, 3>(0, 0).clone_owned().determinant() < 0.0 {
            for face in &mut self.faces {
                face.swap(1, 2);
            }
        }
    }

    /// Copy with [`transform`](Self::transform) applied.
    #[must_use]
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        let mut out = self.clone();
        out.transform(matrix);
        out
    }

    /// Shift every vertex by `offset`.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale per axis about `center`.
    pub fn scale_about(&mut self, center: &Point3<f64>, factors: &Vector3<f64>) {
        for vertex in &mut self.vertices {
            let d = vertex.position - center;
            vertex.position = center + d.component_mul(factors);
        }
    }

    /// Signed volume by the divergence theorem.
    ///
    /// Positive for closed meshes with outward (CCW) winding, negative for
    /// inside-out meshes. Meaningless for open meshes.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for tri in self.triangles() {
            let cross = tri.v1.coords.cross(&tri.v2.coords);
            volume += tri.v0.coords.dot(&cross);
        }
        volume / 6.0
    }

    /// Enclosed volume regardless of winding.
    #[inline]
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Negative signed volume.
    #[inline]
    #[must_use]
    pub fn is_inside_out(&self) -> bool {
        self.signed_volume() < 0.0
    }

    /// Mean of all vertex positions, or `None` for a mesh without vertices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn vertex_centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.position.coords);
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Mean of the mesh's corners.
    ///
    /// A corner is a vertex whose incident faces have three independent
    /// normal directions. Points that only split an edge or a planar region
    /// are left out, as are coincident copies of a corner, so a box cut into
    /// fragments still averages to the centre of its eight corners. Falls back
    /// to [`vertex_centroid`](Self::vertex_centroid) when no vertex is a
    /// corner.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{cuboid, Point3, Vertex};
    ///
    /// let mut slab = cuboid(Point3::origin(), Point3::new(4.0, 1.0, 2.0));
    /// // A stray point on the -X side pulls the plain mean but not the corners.
    /// slab.vertices.push(Vertex::from_coords(0.0, 0.5, 1.0));
    ///
    /// let c = slab.corner_centroid().unwrap_or_else(Point3::origin);
    /// assert!((c.x - 2.0).abs() < 1e-12);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn corner_centroid(&self) -> Option<Point3<f64>> {
        let mut directions: Vec<Vec<Vector3<f64>>> = vec![Vec::new(); self.vertices.len()];
        for &face in &self.faces {
            let Some(normal) = self.resolve(face).and_then(|t| t.normal()) else {
                continue;
            };
            for i in face {
                let seen = &mut directions[i as usize];
                if !seen.iter().any(|d| d.dot(&normal) > 1.0 - NORMAL_MERGE_EPSILON) {
                    seen.push(normal);
                }
            }
        }

        let tolerance = CORNER_MERGE_EPSILON * self.bounds().diagonal();
        let mut corners: Vec<Point3<f64>> = Vec::new();
        for (vertex, dirs) in self.vertices.iter().zip(&directions) {
            if spans_three_directions(dirs)
                && !corners.iter().any(|c| (c - vertex.position).norm() <= tolerance)
            {
                corners.push(vertex.position);
            }
        }

        if corners.is_empty() {
            return self.vertex_centroid();
        }
        let sum = corners.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / corners.len() as f64))
    }

    /// Center of mass of the enclosed solid, assuming uniform density.
    ///
    /// Sums signed tetrahedra against the vertex centroid, so the result is
    /// stable for meshes far from the origin. Returns `None` when the mesh
    /// has no vertices or encloses (numerically) zero volume.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{unit_cube, Point3};
    ///
    /// let c = unit_cube().volume_centroid().unwrap_or_else(Point3::origin);
    /// assert!((c.x - 0.5).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn volume_centroid(&self) -> Option<Point3<f64>> {
        let reference = self.vertex_centroid()?;
        let mut total = 0.0;
        let mut weighted = Vector3::zeros();

        for tri in self.triangles() {
            let a = tri.v0 - reference;
            let b = tri.v1 - reference;
            let c = tri.v2 - reference;
            let v = a.dot(&b.cross(&c)) / 6.0;
            total += v;
            weighted += (a + b + c) * (v / 4.0);
        }

        if total.abs() < VOLUME_EPSILON {
            return None;
        }
        Some(reference + weighted / total)
    }

    /// Check that every vertex coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.vertices.iter().all(Vertex::is_finite)
    }

    /// Append another mesh, offsetting its face indices.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32
    pub fn merge(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend(other.vertices.iter().copied());
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
    }

    fn resolve(&self, face: [u32; 3]) -> Option<Triangle> {
        Some(Triangle {
            v0: self.vertices.get(face[0] as usize)?.position,
            v1: self.vertices.get(face[1] as usize)?.position,
            v2: self.vertices.get(face[2] as usize)?.position,
        })
    }
}

impl MeshTopology for IndexedMesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn face(&self, index: usize) -> Option<[u32; 3]> {
        self.faces.get(index).copied()
    }

    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        self.faces
            .get(face_index)
            .and_then(|&face| self.resolve(face))
    }

    fn triangles(&self) -> impl Iterator<Item = Triangle> {
        self.faces.iter().filter_map(|&face| self.resolve(face))
    }
}

impl MeshBounds for IndexedMesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }
}

/// Axis-aligned box mesh between two corners, with outward winding.
///
/// # Example
///
/// ```
/// use mesh_types::{cuboid, Point3};
///
/// let slab = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 0.5));
/// assert!((slab.signed_volume() - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> IndexedMesh {
    let (lo, hi) = (min, max);
    let vertices = vec![
        Vertex::from_coords(lo.x, lo.y, lo.z), // 0
        Vertex::from_coords(hi.x, lo.y, lo.z), // 1
        Vertex::from_coords(hi.x, hi.y, lo.z), // 2
        Vertex::from_coords(lo.x, hi.y, lo.z), // 3
        Vertex::from_coords(lo.x, lo.y, hi.z), // 4
        Vertex::from_coords(hi.x, lo.y, hi.z), // 5
        Vertex::from_coords(hi.x, hi.y, hi.z), // 6
        Vertex::from_coords(lo.x, hi.y, hi.z), // 7
    ];

    // Two triangles per side, CCW when viewed from outside
    let faces = vec![
        [0, 2, 1], // -Z
        [0, 3, 2],
        [4, 5, 6], // +Z
        [4, 6, 7],
        [0, 1, 5], // -Y
        [0, 5, 4],
        [3, 7, 6], // +Y
        [3, 6, 2],
        [0, 4, 7], // -X
        [0, 7, 3],
        [1, 2, 6], // +X
        [1, 6, 5],
    ];

    IndexedMesh::from_parts(vertices, faces)
}

/// Unit cube spanning (0,0,0) to (1,1,1).
#[must_use]
pub fn unit_cube() -> IndexedMesh {
    cuboid(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
}
