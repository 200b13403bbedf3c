//! Mesh primitives for overlap detection and structure synthesis.
//!
//! - [`IndexedMesh`] - triangles over a shared vertex array, with transform,
//!   volume and centroid helpers
//! - [`Triangle`] - one face with resolved corners
//! - [`Aabb`] - axis-aligned box used by the BVH
//! - [`cuboid`] / [`unit_cube`] - closed box meshes
//!
//! # Layer 0 Crate
//!
//! Depends on nalgebra only. `mesh-boolean` and `sim-structure` build on it.
//!
//! # Conventions
//!
//! Coordinates are unit-free `f64`. Closed meshes wind CCW seen from outside,
//! which makes [`IndexedMesh::signed_volume`] positive.
//!
//! # Example
//!
//! ```
//! use mesh_types::{cuboid, MeshBounds, MeshTopology, Point3};
//!
//! let slab = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 0.5));
//!
//! assert_eq!(slab.face_count(), 12);
//! assert!((slab.signed_volume() - 1.0).abs() < 1e-12);
//! assert_eq!(slab.bounds().max, Point3::new(2.0, 1.0, 0.5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod traits;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use mesh::{IndexedMesh, cuboid, unit_cube};
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::Triangle;
pub use vertex::Vertex;

pub use nalgebra::{Matrix4, Point3, Vector3};
