//! BVH-accelerated mesh intersection for closed triangle meshes.
//!
//! This crate provides the geometric machinery for measuring how two solids
//! overlap: face hierarchies with tree-vs-tree overlap queries, tolerant
//! triangle predicates, and an exact boolean intersection (A ∩ B) whose
//! result can be measured for volume and centroid.
//!
//! # Layer 0 Crate
//!
//! Pure geometry on top of `mesh-types`, usable from tools, services and
//! simulation front-ends alike.
//!
//! # Features
//!
//! - **BVH-accelerated** face pair detection (O(n log n + k))
//! - **Tolerant predicates** that report touching faces as overlapping
//! - **Coplanar-aware splitting** so shared faces produce closed results
//! - **Optional parallel** fragment classification via rayon
//!
//! # Quick Start
//!
//! ```
//! use mesh_boolean::intersection;
//! use mesh_types::{cuboid, Point3};
//!
//! let a = cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
//! let b = cuboid(Point3::new(0.9, 0.0, 0.0), Point3::new(1.9, 1.0, 1.0));
//!
//! let overlap = intersection(&a, &b)?;
//! assert!((overlap.signed_volume() - 0.1).abs() < 1e-9);
//! # Ok::<(), mesh_boolean::BooleanError>(())
//! ```
//!
//! # Presets
//!
//! | Preset | Use Case | Tolerances |
//! |--------|----------|------------|
//! | `default()` | General purpose | Balanced |
//! | `for_offset_surfaces()` | Margin-offset snapshots | Loose |
//! | `strict()` | Exact, axis-aligned geometry | Tight |

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
// Single-char names are standard in geometry code
#![allow(clippy::many_single_char_names)]
// Mesh indices are u32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_panics_doc)]

pub mod bvh;
pub mod classify;
pub mod clip;
pub mod config;
pub mod error;
pub mod holes;
pub mod intersect;
pub mod operation;
pub mod weld;

pub use bvh::{Bvh, BvhStats};
pub use config::BooleanConfig;
pub use error::{BooleanError, BooleanResult};
pub use holes::fill_small_holes;
pub use operation::{BooleanOperationResult, BooleanStats, intersection, intersection_with_config};
