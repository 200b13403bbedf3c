//! Rigid-body structure synthesis.
//!
//! Given a selection of rigid bodies, this crate finds every pair whose
//! surfaces touch or overlap and creates one constraint joint per pair,
//! anchored where the contact is.
//!
//! # Pipeline
//!
//! 1. **Snapshot**: each body's mesh is copied to world space, offset by the
//!    margin and optionally subdivided ([`MeshSnapshot`])
//! 2. **Index**: a BVH over the refined faces ([`SpatialIndex`])
//! 3. **Pair**: every `i < j` pair is tested for overlapping faces
//!    ([`OverlapDetector`])
//! 4. **Resolve**: overlapping pairs are reduced to an anchor and a volume
//!    ([`ContactResolver`])
//! 5. **Commit**: joints are stored in a [`JointRegistry`] under the chosen
//!    [`ExistingPolicy`]
//!
//! [`StructureSynthesizer`] drives the whole run and reports counts in a
//! [`SynthesisReport`].
//!
//! # Layer 0 Crate
//!
//! No host integration: the scene is reached through the [`Scene`] trait
//! and progress through [`ProgressSink`]. [`MemoryScene`] covers tools and
//! tests.
//!
//! # Quick Start
//!
//! ```
//! use sim_structure::{
//!     CancelToken, JointRegistry, JointSettings, MemoryScene, NullProgress,
//!     StructureSettings, StructureSynthesizer,
//! };
//! use mesh_types::{unit_cube, Vector3};
//!
//! let mut scene = MemoryScene::new();
//! let a = scene.add_body("a", unit_cube());
//! let b = scene.add_body("b", unit_cube());
//! scene.translate(b, Vector3::new(0.9, 0.0, 0.0));
//! scene.select_all();
//!
//! let synth = StructureSynthesizer::new(StructureSettings::precise(), JointSettings::default());
//! let mut registry = JointRegistry::new();
//! let report = synth.run(&scene, &mut registry, &mut NullProgress, &CancelToken::new())?;
//!
//! assert_eq!(report.created, 1);
//! let joint = registry.iter().next().map(|j| (j.body_a, j.body_b, j.anchor.x));
//! assert!(matches!(joint, Some((x, y, ax)) if x == a && y == b && (ax - 0.95).abs() < 1e-9));
//! # Ok::<(), sim_structure::StructureError>(())
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
// Mesh indices are u32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::too_many_lines)]
// A zero margin means "no offset" and is compared exactly
#![allow(clippy::float_cmp)]

pub mod body;
pub mod collider;
pub mod config;
pub mod contact;
pub mod error;
pub mod index;
pub mod joint;
pub mod modify;
pub mod nearest;
pub mod overlap;
pub mod progress;
pub mod registry;
pub mod scene;
pub mod snapshot;
pub mod synth;
pub mod wireframe;

pub use body::{Body, BodyId};
pub use collider::{
    ColliderOverlap, assign_collider_masses, attach_collider, collider_overlaps, convex_hull,
    generate_collider, mass_from_volume, overlapping_parents, principal_axis,
};
pub use config::{
    ColliderParams, ColliderShape, ContactMode, ExactAnchor, ExistingPolicy, JointSettings,
    MAX_SUBDIVISION, PointSource, StructureSettings,
};
pub use contact::{BooleanEngine, ContactOutcome, ContactResolver, ExactBoolean, SkipReason};
pub use error::{ColliderError, StructureError, StructureResult};
pub use index::{CONTACT_TOLERANCE, PARALLEL_BUILD_FACES, SpatialIndex};
pub use joint::{ConstraintKind, ConstraintParams, Joint, JointId, JointLimits};
pub use modify::modify_joints;
pub use overlap::{OverlapDetector, OverlapPair, detect_overlaps};
pub use progress::{FnProgress, NullProgress, ProgressSink, TracingProgress};
pub use registry::JointRegistry;
pub use scene::{MemoryScene, Scene};
pub use snapshot::MeshSnapshot;
pub use synth::{CancelToken, Phase, StructureSynthesizer, SynthesisReport};
pub use wireframe::{mesh_edges, split_into_edges};
