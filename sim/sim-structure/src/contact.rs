//! Reducing a pair's overlap to a single anchor point.
//!
//! Three strategies are available through [`ContactMode`]:
//!
//! | Mode | Anchor | Volume |
//! |------|--------|--------|
//! | `Nearest` | Midpoint of the closest point pair(s) | margin proxy |
//! | `OriginMidpoint` | Midpoint of the body origins | margin proxy |
//! | `ExactVolume` | Corner centroid of `A ∩ B` | `vol(A ∩ B)` |
//!
//! Failures are values, not errors: every call yields a [`ContactOutcome`]
//! so a run can count and continue.

use crate::config::{ContactMode, ExactAnchor, StructureSettings};
use crate::index::SpatialIndex;
use crate::nearest::nearest_anchor;
use mesh_boolean::{BooleanConfig, BooleanError, intersection_with_config};
use mesh_types::{IndexedMesh, MeshTopology, Point3};

/// Why a pair produced no joint despite overlapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The boolean engine failed on this pair.
    EngineError(String),
    /// The computed anchor was NaN or infinite.
    NonFiniteAnchor,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineError(msg) => write!(f, "boolean engine error: {msg}"),
            Self::NonFiniteAnchor => f.write_str("non-finite anchor"),
        }
    }
}

/// Result of resolving one overlapping pair.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactOutcome {
    /// A joint should be created at `anchor`.
    Contact {
        /// World-space anchor, always finite.
        anchor: Point3<f64>,
        /// Overlap volume, or the margin proxy in approximate modes.
        volume: f64,
    },
    /// Broad-phase overlap that turned out empty.
    NoContact,
    /// Exact volume below the configured minimum.
    BelowThreshold {
        /// The measured volume.
        volume: f64,
    },
    /// The pair could not be resolved.
    Skipped(SkipReason),
}

impl ContactOutcome {
    /// Whether this outcome produces a joint.
    #[must_use]
    pub fn is_contact(&self) -> bool {
        matches!(self, Self::Contact { .. })
    }

    fn contact(anchor: Point3<f64>, volume: f64) -> Self {
        if anchor.iter().all(|c| c.is_finite()) {
            Self::Contact { anchor, volume }
        } else {
            Self::Skipped(SkipReason::NonFiniteAnchor)
        }
    }
}

/// Boolean intersection backend used by exact-volume mode.
pub trait BooleanEngine: Send + Sync {
    /// Compute `a ∩ b` as a closed, outward-wound mesh.
    ///
    /// # Errors
    ///
    /// Returns a [`BooleanError`] if the inputs cannot be intersected.
    fn intersect(&self, a: &IndexedMesh, b: &IndexedMesh) -> Result<IndexedMesh, BooleanError>;
}

/// Engine backed by [`mesh_boolean`].
#[derive(Debug, Clone, Default)]
pub struct ExactBoolean {
    config: BooleanConfig,
}

impl ExactBoolean {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: BooleanConfig) -> Self {
        Self { config }
    }

    /// Engine for a run: offset-surface tolerances when a margin is set.
    #[must_use]
    pub fn for_settings(settings: &StructureSettings) -> Self {
        let config = if settings.margin == 0.0 {
            BooleanConfig::default()
        } else {
            BooleanConfig::for_offset_surfaces()
        };
        Self::new(config.with_bvh_leaf_size(settings.bvh_leaf_size))
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &BooleanConfig {
        &self.config
    }
}

impl BooleanEngine for ExactBoolean {
    fn intersect(&self, a: &IndexedMesh, b: &IndexedMesh) -> Result<IndexedMesh, BooleanError> {
        intersection_with_config(a, b, &self.config).map(|result| result.mesh)
    }
}

/// Resolves overlapping pairs according to the run settings.
pub struct ContactResolver<'a, E: BooleanEngine + ?Sized> {
    settings: &'a StructureSettings,
    engine: &'a E,
}

impl<'a, E: BooleanEngine + ?Sized> ContactResolver<'a, E> {
    /// Create a resolver.
    #[must_use]
    pub fn new(settings: &'a StructureSettings, engine: &'a E) -> Self {
        Self { settings, engine }
    }

    /// Resolve the overlap between `a` and `b`.
    ///
    /// `pairs` are face pairs from `a.overlap(b)`; they are only used by
    /// nearest-point mode.
    ///
    /// # Example
    ///
    /// ```
    /// use sim_structure::{
    ///     Body, BodyId, ContactOutcome, ContactResolver, ExactBoolean, MeshSnapshot,
    ///     SpatialIndex, StructureSettings,
    /// };
    /// use mesh_types::{unit_cube, Vector3};
    ///
    /// let settings = StructureSettings::precise();
    /// let index = |id, x| {
    ///     let body = Body::new(BodyId::new(id), "cube", unit_cube())
    ///         .with_translation(Vector3::new(x, 0.0, 0.0));
    ///     SpatialIndex::build(MeshSnapshot::capture(&body, &settings).unwrap(), 4).unwrap()
    /// };
    /// let (a, b) = (index(0, 0.0), index(1, 0.5));
    ///
    /// let engine = ExactBoolean::default();
    /// let resolver = ContactResolver::new(&settings, &engine);
    /// match resolver.resolve(&a, &b, &a.overlap(&b)) {
    ///     ContactOutcome::Contact { volume, anchor } => {
    ///         assert!((volume - 0.5).abs() < 1e-9);
    ///         assert!((anchor.x - 0.75).abs() < 1e-9);
    ///     }
    ///     other => panic!("unexpected {other:?}"),
    /// }
    /// ```
    #[must_use]
    pub fn resolve(&self, a: &SpatialIndex, b: &SpatialIndex, pairs: &[(u32, u32)]) -> ContactOutcome {
        match self.settings.contact_mode {
            ContactMode::Nearest(source) => {
                match nearest_anchor(a.mesh(), b.mesh(), pairs, source, self.settings.tie_tolerance) {
                    Some(anchor) => ContactOutcome::contact(anchor, self.settings.volume_proxy()),
                    None => ContactOutcome::NoContact,
                }
            }
            ContactMode::OriginMidpoint => ContactOutcome::contact(
                nalgebra::center(&a.snapshot().origin, &b.snapshot().origin),
                self.settings.volume_proxy(),
            ),
            ContactMode::ExactVolume => self.resolve_exact(a, b),
        }
    }

    fn resolve_exact(&self, a: &SpatialIndex, b: &SpatialIndex) -> ContactOutcome {
        let overlap = match self.engine.intersect(&a.snapshot().solid, &b.snapshot().world) {
            Ok(mesh) => mesh,
            Err(err) => return ContactOutcome::Skipped(SkipReason::EngineError(err.to_string())),
        };
        if overlap.vertex_count() == 0 || overlap.face_count() == 0 {
            return ContactOutcome::NoContact;
        }

        let volume = overlap.signed_volume().max(0.0);
        if volume == 0.0 || volume < self.settings.min_overlap_volume {
            return ContactOutcome::BelowThreshold { volume };
        }

        let anchor = match self.settings.exact_anchor {
            ExactAnchor::VolumeCentroid => overlap
                .volume_centroid()
                .or_else(|| overlap.vertex_centroid()),
            ExactAnchor::VertexCentroid => overlap.corner_centroid(),
        };
        match anchor {
            Some(anchor) => ContactOutcome::contact(anchor, volume),
            None => ContactOutcome::NoContact,
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyId};
    use crate::config::PointSource;
    use crate::snapshot::MeshSnapshot;
    use approx::assert_relative_eq;
    use mesh_types::{Vector3, cuboid, unit_cube};

    struct FailingEngine;

    impl BooleanEngine for FailingEngine {
        fn intersect(&self, _: &IndexedMesh, _: &IndexedMesh) -> Result<IndexedMesh, BooleanError> {
            Err(BooleanError::NumericalError {
                details: "forced".to_string(),
            })
        }
    }

    struct EmptyEngine;

    impl BooleanEngine for EmptyEngine {
        fn intersect(&self, _: &IndexedMesh, _: &IndexedMesh) -> Result<IndexedMesh, BooleanError> {
            Ok(IndexedMesh::new())
        }
    }

    fn cube_index(id: u64, offset: Vector3<f64>, settings: &StructureSettings) -> SpatialIndex {
        let body = Body::new(BodyId::new(id), "cube", unit_cube()).with_translation(offset);
        SpatialIndex::build(MeshSnapshot::capture(&body, settings).unwrap(), 4).unwrap()
    }

    fn resolve_with<E: BooleanEngine>(settings: &StructureSettings, engine: &E, dx: f64) -> ContactOutcome {
        let a = cube_index(0, Vector3::zeros(), settings);
        let b = cube_index(1, Vector3::new(dx, 0.0, 0.0), settings);
        let pairs = a.overlap(&b);
        ContactResolver::new(settings, engine).resolve(&a, &b, &pairs)
    }

    #[test]
    fn test_nearest_vertices_anchor() {
        let settings = StructureSettings::default()
            .with_subdivision(0)
            .with_contact_mode(ContactMode::Nearest(PointSource::Vertices));
        let outcome = resolve_with(&settings, &ExactBoolean::default(), 0.9);
        let ContactOutcome::Contact { anchor, volume } = outcome else {
            panic!("expected contact, got {outcome:?}");
        };
        assert_relative_eq!(anchor.x, 0.95, epsilon = 1e-12);
        assert_relative_eq!(anchor.y, 0.5, epsilon = 1e-12);
        assert_relative_eq!(anchor.z, 0.5, epsilon = 1e-12);
        assert_relative_eq!(volume, 1.0);
    }

    #[test]
    fn test_origin_midpoint() {
        let settings = StructureSettings::fast().with_margin(0.05);
        let outcome = resolve_with(&settings, &ExactBoolean::default(), 0.8);
        let ContactOutcome::Contact { anchor, volume } = outcome else {
            panic!("expected contact, got {outcome:?}");
        };
        assert_relative_eq!(anchor, Point3::new(0.4, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(volume, 0.05);
    }

    #[test]
    fn test_exact_volume_and_centroid() {
        let settings = StructureSettings::precise();
        let outcome = resolve_with(&settings, &ExactBoolean::default(), 0.9);
        let ContactOutcome::Contact { anchor, volume } = outcome else {
            panic!("expected contact, got {outcome:?}");
        };
        assert_relative_eq!(volume, 0.1, epsilon = 1e-9);
        assert_relative_eq!(anchor, Point3::new(0.95, 0.5, 0.5), epsilon = 1e-9);
    }

    #[test]
    fn test_exact_vertex_centroid_of_uneven_box() {
        let settings = StructureSettings::precise();
        let a = cube_index(0, Vector3::zeros(), &settings);
        let slab = Body::new(
            BodyId::new(1),
            "slab",
            cuboid(Point3::new(0.9, 0.2, 0.3), Point3::new(1.9, 0.9, 0.8)),
        );
        let b = SpatialIndex::build(MeshSnapshot::capture(&slab, &settings).unwrap(), 4).unwrap();
        let pairs = a.overlap(&b);
        let expected = Point3::new(0.95, 0.55, 0.55);

        for anchor_kind in [ExactAnchor::VertexCentroid, ExactAnchor::VolumeCentroid] {
            let settings = settings.clone().with_exact_anchor(anchor_kind);
            let engine = ExactBoolean::for_settings(&settings);
            let outcome = ContactResolver::new(&settings, &engine).resolve(&a, &b, &pairs);
            let ContactOutcome::Contact { anchor, volume } = outcome else {
                panic!("expected contact, got {outcome:?}");
            };
            assert_relative_eq!(volume, 0.1 * 0.7 * 0.5, epsilon = 1e-9);
            assert_relative_eq!(anchor, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_exact_below_threshold() {
        let settings = StructureSettings::precise().with_min_overlap_volume(0.2);
        let outcome = resolve_with(&settings, &ExactBoolean::default(), 0.9);
        match outcome {
            ContactOutcome::BelowThreshold { volume } => assert_relative_eq!(volume, 0.1, epsilon = 1e-9),
            other => panic!("expected below threshold, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_touching_is_zero_volume() {
        let settings = StructureSettings::precise();
        let outcome = resolve_with(&settings, &ExactBoolean::default(), 1.0);
        assert!(
            matches!(outcome, ContactOutcome::NoContact | ContactOutcome::BelowThreshold { .. }),
            "got {outcome:?}"
        );
    }

    #[test]
    fn test_engine_follows_margin() {
        let plain = ExactBoolean::for_settings(&StructureSettings::precise());
        let offset = ExactBoolean::for_settings(&StructureSettings::precise().with_margin(0.01));
        assert_eq!(plain.config().coplanar_tolerance, BooleanConfig::default().coplanar_tolerance);
        assert!(offset.config().coplanar_tolerance > plain.config().coplanar_tolerance);
        assert_eq!(offset.config().bvh_leaf_size, 4);
    }

    #[test]
    fn test_engine_error_is_skip() {
        let settings = StructureSettings::precise();
        let outcome = resolve_with(&settings, &FailingEngine, 0.5);
        match outcome {
            ContactOutcome::Skipped(SkipReason::EngineError(msg)) => assert!(msg.contains("forced")),
            other => panic!("expected engine skip, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_intersection_is_no_contact() {
        let settings = StructureSettings::precise();
        assert_eq!(resolve_with(&settings, &EmptyEngine, 0.5), ContactOutcome::NoContact);
    }

    #[test]
    fn test_non_finite_anchor_is_skipped() {
        let outcome = ContactOutcome::contact(Point3::new(f64::NAN, 0.0, 0.0), 1.0);
        assert_eq!(outcome, ContactOutcome::Skipped(SkipReason::NonFiniteAnchor));
        assert!(!outcome.is_contact());
    }
}
