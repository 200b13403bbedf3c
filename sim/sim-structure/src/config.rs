//! Settings and presets for structure synthesis.
//!
//! All behaviour is passed explicitly through these structs; nothing is read
//! from global state.
//!
//! # Presets
//!
//! - [`StructureSettings::default()`] - Nearest-point anchors over subdivided meshes
//! - [`StructureSettings::fast()`] - Origin midpoints, no subdivision
//! - [`StructureSettings::precise()`] - Exact boolean volume and centroid
//!
//! # Example
//!
//! ```
//! use sim_structure::{ContactMode, ExistingPolicy, StructureSettings};
//!
//! let settings = StructureSettings::precise()
//!     .with_margin(-0.01)
//!     .with_existing_policy(ExistingPolicy::NewOnly)
//!     .with_min_overlap_volume(1e-6);
//!
//! assert_eq!(settings.contact_mode, ContactMode::ExactVolume);
//! assert!(settings.validate().is_ok());
//! ```

use crate::error::{ColliderError, StructureError, StructureResult};
use crate::joint::ConstraintKind;
use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest subdivision level accepted by validation.
pub const MAX_SUBDIVISION: u32 = 12;

/// Which points nearest-point mode gathers from overlapping faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PointSource {
    /// Face corner vertices only.
    Vertices,
    /// Face centroids only.
    FaceCentroids,
    /// Vertices and face centroids.
    #[default]
    Both,
}

/// How a contact region is reduced to an anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContactMode {
    /// Midpoint of the closest point pair between the overlapping faces.
    Nearest(PointSource),
    /// Midpoint of the two body origins.
    OriginMidpoint,
    /// Boolean intersection volume and its centroid.
    ExactVolume,
}

impl Default for ContactMode {
    fn default() -> Self {
        Self::Nearest(PointSource::default())
    }
}

impl ContactMode {
    /// Whether this mode measures an actual overlap volume.
    #[must_use]
    pub const fn measures_volume(self) -> bool {
        matches!(self, Self::ExactVolume)
    }
}

/// Anchor placement for exact-volume contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExactAnchor {
    /// Mean of the intersection solid's corners.
    #[default]
    VertexCentroid,
    /// Center of mass of the intersection solid.
    VolumeCentroid,
}

/// What to do with joints that already connect a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExistingPolicy {
    /// Remove existing joints between selected bodies, then recreate.
    #[default]
    Overwrite,
    /// Keep existing joints and skip their pairs.
    NewOnly,
    /// Always create; duplicates are allowed.
    NoCheck,
}

/// Settings for a structure synthesis run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StructureSettings {
    /// Signed offset applied to every snapshot (negative shrinks).
    pub margin: f64,

    /// Midpoint subdivision levels; each edge becomes `2^n` segments.
    pub subdivision: u32,

    /// Contact resolution strategy.
    pub contact_mode: ContactMode,

    /// Anchor placement in exact-volume mode.
    pub exact_anchor: ExactAnchor,

    /// Existing-joint policy.
    pub existing_policy: ExistingPolicy,

    /// Exact-volume contacts below this volume are skipped.
    pub min_overlap_volume: f64,

    /// Resolve pairs on the rayon pool before committing in order.
    pub parallel: bool,

    /// Maximum faces per BVH leaf.
    pub bvh_leaf_size: usize,

    /// Upper bound on faces in a refined snapshot; subdivision is reduced to
    /// stay below it.
    pub max_snapshot_faces: usize,

    /// Point pairs within this distance of the closest pair are averaged.
    pub tie_tolerance: f64,
}

impl Default for StructureSettings {
    fn default() -> Self {
        Self {
            margin: 0.0,
            subdivision: 4,
            contact_mode: ContactMode::default(),
            exact_anchor: ExactAnchor::default(),
            existing_policy: ExistingPolicy::default(),
            min_overlap_volume: 0.0,
            parallel: false,
            bvh_leaf_size: 4,
            max_snapshot_faces: 1_000_000,
            tie_tolerance: 1e-9,
        }
    }
}

impl StructureSettings {
    /// Origin-midpoint anchors without subdivision.
    ///
    /// # Example
    ///
    /// ```
    /// use sim_structure::{ContactMode, StructureSettings};
    ///
    /// let settings = StructureSettings::fast();
    /// assert_eq!(settings.contact_mode, ContactMode::OriginMidpoint);
    /// assert_eq!(settings.subdivision, 0);
    /// ```
    #[must_use]
    pub fn fast() -> Self {
        Self {
            subdivision: 0,
            contact_mode: ContactMode::OriginMidpoint,
            ..Default::default()
        }
    }

    /// Exact boolean volume with volume-centroid anchors.
    #[must_use]
    pub fn precise() -> Self {
        Self {
            subdivision: 0,
            contact_mode: ContactMode::ExactVolume,
            ..Default::default()
        }
    }

    /// Set the margin.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Set the subdivision level.
    #[must_use]
    pub fn with_subdivision(mut self, levels: u32) -> Self {
        self.subdivision = levels;
        self
    }

    /// Set the contact mode.
    #[must_use]
    pub fn with_contact_mode(mut self, mode: ContactMode) -> Self {
        self.contact_mode = mode;
        self
    }

    /// Set the exact-mode anchor placement.
    #[must_use]
    pub fn with_exact_anchor(mut self, anchor: ExactAnchor) -> Self {
        self.exact_anchor = anchor;
        self
    }

    /// Set the existing-joint policy.
    #[must_use]
    pub fn with_existing_policy(mut self, policy: ExistingPolicy) -> Self {
        self.existing_policy = policy;
        self
    }

    /// Set the minimum exact-mode overlap volume.
    #[must_use]
    pub fn with_min_overlap_volume(mut self, volume: f64) -> Self {
        self.min_overlap_volume = volume;
        self
    }

    /// Enable or disable the parallel pair stage.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the BVH leaf size (minimum 1).
    #[must_use]
    pub fn with_bvh_leaf_size(mut self, size: usize) -> Self {
        self.bvh_leaf_size = size.max(1);
        self
    }

    /// Set the refined snapshot face limit.
    #[must_use]
    pub fn with_max_snapshot_faces(mut self, limit: usize) -> Self {
        self.max_snapshot_faces = limit;
        self
    }

    /// Volume handed to consumers in approximate modes.
    ///
    /// `|margin|`, or `1.0` when there is no margin.
    #[must_use]
    pub fn volume_proxy(&self) -> f64 {
        if self.margin == 0.0 {
            1.0
        } else {
            self.margin.abs()
        }
    }

    /// Check every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::InvalidSettings`] naming the first bad field.
    pub fn validate(&self) -> StructureResult<()> {
        if !self.margin.is_finite() {
            return Err(StructureError::invalid_settings(format!(
                "margin must be finite, got {}",
                self.margin
            )));
        }
        if self.subdivision > MAX_SUBDIVISION {
            return Err(StructureError::invalid_settings(format!(
                "subdivision {} exceeds maximum {MAX_SUBDIVISION}",
                self.subdivision
            )));
        }
        non_negative("min_overlap_volume", self.min_overlap_volume)?;
        non_negative("tie_tolerance", self.tie_tolerance)?;
        if self.bvh_leaf_size == 0 {
            return Err(StructureError::invalid_settings("bvh_leaf_size must be at least 1"));
        }
        if self.max_snapshot_faces == 0 {
            return Err(StructureError::invalid_settings("max_snapshot_faces must be at least 1"));
        }
        Ok(())
    }
}

/// Settings applied to every created or modified joint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointSettings {
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Allow the joined bodies to collide with each other.
    pub use_local_collisions: bool,
    /// Whether joints can break.
    pub use_breaking: bool,
    /// Base breaking threshold.
    pub break_threshold: f64,
    /// Upper linear limit on every axis.
    pub linear_range: f64,
    /// Upper angular limit on every axis, in degrees.
    pub angular_range_degrees: f64,
    /// Multiply the threshold by the overlap volume.
    pub scale_by_volume: bool,
    /// Multiply the threshold by the lighter body's mass.
    pub scale_by_min_mass: bool,
}

impl Default for JointSettings {
    fn default() -> Self {
        Self {
            kind: ConstraintKind::Fixed,
            use_local_collisions: false,
            use_breaking: true,
            break_threshold: 40.0,
            linear_range: 0.01,
            angular_range_degrees: 1.0,
            scale_by_volume: false,
            scale_by_min_mass: false,
        }
    }
}

impl JointSettings {
    /// Set the constraint kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ConstraintKind) -> Self {
        self.kind = kind;
        self
    }

    /// Allow or forbid collisions between joined bodies.
    #[must_use]
    pub fn with_local_collisions(mut self, enabled: bool) -> Self {
        self.use_local_collisions = enabled;
        self
    }

    /// Enable or disable breaking.
    #[must_use]
    pub fn with_breaking(mut self, enabled: bool) -> Self {
        self.use_breaking = enabled;
        self
    }

    /// Set the base breaking threshold.
    #[must_use]
    pub fn with_break_threshold(mut self, threshold: f64) -> Self {
        self.break_threshold = threshold;
        self
    }

    /// Set linear and angular leeway (angular in degrees).
    #[must_use]
    pub fn with_leeway(mut self, linear: f64, angular_degrees: f64) -> Self {
        self.linear_range = linear;
        self.angular_range_degrees = angular_degrees;
        self
    }

    /// Scale the threshold by overlap volume.
    #[must_use]
    pub fn with_scale_by_volume(mut self, enabled: bool) -> Self {
        self.scale_by_volume = enabled;
        self
    }

    /// Scale the threshold by the lighter body's mass.
    #[must_use]
    pub fn with_scale_by_min_mass(mut self, enabled: bool) -> Self {
        self.scale_by_min_mass = enabled;
        self
    }

    /// Check every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::InvalidSettings`] naming the first bad field.
    pub fn validate(&self) -> StructureResult<()> {
        non_negative("break_threshold", self.break_threshold)?;
        non_negative("linear_range", self.linear_range)?;
        non_negative("angular_range_degrees", self.angular_range_degrees)
    }
}

/// Collision shape of a generated collider proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColliderShape {
    /// Convex hull of the welded mesh.
    #[default]
    ConvexHull,
    /// The welded mesh itself.
    Mesh,
}

/// Parameters for collider proxy generation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColliderParams {
    /// Proxy shape.
    pub shape: ColliderShape,
    /// Per-axis scale about the mesh centroid.
    pub scale: Vector3<f64>,
    /// Scale in the principal frame: x along the farthest vertex pair, y and
    /// z across it. Applied about the midpoint of that pair.
    pub axis_scale: Vector3<f64>,
    /// Vertices closer than this are welded.
    pub weld_distance: f64,
    /// Boundary loops of at most this many edges are capped after welding.
    /// Zero leaves holes open.
    pub fill_hole_sides: usize,
}

impl Default for ColliderParams {
    fn default() -> Self {
        Self {
            shape: ColliderShape::ConvexHull,
            scale: Vector3::new(1.0, 1.0, 1.0),
            axis_scale: Vector3::new(1.0, 1.0, 1.0),
            weld_distance: 1e-4,
            fill_hole_sides: 4,
        }
    }
}

impl ColliderParams {
    /// Set the proxy shape.
    #[must_use]
    pub fn with_shape(mut self, shape: ColliderShape) -> Self {
        self.shape = shape;
        self
    }

    /// Set the per-axis scale.
    #[must_use]
    pub fn with_scale(mut self, scale: Vector3<f64>) -> Self {
        self.scale = scale;
        self
    }

    /// Set the principal-axis scale.
    #[must_use]
    pub fn with_axis_scale(mut self, scale: Vector3<f64>) -> Self {
        self.axis_scale = scale;
        self
    }

    /// Set the weld distance.
    #[must_use]
    pub fn with_weld_distance(mut self, distance: f64) -> Self {
        self.weld_distance = distance;
        self
    }

    /// Set the largest hole that gets capped. Zero disables filling.
    #[must_use]
    pub fn with_fill_hole_sides(mut self, sides: usize) -> Self {
        self.fill_hole_sides = sides;
        self
    }

    /// Check every field is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ColliderError::InvalidParams`] for non-positive or
    /// non-finite scales, negative weld distances and hole limits of one or
    /// two sides.
    pub fn validate(&self) -> Result<(), ColliderError> {
        if !self.scale.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(ColliderError::InvalidParams {
                reason: format!("scale must be positive, got {:?}", self.scale),
            });
        }
        if !self.axis_scale.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(ColliderError::InvalidParams {
                reason: format!("axis scale must be positive, got {:?}", self.axis_scale),
            });
        }
        if !(self.weld_distance.is_finite() && self.weld_distance >= 0.0) {
            return Err(ColliderError::InvalidParams {
                reason: format!("weld distance must be non-negative, got {}", self.weld_distance),
            });
        }
        if matches!(self.fill_hole_sides, 1 | 2) {
            return Err(ColliderError::InvalidParams {
                reason: format!("a hole has at least 3 sides, got {}", self.fill_hole_sides),
            });
        }
        Ok(())
    }
}

fn non_negative(field: &str, value: f64) -> StructureResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StructureError::invalid_settings(format!(
            "{field} must be finite and non-negative, got {value}"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_defaults() {
        let s = StructureSettings::default();
        assert_eq!(s.margin, 0.0);
        assert_eq!(s.subdivision, 4);
        assert_eq!(s.contact_mode, ContactMode::Nearest(PointSource::Both));
        assert_eq!(s.existing_policy, ExistingPolicy::Overwrite);
        assert_eq!(s.bvh_leaf_size, 4);
        assert!(!s.parallel);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert_eq!(StructureSettings::fast().contact_mode, ContactMode::OriginMidpoint);
        assert!(StructureSettings::precise().contact_mode.measures_volume());
        assert!(!ContactMode::default().measures_volume());
    }

    #[test]
    fn test_volume_proxy() {
        assert_eq!(StructureSettings::default().volume_proxy(), 1.0);
        assert_eq!(StructureSettings::default().with_margin(-0.02).volume_proxy(), 0.02);
    }

    #[test]
    fn test_invalid_structure_settings() {
        assert!(StructureSettings::default().with_margin(f64::NAN).validate().is_err());
        assert!(StructureSettings::default().with_min_overlap_volume(-1.0).validate().is_err());
        assert!(StructureSettings::default().with_subdivision(MAX_SUBDIVISION + 1).validate().is_err());

        let mut zero_leaf = StructureSettings::default();
        zero_leaf.bvh_leaf_size = 0;
        assert!(zero_leaf.validate().is_err());

        assert_eq!(StructureSettings::default().with_bvh_leaf_size(0).bvh_leaf_size, 1);
    }

    #[test]
    fn test_joint_defaults() {
        let j = JointSettings::default();
        assert_eq!(j.kind, ConstraintKind::Fixed);
        assert!(!j.use_local_collisions);
        assert!(j.use_breaking);
        assert_eq!(j.break_threshold, 40.0);
        assert_eq!(j.linear_range, 0.01);
        assert_eq!(j.angular_range_degrees, 1.0);
        assert!(j.validate().is_ok());
    }

    #[test]
    fn test_invalid_joint_settings() {
        let err = JointSettings::default()
            .with_break_threshold(-5.0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("break_threshold"));
        assert!(JointSettings::default().with_leeway(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_collider_params_validation() {
        assert!(ColliderParams::default().validate().is_ok());
        assert!(ColliderParams::default()
            .with_scale(Vector3::new(1.0, 0.0, 1.0))
            .validate()
            .is_err());
        assert!(ColliderParams::default().with_axis_scale(Vector3::new(-2.0, 1.0, 1.0)).validate().is_err());
        assert!(ColliderParams::default().with_weld_distance(-1e-3).validate().is_err());
        assert_eq!(ColliderParams::default().fill_hole_sides, 4);
        assert!(ColliderParams::default().with_fill_hole_sides(0).validate().is_ok());
        assert!(ColliderParams::default().with_fill_hole_sides(2).validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_serde() {
        let settings = StructureSettings::precise().with_margin(0.05);
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: StructureSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
