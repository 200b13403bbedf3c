//! Joint records created by structure synthesis.
//!
//! A [`Joint`] binds two distinct bodies at an anchor point and carries the
//! [`ConstraintParams`] a physics host needs to build the actual constraint.

use crate::body::BodyId;
use crate::config::JointSettings;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a synthesized joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointId(pub u64);

impl JointId {
    /// Create a new joint ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for JointId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Joint({})", self.0)
    }
}

/// Kind of constraint a joint represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// No relative motion.
    #[default]
    Fixed,
    /// Free rotation about the anchor.
    Ball,
    /// Per-axis limited motion (six-axis generic constraint).
    Generic,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fixed => "fixed",
            Self::Ball => "ball",
            Self::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// Per-axis lower/upper limits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointLimits {
    /// Whether the limits are active.
    pub enabled: bool,
    /// Lower limit per axis.
    pub lower: Vector3<f64>,
    /// Upper limit per axis.
    pub upper: Vector3<f64>,
}

impl JointLimits {
    /// Limits from 0 to `range` on every axis.
    #[must_use]
    pub fn symmetric_leeway(range: f64) -> Self {
        Self {
            enabled: true,
            lower: Vector3::zeros(),
            upper: Vector3::repeat(range),
        }
    }

    /// Check whether `value` is inside the limits on every axis.
    #[must_use]
    pub fn contains(&self, value: &Vector3<f64>) -> bool {
        !self.enabled
            || (0..3).all(|i| value[i] >= self.lower[i] && value[i] <= self.upper[i])
    }
}

/// Constraint parameters derived from [`JointSettings`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintParams {
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Linear limits (distance units).
    pub linear: JointLimits,
    /// Angular limits (radians).
    pub angular: JointLimits,
    /// Whether the two bodies ignore each other in collision.
    pub disable_collisions: bool,
    /// Whether the joint breaks under load.
    pub use_breaking: bool,
    /// Impulse at which the joint breaks.
    pub breaking_threshold: f64,
}

impl ConstraintParams {
    /// Derive parameters from settings.
    ///
    /// # Arguments
    ///
    /// * `settings` - Joint settings
    /// * `volume` - Overlap volume (or the approximate-mode proxy)
    /// * `mass_a`, `mass_b` - Masses of the two bodies
    ///
    /// The breaking threshold is `break_threshold`, multiplied by `volume`
    /// when `scale_by_volume` is set and by the smaller mass when
    /// `scale_by_min_mass` is set.
    ///
    /// # Example
    ///
    /// ```
    /// use sim_structure::{ConstraintParams, JointSettings};
    ///
    /// let settings = JointSettings::default()
    ///     .with_break_threshold(10.0)
    ///     .with_scale_by_volume(true)
    ///     .with_scale_by_min_mass(true);
    ///
    /// let params = ConstraintParams::from_settings(&settings, 0.5, 4.0, 2.0);
    /// assert!((params.breaking_threshold - 10.0).abs() < 1e-12);
    /// assert!(params.disable_collisions);
    /// ```
    #[must_use]
    pub fn from_settings(settings: &JointSettings, volume: f64, mass_a: f64, mass_b: f64) -> Self {
        let mut threshold = settings.break_threshold;
        if settings.scale_by_volume {
            threshold *= volume;
        }
        if settings.scale_by_min_mass {
            threshold *= mass_a.min(mass_b);
        }

        Self {
            kind: settings.kind,
            linear: JointLimits::symmetric_leeway(settings.linear_range),
            angular: JointLimits::symmetric_leeway(settings.angular_range_degrees.to_radians()),
            disable_collisions: !settings.use_local_collisions,
            use_breaking: settings.use_breaking,
            breaking_threshold: threshold,
        }
    }
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self::from_settings(&JointSettings::default(), 1.0, 1.0, 1.0)
    }
}

/// A synthesized joint between two bodies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Joint {
    /// Assigned by the registry on insert.
    pub id: JointId,
    /// Display name.
    pub name: String,
    /// First endpoint.
    pub body_a: BodyId,
    /// Second endpoint.
    pub body_b: BodyId,
    /// World-space anchor.
    pub anchor: Point3<f64>,
    /// Constraint parameters.
    pub params: ConstraintParams,
    /// Overlap volume recorded at creation (proxy value in approximate modes).
    pub overlap_volume: f64,
}

impl Joint {
    /// Create an unregistered joint. The id is replaced when inserted into a
    /// registry.
    #[must_use]
    pub fn new(name: impl Into<String>, body_a: BodyId, body_b: BodyId, anchor: Point3<f64>) -> Self {
        Self {
            id: JointId::new(0),
            name: name.into(),
            body_a,
            body_b,
            anchor,
            params: ConstraintParams::default(),
            overlap_volume: 0.0,
        }
    }

    /// Set constraint parameters.
    #[must_use]
    pub fn with_params(mut self, params: ConstraintParams) -> Self {
        self.params = params;
        self
    }

    /// Record the overlap volume.
    #[must_use]
    pub fn with_overlap_volume(mut self, volume: f64) -> Self {
        self.overlap_volume = volume;
        self
    }

    /// Whether this joint binds `body`.
    #[must_use]
    pub fn involves(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// The opposite endpoint, if `body` is one of the endpoints.
    #[must_use]
    pub fn other(&self, body: BodyId) -> Option<BodyId> {
        if self.body_a == body {
            Some(self.body_b)
        } else if self.body_b == body {
            Some(self.body_a)
        } else {
            None
        }
    }

    /// Whether this joint connects exactly `a` and `b`, in either order.
    #[must_use]
    pub fn connects(&self, a: BodyId, b: BodyId) -> bool {
        (self.body_a == a && self.body_b == b) || (self.body_a == b && self.body_b == a)
    }
}
