//! Error types for structure synthesis and collider generation.

use mesh_boolean::BooleanError;
use thiserror::Error;

/// Errors produced when generating collider proxies.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColliderError {
    /// The source mesh has no vertices or no faces.
    #[error("cannot build a collider from an empty mesh: {details}")]
    EmptyMesh {
        /// Which mesh was empty.
        details: String,
    },

    /// All source points are coplanar or coincident, so no solid hull exists.
    #[error("degenerate hull input: {details}")]
    DegenerateHull {
        /// Description of the degeneracy.
        details: String,
    },

    /// Collider parameters are out of range.
    #[error("invalid collider parameters: {reason}")]
    InvalidParams {
        /// What is wrong with the parameters.
        reason: String,
    },
}

/// Errors that abort a structure synthesis run.
///
/// Per-pair geometry failures never surface here; they are counted in the
/// run report instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructureError {
    /// Settings failed validation before the run started.
    #[error("invalid settings: {reason}")]
    InvalidSettings {
        /// Description of the offending field.
        reason: String,
    },

    /// A referenced body does not exist in the scene.
    #[error("body not found: {0}")]
    BodyNotFound(u64),

    /// A joint would connect a body to itself.
    #[error("joint endpoints must differ, both are body {0}")]
    SelfJoint(u64),

    /// Collider generation failed.
    #[error(transparent)]
    Collider(#[from] ColliderError),

    /// Boolean engine failure outside of per-pair resolution.
    #[error(transparent)]
    Boolean(#[from] BooleanError),
}

/// Result type for structure operations.
pub type StructureResult<T> = Result<T, StructureError>;

impl StructureError {
    /// Create an [`StructureError::InvalidSettings`] error.
    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            reason: reason.into(),
        }
    }
}
