//! Intersection errors.

use thiserror::Error;

/// Why an intersection could not be computed.
///
/// Disjoint inputs are not an error; they yield an empty mesh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BooleanError {
    /// An input has no vertices or no faces.
    #[error("empty mesh: {details}")]
    EmptyMesh {
        /// Which input, and what it lacks.
        details: String,
    },

    /// An input has out-of-range indices or non-finite coordinates.
    #[error("degenerate mesh: {details}")]
    DegenerateMesh {
        /// First offending face or vertex.
        details: String,
    },

    /// Floating-point trouble while cutting or classifying.
    #[error("numerical error: {details}")]
    NumericalError {
        /// What went wrong.
        details: String,
    },

    /// Cutting produced more fragments than [`BooleanConfig::max_fragments`](crate::BooleanConfig::max_fragments).
    #[error("fragment limit exceeded: {fragments} > {limit}")]
    FragmentLimit {
        /// Fragments at the point of failure.
        fragments: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A [`BooleanConfig`](crate::BooleanConfig) field is out of range.
    #[error("invalid config: {reason}")]
    InvalidConfig {
        /// The offending field and value.
        reason: String,
    },
}

/// Result alias for intersection calls.
pub type BooleanResult<T> = Result<T, BooleanError>;
