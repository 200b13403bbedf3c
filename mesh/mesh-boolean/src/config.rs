//! Tolerances and switches for the intersection engine.
//!
//! # Presets
//!
//! - [`BooleanConfig::default()`] - Modelled parts in the 0.01 to 100 unit range
//! - [`BooleanConfig::for_offset_surfaces()`] - Meshes pushed out or in by a
//!   margin, whose faces are only nearly planar against their neighbours
//! - [`BooleanConfig::strict()`] - Exact, axis-aligned geometry
//!
//! # Example
//!
//! ```
//! use mesh_boolean::BooleanConfig;
//!
//! let config = BooleanConfig::strict()
//!     .with_parallel(true)
//!     .with_bvh_leaf_size(4);
//! assert_eq!(config.bvh_leaf_size, 4);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{BooleanError, BooleanResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Intersection engine settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BooleanConfig {
    /// Result vertices closer than this are merged.
    pub vertex_weld_tolerance: f64,

    /// Faces within this plane distance of each other are cut as coplanar.
    pub coplanar_tolerance: f64,

    /// Plane distance a vertex must exceed to count as crossing.
    pub split_tolerance: f64,

    /// A fragment centroid this close to the other surface is "on" it.
    pub classification_tolerance: f64,

    /// Slivers below this area are dropped.
    pub min_fragment_area: f64,

    /// Cut fragments allowed per mesh before giving up.
    pub max_fragments: usize,

    /// Classify fragments on the rayon pool.
    pub parallel: bool,

    /// Faces per BVH leaf.
    pub bvh_leaf_size: usize,
}

impl Default for BooleanConfig {
    fn default() -> Self {
        Self {
            vertex_weld_tolerance: 1e-7,
            coplanar_tolerance: 1e-7,
            split_tolerance: 1e-9,
            classification_tolerance: 1e-7,
            min_fragment_area: 1e-14,
            max_fragments: 2_000_000,
            parallel: false,
            bvh_leaf_size: 8,
        }
    }
}

impl BooleanConfig {
    /// Looser tolerances for margin-offset meshes.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_boolean::BooleanConfig;
    ///
    /// let loose = BooleanConfig::for_offset_surfaces();
    /// assert!(loose.coplanar_tolerance > BooleanConfig::default().coplanar_tolerance);
    /// ```
    #[must_use]
    pub fn for_offset_surfaces() -> Self {
        Self {
            vertex_weld_tolerance: 1e-6,
            coplanar_tolerance: 1e-6,
            split_tolerance: 1e-8,
            classification_tolerance: 1e-6,
            min_fragment_area: 1e-12,
            ..Self::default()
        }
    }

    /// Tight tolerances for exact geometry.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            vertex_weld_tolerance: 1e-9,
            coplanar_tolerance: 1e-9,
            split_tolerance: 1e-11,
            classification_tolerance: 1e-9,
            min_fragment_area: 1e-18,
            ..Self::default()
        }
    }

    /// Toggle parallel classification.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the weld tolerance (sign is ignored).
    #[must_use]
    pub fn with_vertex_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.vertex_weld_tolerance = tolerance.abs();
        self
    }

    /// Set the BVH leaf size (minimum 1).
    #[must_use]
    pub fn with_bvh_leaf_size(mut self, size: usize) -> Self {
        self.bvh_leaf_size = size.max(1);
        self
    }

    /// Set the fragment limit.
    #[must_use]
    pub fn with_max_fragments(mut self, limit: usize) -> Self {
        self.max_fragments = limit;
        self
    }

    /// Check that every tolerance is finite and non-negative and the leaf
    /// size is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`BooleanError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> BooleanResult<()> {
        let tolerances = [
            ("vertex_weld_tolerance", self.vertex_weld_tolerance),
            ("coplanar_tolerance", self.coplanar_tolerance),
            ("split_tolerance", self.split_tolerance),
            ("classification_tolerance", self.classification_tolerance),
            ("min_fragment_area", self.min_fragment_area),
        ];
        if let Some((name, value)) = tolerances
            .iter()
            .find(|(_, v)| !(v.is_finite() && *v >= 0.0))
        {
            return Err(BooleanError::InvalidConfig {
                reason: format!("{name} must be finite and non-negative, got {value}"),
            });
        }
        if self.bvh_leaf_size == 0 {
            return Err(BooleanError::InvalidConfig {
                reason: "bvh_leaf_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid_and_ordered() {
        let default = BooleanConfig::default();
        let loose = BooleanConfig::for_offset_surfaces();
        let strict = BooleanConfig::strict();

        for config in [&default, &loose, &strict] {
            assert!(config.validate().is_ok());
        }
        assert!(loose.split_tolerance > default.split_tolerance);
        assert!(strict.split_tolerance < default.split_tolerance);
        assert_eq!(strict.max_fragments, default.max_fragments);
        assert!(!default.parallel);
    }

    #[test]
    fn test_builders_clamp() {
        let config = BooleanConfig::default()
            .with_vertex_weld_tolerance(-1e-5)
            .with_bvh_leaf_size(0)
            .with_max_fragments(10);

        assert!((config.vertex_weld_tolerance - 1e-5).abs() < 1e-12);
        assert_eq!(config.bvh_leaf_size, 1);
        assert_eq!(config.max_fragments, 10);
    }

    #[test]
    fn test_validate_names_bad_field() {
        let config = BooleanConfig {
            coplanar_tolerance: f64::NAN,
            ..BooleanConfig::default()
        };
        match config.validate() {
            Err(BooleanError::InvalidConfig { reason }) => {
                assert!(reason.starts_with("coplanar_tolerance"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let config = BooleanConfig {
            bvh_leaf_size: 0,
            ..BooleanConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
