//! All-pairs overlap detection over indexed bodies.
//!
//! Every unordered pair `i < j` is queried once, so the cost is quadratic in
//! the number of bodies. Each query itself is a BVH-vs-BVH descent.

use crate::body::BodyId;
use crate::index::SpatialIndex;
use crate::progress::ProgressSink;

/// Two bodies whose meshes overlap, with the colliding face pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapPair {
    /// First body (lower position in the index order).
    pub first: BodyId,
    /// Second body.
    pub second: BodyId,
    /// `(face of first, face of second)` pairs, sorted.
    pub faces: Vec<(u32, u32)>,
}

impl OverlapPair {
    /// Number of colliding face pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether no faces collide.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// The same overlap seen from the second body.
    #[must_use]
    pub fn swapped(&self) -> Self {
        let mut faces: Vec<(u32, u32)> = self.faces.iter().map(|&(a, b)| (b, a)).collect();
        faces.sort_unstable();
        Self {
            first: self.second,
            second: self.first,
            faces,
        }
    }
}

/// Pairwise detector over a fixed list of indices.
///
/// Has no side effects; the same input always yields the same pairs in the
/// same order.
#[derive(Debug, Clone, Copy)]
pub struct OverlapDetector<'a> {
    indices: &'a [SpatialIndex],
}

impl<'a> OverlapDetector<'a> {
    /// Create a detector over `indices`.
    #[must_use]
    pub fn new(indices: &'a [SpatialIndex]) -> Self {
        Self { indices }
    }

    /// Number of indexed bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether there are no indexed bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Query one pair. Returns `None` if either position is out of range or
    /// the bodies do not overlap.
    #[must_use]
    pub fn pair(&self, i: usize, j: usize) -> Option<OverlapPair> {
        let a = self.indices.get(i)?;
        let b = self.indices.get(j)?;
        let faces = a.overlap(b);
        if faces.is_empty() {
            return None;
        }
        Some(OverlapPair {
            first: a.body(),
            second: b.body(),
            faces,
        })
    }

    /// Every overlapping pair `i < j`, reporting `(i + 1) / N` after each row.
    pub fn detect(&self, progress: &mut dyn ProgressSink) -> Vec<OverlapPair> {
        let n = self.indices.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            pairs.extend(((i + 1)..n).filter_map(|j| self.pair(i, j)));
            progress.progress((i + 1) as f64 / n as f64);
        }
        pairs
    }
}

/// Convenience wrapper around [`OverlapDetector::detect`].
pub fn detect_overlaps(indices: &[SpatialIndex], progress: &mut dyn ProgressSink) -> Vec<OverlapPair> {
    OverlapDetector::new(indices).detect(progress)
}
