// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains the distance metrics used to compare structures.
//!
//! A metric first converts a [`Trajectory`] into its own prepared representation
//! and then calculates distances between frames of prepared trajectories.
//! New metrics are added by implementing the [`Metric`] trait.

use crate::errors::MetricError;
use crate::trajectory::Trajectory;

pub mod euclidean;
pub mod rmsd;

/// Metric-specific representation of a trajectory enabling efficient distance queries.
pub trait Prepared: Send + Sync + Sized {
    /// Number of frames in the prepared trajectory.
    fn n_frames(&self) -> usize;

    /// Create a new prepared trajectory containing only the frames with the specified indices.
    /// Panics if any of the indices is out of range.
    fn select(&self, indices: &[usize]) -> Self;

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.n_frames() == 0
    }
}

/// Trait implemented by all distance metrics.
///
/// Distances must be symmetric and non-negative and the distance of a frame to itself must be exactly zero.
pub trait Metric: Send + Sync {
    type Prepared: Prepared;

    /// Convert a trajectory into the prepared representation used by this metric.
    fn prepare(&self, trajectory: &Trajectory) -> Result<Self::Prepared, MetricError>;

    /// Calculate the distance from frame `index` of `a` to every frame of `b`.
    fn one_to_all(
        &self,
        a: &Self::Prepared,
        b: &Self::Prepared,
        index: usize,
    ) -> Result<Vec<f32>, MetricError>;

    /// Calculate the distance from frame `index` of `a` to the frames of `b` with the specified indices.
    fn one_to_many(
        &self,
        a: &Self::Prepared,
        b: &Self::Prepared,
        index: usize,
        indices: &[usize],
    ) -> Result<Vec<f32>, MetricError>;

    /// Calculate distances between all unique pairs of frames.
    /// Returns a condensed distance vector in row-major upper-triangular order
    /// (0-1, 0-2, ..., 0-(n-1), 1-2, ...).
    fn all_pairwise(&self, prepared: &Self::Prepared) -> Result<Vec<f32>, MetricError>;

    /// Calculate distances between all pairs of frames and return them as a square matrix (row-major).
    fn square_all_pairwise(&self, prepared: &Self::Prepared) -> Result<Vec<Vec<f32>>, MetricError> {
        let condensed = self.all_pairwise(prepared)?;
        Ok(squareform(&condensed, prepared.n_frames()))
    }
}

/// Number of unique pairs for `n` items.
#[inline(always)]
pub fn n_pairs(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Index of the pair (i, j), i < j, in a condensed distance vector for `n` items.
#[inline(always)]
pub fn condensed_index(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    n * i - i * (i + 1) / 2 + (j - i - 1)
}

/// Expand a condensed distance vector into a symmetric square matrix with zero diagonal.
pub fn squareform(condensed: &[f32], n: usize) -> Vec<Vec<f32>> {
    let mut square = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = condensed[condensed_index(n, i, j)];
            square[i][j] = d;
            square[j][i] = d;
        }
    }

    square
}

/// Check that a frame index is valid for a prepared trajectory.
#[inline(always)]
pub(crate) fn check_frame(index: usize, n_frames: usize) -> Result<(), MetricError> {
    if index >= n_frames {
        Err(MetricError::FrameOutOfRange(index, n_frames))
    } else {
        Ok(())
    }
}

/// Calculate distances between all pairs of frames by stacking `one_to_many` queries
/// for the upper triangle. Serves as the reference definition of `all_pairwise`.
pub(crate) fn all_pairwise_by_rows<M: Metric + ?Sized>(
    metric: &M,
    prepared: &M::Prepared,
) -> Result<Vec<f32>, MetricError> {
    let n = prepared.n_frames();
    if n == 0 {
        return Err(MetricError::EmptyTrajectory);
    }

    let mut condensed = Vec::with_capacity(n_pairs(n));
    for i in 0..n {
        let upper: Vec<usize> = ((i + 1)..n).collect();
        condensed.extend(metric.one_to_many(prepared, prepared, i, &upper)?);
    }

    Ok(condensed)
}
