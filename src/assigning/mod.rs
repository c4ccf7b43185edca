// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains the assignment engine labeling every frame with its nearest generator.

use serde::{Deserialize, Serialize};

use crate::errors::AssignmentError;
use crate::metrics::{Metric, Prepared};
use crate::project::TrajectorySource;
use crate::trajectory::Trajectory;
use crate::PANIC_MESSAGE;

pub mod checkpoint;

pub use checkpoint::AssignmentContainer;

/// Value marking positions in an assignment matrix that do not correspond to any frame
/// or that have not been assigned yet.
pub const ASSIGNMENT_SENTINEL: i32 = -1;
/// Value marking positions in a distance matrix that do not correspond to any frame
/// or that have not been assigned yet.
pub const DISTANCE_SENTINEL: f32 = -1.0;

/// Matrix with one row per trajectory and one column per frame.
/// Rows of trajectories shorter than the longest trajectory are padded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMatrix<T> {
    n_trajs: usize,
    max_length: usize,
    /// Row-major data.
    data: Vec<T>,
}

/// Cluster index of every frame.
pub type AssignmentMatrix = FrameMatrix<i32>;
/// Distance of every frame to its generator.
pub type DistanceMatrix = FrameMatrix<f32>;

impl<T: Copy + PartialEq> FrameMatrix<T> {
    /// Create a matrix filled with a single value.
    pub fn filled(n_trajs: usize, max_length: usize, value: T) -> Self {
        FrameMatrix {
            n_trajs,
            max_length,
            data: vec![value; n_trajs * max_length],
        }
    }

    /// Create a matrix from values of concatenated trajectories with the specified lengths,
    /// padding the rows with `sentinel`.
    pub fn from_concatenated(lengths: &[usize], values: &[T], sentinel: T) -> Self {
        assert_eq!(
            lengths.iter().sum::<usize>(),
            values.len(),
            "FATAL MICROSTATES ERROR | FrameMatrix::from_concatenated | Number of values does not match trajectory lengths. {}",
            PANIC_MESSAGE
        );

        let max_length = lengths.iter().copied().max().unwrap_or(0);
        let mut matrix = FrameMatrix::filled(lengths.len(), max_length, sentinel);

        let mut start = 0;
        for (i, &len) in lengths.iter().enumerate() {
            matrix.set_row(i, &values[start..start + len]);
            start += len;
        }

        matrix
    }

    /// Number of rows and columns of the matrix.
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_trajs, self.max_length)
    }

    #[inline(always)]
    pub fn n_trajs(&self) -> usize {
        self.n_trajs
    }

    #[inline(always)]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Get the value for frame `frame` of trajectory `traj`. Panics if out of range.
    #[inline(always)]
    pub fn get(&self, traj: usize, frame: usize) -> T {
        self.row(traj)[frame]
    }

    #[inline(always)]
    pub fn set(&mut self, traj: usize, frame: usize, value: T) {
        self.row_mut(traj)[frame] = value;
    }

    /// Get a row of the matrix. Panics if out of range.
    #[inline(always)]
    pub fn row(&self, traj: usize) -> &[T] {
        &self.data[traj * self.max_length..(traj + 1) * self.max_length]
    }

    #[inline(always)]
    pub fn row_mut(&mut self, traj: usize) -> &mut [T] {
        &mut self.data[traj * self.max_length..(traj + 1) * self.max_length]
    }

    /// Write `values` at the beginning of a row. The rest of the row is left untouched.
    pub fn set_row(&mut self, traj: usize, values: &[T]) {
        self.row_mut(traj)[..values.len()].copy_from_slice(values);
    }

    /// Iterate over the rows of the matrix.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks_exact(self.max_length.max(1)).take(self.n_trajs)
    }

    /// Check whether the first `length` entries of a row are all different from `sentinel`.
    pub fn row_complete(&self, traj: usize, length: usize, sentinel: T) -> bool {
        self.row(traj)[..length].iter().all(|&x| x != sentinel)
    }

    /// Values of all frames of all trajectories with the specified lengths, concatenated.
    pub fn concatenated(&self, lengths: &[usize]) -> Vec<T> {
        lengths
            .iter()
            .enumerate()
            .flat_map(|(i, &len)| self.row(i)[..len].iter().copied())
            .collect()
    }
}

/// Assign every frame of a prepared trajectory to its nearest prepared generator.
/// Returns index of the nearest generator (the first one in case of ties) and the corresponding distance
/// for every frame.
pub fn assign_prepared<M: Metric>(
    metric: &M,
    ptraj: &M::Prepared,
    pgens: &M::Prepared,
) -> Result<(Vec<i32>, Vec<f32>), AssignmentError> {
    if pgens.is_empty() {
        return Err(AssignmentError::NoGenerators);
    }

    let mut assignments = Vec::with_capacity(ptraj.n_frames());
    let mut distances = Vec::with_capacity(ptraj.n_frames());

    for frame in 0..ptraj.n_frames() {
        let d = metric.one_to_all(ptraj, pgens, frame)?;
        let (index, distance) = argmin(&d);
        assignments.push(index as i32);
        distances.push(distance);
    }

    Ok((assignments, distances))
}

/// Index and value of the first minimum.
pub(crate) fn argmin(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::INFINITY), |(best_i, best_d), (i, d)| {
            if d < best_d {
                (i, d)
            } else {
                (best_i, best_d)
            }
        })
}

/// Check that a trajectory has the length listed by the source.
pub(crate) fn check_length(
    traj: usize,
    expected: usize,
    actual: usize,
) -> Result<(), AssignmentError> {
    if expected != actual {
        Err(AssignmentError::LengthMismatch(traj, expected, actual))
    } else {
        Ok(())
    }
}

/// Assign all frames of all trajectories of a source to generators, keeping everything in memory.
pub fn assign_in_memory<M: Metric, S: TrajectorySource>(
    metric: &M,
    generators: &Trajectory,
    source: &S,
) -> Result<(AssignmentMatrix, DistanceMatrix), AssignmentError> {
    let pgens = metric.prepare(generators)?;
    if pgens.is_empty() {
        return Err(AssignmentError::NoGenerators);
    }

    let lengths = source.traj_lengths();
    let max_length = lengths.iter().copied().max().unwrap_or(0);
    let mut assignments =
        AssignmentMatrix::filled(source.n_trajs(), max_length, ASSIGNMENT_SENTINEL);
    let mut distances = DistanceMatrix::filled(source.n_trajs(), max_length, DISTANCE_SENTINEL);

    for i in 0..source.n_trajs() {
        log::info!("Assigning trajectory {}", i);
        let traj = source.load_traj(i)?;
        check_length(i, lengths[i], traj.n_frames())?;

        let ptraj = metric.prepare(&traj)?;
        let (a, d) = assign_prepared(metric, &ptraj, &pgens)?;
        assignments.set_row(i, &a);
        distances.set_row(i, &d);
    }

    Ok((assignments, distances))
}
