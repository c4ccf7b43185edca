// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Implementation of the Euclidean distance between flattened coordinates of frames.

use derive_builder::Builder;
use serde::Deserialize;

use crate::errors::{ConfigError, MetricError};
use crate::trajectory::Trajectory;

use super::{all_pairwise_by_rows, check_frame, Metric, Prepared};

/// Euclidean distance between the coordinates of the selected atoms.
/// Unlike RMSD, no superposition is performed.
#[derive(Debug, Clone, Default, Builder, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Euclidean {
    /// Indices of atoms used to calculate the distance.
    /// If not specified, all atoms are used.
    #[builder(setter(into, strip_option), default)]
    #[serde(default, alias = "atoms")]
    atom_indices: Option<Vec<usize>>,
}

/// Trajectory prepared for Euclidean distance calculations.
#[derive(Debug, Clone)]
pub struct EuclideanPrepared {
    /// Number of coordinates per frame.
    dim: usize,
    n_frames: usize,
    data: Vec<f32>,
}

impl EuclideanPrepared {
    #[inline(always)]
    fn frame(&self, index: usize) -> &[f32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }
}

impl Prepared for EuclideanPrepared {
    #[inline(always)]
    fn n_frames(&self) -> usize {
        self.n_frames
    }

    fn select(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.dim);
        for &i in indices {
            data.extend_from_slice(self.frame(i));
        }

        EuclideanPrepared {
            dim: self.dim,
            n_frames: indices.len(),
            data,
        }
    }
}

impl Euclidean {
    pub fn new() -> EuclideanBuilder {
        EuclideanBuilder::default()
    }

    /// Indices of atoms used for the calculation. `None` means all atoms.
    pub fn atom_indices(&self) -> Option<&[usize]> {
        self.atom_indices.as_deref()
    }

    /// Check that the metric is valid. Used after deserialization from a yaml file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.atom_indices {
            Some(x) if x.is_empty() => Err(ConfigError::EmptyAtomSelection),
            _ => Ok(()),
        }
    }

    pub(crate) fn info(&self) {
        match &self.atom_indices {
            Some(indices) => log::info!(
                "Using Euclidean metric over {} selected atoms.",
                indices.len()
            ),
            None => log::info!("Using Euclidean metric over all atoms."),
        }
    }
}

impl EuclideanBuilder {
    fn validate(&self) -> Result<(), String> {
        match &self.atom_indices {
            Some(Some(x)) if x.is_empty() => Err(ConfigError::EmptyAtomSelection.to_string()),
            _ => Ok(()),
        }
    }
}

impl Metric for Euclidean {
    type Prepared = EuclideanPrepared;

    fn prepare(&self, trajectory: &Trajectory) -> Result<EuclideanPrepared, MetricError> {
        let n_atoms = trajectory.n_atoms();
        if let Some(indices) = &self.atom_indices {
            if let Some(&bad) = indices.iter().find(|&&i| i >= n_atoms) {
                return Err(MetricError::AtomIndexOutOfRange(bad, n_atoms));
            }
        }

        let dim = 3 * self.atom_indices.as_ref().map(|x| x.len()).unwrap_or(n_atoms);
        let mut data = Vec::with_capacity(dim * trajectory.n_frames());
        for frame in trajectory.frames() {
            match &self.atom_indices {
                Some(indices) => indices
                    .iter()
                    .for_each(|&i| data.extend_from_slice(&frame[i])),
                None => frame.iter().for_each(|atom| data.extend_from_slice(atom)),
            }
        }

        Ok(EuclideanPrepared {
            dim,
            n_frames: trajectory.n_frames(),
            data,
        })
    }

    fn one_to_all(
        &self,
        a: &EuclideanPrepared,
        b: &EuclideanPrepared,
        index: usize,
    ) -> Result<Vec<f32>, MetricError> {
        let indices: Vec<usize> = (0..b.n_frames()).collect();
        self.one_to_many(a, b, index, &indices)
    }

    fn one_to_many(
        &self,
        a: &EuclideanPrepared,
        b: &EuclideanPrepared,
        index: usize,
        indices: &[usize],
    ) -> Result<Vec<f32>, MetricError> {
        check_frame(index, a.n_frames())?;
        if a.dim != b.dim {
            return Err(MetricError::IncompatibleTrajectories(a.dim / 3, b.dim / 3));
        }

        let same = std::ptr::eq(a, b);
        let reference = a.frame(index);

        indices
            .iter()
            .map(|&j| {
                check_frame(j, b.n_frames())?;
                if same && j == index {
                    return Ok(0.0);
                }

                let sum: f64 = reference
                    .iter()
                    .zip(b.frame(j))
                    .map(|(x, y)| {
                        let d = (*x - *y) as f64;
                        d * d
                    })
                    .sum();

                Ok(sum.sqrt() as f32)
            })
            .collect()
    }

    fn all_pairwise(&self, prepared: &EuclideanPrepared) -> Result<Vec<f32>, MetricError> {
        all_pairwise_by_rows(self, prepared)
    }
}
