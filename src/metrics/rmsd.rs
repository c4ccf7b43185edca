// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Implementation of the root-mean-square deviation metric with optimal superposition.

use std::sync::Arc;

use derive_builder::Builder;
use getset::CopyGetters;
use nalgebra::{Matrix4, SymmetricEigen};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Deserialize;

use crate::errors::{ConfigError, MetricError};
use crate::trajectory::Trajectory;

use super::{check_frame, Metric, Prepared};

/// Minimal root-mean-square deviation between two structures after removing
/// translation and rotation. Only the selected atoms are used for the superposition
/// and for the calculation of the deviation.
#[derive(Debug, Clone, Builder, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Rmsd {
    /// Indices of atoms used to calculate the RMSD.
    /// If not specified, all atoms are used.
    #[builder(setter(into, strip_option), default)]
    #[serde(default, alias = "atoms")]
    atom_indices: Option<Vec<usize>>,
    /// Number of threads used for batch distance calculations.
    /// If not specified (or 1), distances are calculated sequentially.
    #[builder(default = "1")]
    #[serde(default = "default_one")]
    #[getset(get_copy = "pub")]
    n_threads: usize,
    /// Pool of worker threads. Created on first use.
    #[builder(setter(skip))]
    #[serde(skip)]
    pool: OnceCell<Arc<ThreadPool>>,
}

fn default_one() -> usize {
    1
}

/// Trajectory prepared for RMSD calculations.
#[derive(Debug, Clone)]
pub struct RmsdPrepared {
    /// Number of selected atoms in each frame.
    n_atoms: usize,
    /// Coordinates of the selected atoms centered at their centroid.
    xyz: Vec<[f32; 3]>,
    /// Sum of squared centered coordinates for each frame.
    g: Vec<f64>,
}

impl RmsdPrepared {
    #[inline(always)]
    fn frame(&self, index: usize) -> &[[f32; 3]] {
        &self.xyz[index * self.n_atoms..(index + 1) * self.n_atoms]
    }

    /// Number of atoms used for the RMSD calculation.
    #[inline(always)]
    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    /// Check that every frame is centered at the origin.
    pub fn is_centered(&self, tolerance: f32) -> bool {
        (0..self.n_frames()).all(|i| {
            let mut sum = [0.0f64; 3];
            for atom in self.frame(i) {
                for d in 0..3 {
                    sum[d] += atom[d] as f64;
                }
            }
            sum.iter()
                .all(|s| (s / self.n_atoms.max(1) as f64).abs() <= tolerance as f64)
        })
    }
}

impl Prepared for RmsdPrepared {
    #[inline(always)]
    fn n_frames(&self) -> usize {
        self.g.len()
    }

    fn select(&self, indices: &[usize]) -> Self {
        let mut xyz = Vec::with_capacity(indices.len() * self.n_atoms);
        let mut g = Vec::with_capacity(indices.len());
        for &i in indices {
            xyz.extend_from_slice(self.frame(i));
            g.push(self.g[i]);
        }

        RmsdPrepared {
            n_atoms: self.n_atoms,
            xyz,
            g,
        }
    }
}

impl Rmsd {
    pub fn new() -> RmsdBuilder {
        RmsdBuilder::default()
    }

    /// Indices of atoms used for the calculation. `None` means all atoms.
    pub fn atom_indices(&self) -> Option<&[usize]> {
        self.atom_indices.as_deref()
    }

    /// Check that the metric is valid. Used after deserialization from a yaml file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_atom_indices(self.atom_indices.as_deref())?;
        validate_n_threads(self.n_threads)
    }

    /// Log basic info about the metric.
    pub(crate) fn info(&self) {
        match &self.atom_indices {
            Some(indices) => log::info!("Using RMSD metric over {} selected atoms.", indices.len()),
            None => log::info!("Using RMSD metric over all atoms."),
        }

        if self.n_threads > 1 {
            log::info!(
                "Distances will be calculated in parallel using {} threads.",
                self.n_threads
            );
        }
    }

    /// Get the pool of worker threads, creating it if necessary.
    fn pool(&self) -> Result<&Arc<ThreadPool>, MetricError> {
        self.pool.get_or_try_init(|| {
            ThreadPoolBuilder::new()
                .num_threads(self.n_threads)
                .build()
                .map(Arc::new)
                .map_err(|e| MetricError::ThreadPool(e.to_string()))
        })
    }

    #[inline(always)]
    fn is_parallel(&self) -> bool {
        self.n_threads > 1
    }

    /// Evaluate `f` for every item either sequentially or using the pool of worker threads.
    /// Both paths evaluate exactly the same function and return results in the same order.
    fn evaluate<F>(&self, items: &[usize], f: F) -> Result<Vec<f32>, MetricError>
    where
        F: Fn(usize) -> f32 + Send + Sync,
    {
        if self.is_parallel() {
            let pool = self.pool()?;
            Ok(pool.install(|| items.par_iter().map(|&j| f(j)).collect()))
        } else {
            Ok(items.iter().map(|&j| f(j)).collect())
        }
    }
}

impl Metric for Rmsd {
    type Prepared = RmsdPrepared;

    fn prepare(&self, trajectory: &Trajectory) -> Result<RmsdPrepared, MetricError> {
        let all_atoms: Vec<usize>;
        let indices = match &self.atom_indices {
            Some(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= trajectory.n_atoms()) {
                    return Err(MetricError::AtomIndexOutOfRange(bad, trajectory.n_atoms()));
                }
                indices.as_slice()
            }
            None => {
                all_atoms = (0..trajectory.n_atoms()).collect();
                all_atoms.as_slice()
            }
        };

        let n_atoms = indices.len();
        let mut xyz = Vec::with_capacity(trajectory.n_frames() * n_atoms);
        let mut g = Vec::with_capacity(trajectory.n_frames());

        for frame in trajectory.frames() {
            // centroid of the selected atoms
            let mut centroid = [0.0f64; 3];
            for &i in indices {
                for d in 0..3 {
                    centroid[d] += frame[i][d] as f64;
                }
            }
            for c in centroid.iter_mut() {
                *c /= n_atoms.max(1) as f64;
            }

            let mut sum_squares = 0.0f64;
            for &i in indices {
                let mut centered = [0.0f32; 3];
                for d in 0..3 {
                    let value = frame[i][d] as f64 - centroid[d];
                    centered[d] = value as f32;
                    sum_squares += (centered[d] as f64) * (centered[d] as f64);
                }
                xyz.push(centered);
            }

            g.push(sum_squares);
        }

        Ok(RmsdPrepared { n_atoms, xyz, g })
    }

    fn one_to_all(
        &self,
        a: &RmsdPrepared,
        b: &RmsdPrepared,
        index: usize,
    ) -> Result<Vec<f32>, MetricError> {
        let indices: Vec<usize> = (0..b.n_frames()).collect();
        self.one_to_many(a, b, index, &indices)
    }

    fn one_to_many(
        &self,
        a: &RmsdPrepared,
        b: &RmsdPrepared,
        index: usize,
        indices: &[usize],
    ) -> Result<Vec<f32>, MetricError> {
        check_frame(index, a.n_frames())?;
        check_compatible(a, b)?;
        for &j in indices {
            check_frame(j, b.n_frames())?;
        }

        let same = std::ptr::eq(a, b);
        let reference = a.frame(index);
        let g_reference = a.g[index];

        self.evaluate(indices, |j| {
            if same && j == index {
                0.0
            } else {
                superposed_rmsd(reference, g_reference, b.frame(j), b.g[j])
            }
        })
    }

    fn all_pairwise(&self, prepared: &RmsdPrepared) -> Result<Vec<f32>, MetricError> {
        let n = prepared.n_frames();
        if n == 0 {
            return Err(MetricError::EmptyTrajectory);
        }

        let row = |i: usize| -> Vec<f32> {
            ((i + 1)..n)
                .map(|j| {
                    superposed_rmsd(
                        prepared.frame(i),
                        prepared.g[i],
                        prepared.frame(j),
                        prepared.g[j],
                    )
                })
                .collect()
        };

        let rows: Vec<Vec<f32>> = if self.is_parallel() {
            let pool = self.pool()?;
            pool.install(|| (0..n).into_par_iter().map(row).collect())
        } else {
            (0..n).map(row).collect()
        };

        Ok(rows.concat())
    }
}

/// Check that two prepared trajectories can be compared.
#[inline(always)]
fn check_compatible(a: &RmsdPrepared, b: &RmsdPrepared) -> Result<(), MetricError> {
    if a.n_atoms != b.n_atoms {
        Err(MetricError::IncompatibleTrajectories(a.n_atoms, b.n_atoms))
    } else {
        Ok(())
    }
}

/// Calculate RMSD between two centered structures after optimal rotation.
///
/// Uses the quaternion formulation of the superposition problem: the largest eigenvalue
/// of the 4x4 key matrix built from the correlation matrix of the two structures
/// gives the maximal overlap achievable by any rotation.
fn superposed_rmsd(x: &[[f32; 3]], g_x: f64, y: &[[f32; 3]], g_y: f64) -> f32 {
    let n_atoms = x.len();
    if n_atoms == 0 {
        return 0.0;
    }

    // correlation matrix
    let mut m = [[0.0f64; 3]; 3];
    for (a, b) in x.iter().zip(y.iter()) {
        for i in 0..3 {
            for j in 0..3 {
                m[i][j] += a[i] as f64 * b[j] as f64;
            }
        }
    }

    let [[sxx, sxy, sxz], [syx, syy, syz], [szx, szy, szz]] = m;

    #[rustfmt::skip]
    let key = Matrix4::new(
        sxx + syy + szz, syz - szy,        szx - sxz,        sxy - syx,
        syz - szy,       sxx - syy - szz,  sxy + syx,        szx + sxz,
        szx - sxz,       sxy + syx,        -sxx + syy - szz, syz + szy,
        sxy - syx,       szx + sxz,        syz + szy,        -sxx - syy + szz,
    );

    let lambda = SymmetricEigen::new(key).eigenvalues.max();
    let msd = (g_x + g_y - 2.0 * lambda) / n_atoms as f64;

    msd.max(0.0).sqrt() as f32
}

fn validate_atom_indices(indices: Option<&[usize]>) -> Result<(), ConfigError> {
    match indices {
        Some(x) if x.is_empty() => Err(ConfigError::EmptyAtomSelection),
        _ => Ok(()),
    }
}

fn validate_n_threads(n_threads: usize) -> Result<(), ConfigError> {
    if n_threads == 0 {
        Err(ConfigError::InvalidNThreads)
    } else {
        Ok(())
    }
}

impl RmsdBuilder {
    /// Check that the metric is valid.
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(indices)) = &self.atom_indices {
            validate_atom_indices(Some(indices)).map_err(|e| e.to_string())?;
        }

        if let Some(n_threads) = self.n_threads {
            validate_n_threads(n_threads).map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}
