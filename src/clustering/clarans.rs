// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Implementation of CLARANS and its subsampled variant.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::errors::{ClusteringError, ConfigError};
use crate::input::{Clarans, SubsampledClarans};
use crate::metrics::{Metric, Prepared};
use crate::trajectory::Trajectory;

use super::{create_rng, prepare_input, FlatClustering, MedoidAssignment};

impl Clarans {
    /// Cluster the trajectories using randomized medoid search.
    pub fn cluster<M: Metric>(
        &self,
        metric: &M,
        trajectories: &[Trajectory],
    ) -> Result<FlatClustering, ClusteringError> {
        self.validate()?;
        self.info();

        let (prepared, lengths) = prepare_input(metric, trajectories)?;
        let mut rng = create_rng(self.random_seed());
        let result = self.search(metric, &prepared, &mut rng)?;

        log::info!("CLARANS finished. Total cost: {:.6}", result.cost());
        Ok(result.into_flat(lengths))
    }

    /// Perform `num_local_minima` independent searches and return the best medoids found.
    pub(crate) fn search<M: Metric>(
        &self,
        metric: &M,
        prepared: &M::Prepared,
        rng: &mut StdRng,
    ) -> Result<MedoidAssignment, ClusteringError> {
        let n_frames = prepared.n_frames();
        let n_medoids = self.n_clusters();
        if n_medoids > n_frames {
            return Err(ClusteringError::NotEnoughFrames(n_medoids, n_frames));
        }

        let mut best: Option<MedoidAssignment> = None;

        for minimum in 0..self.num_local_minima() {
            let medoids = sample(rng, n_frames, n_medoids).into_vec();
            let mut current = MedoidAssignment::compute(metric, prepared, medoids)?;
            let mut cost = current.cost();

            let mut n_rejected = 0;
            while n_rejected < self.max_neighbors() {
                let m = rng.random_range(0..n_medoids);
                let trial = if self.local_swap() {
                    let members = current.members(m);
                    if members.is_empty() {
                        n_rejected += 1;
                        continue;
                    }
                    members[rng.random_range(0..members.len())]
                } else {
                    rng.random_range(0..n_frames)
                };

                if current.is_medoid(trial) {
                    n_rejected += 1;
                    continue;
                }

                let candidate = current.swap(metric, prepared, m, trial)?;
                let new_cost = candidate.cost();
                if new_cost < cost {
                    log::debug!(
                        "Accepted swap of medoid {} ({} -> {}). Cost: {:.6} -> {:.6}",
                        m,
                        current.medoids[m],
                        trial,
                        cost,
                        new_cost
                    );
                    current = candidate;
                    cost = new_cost;
                    n_rejected = 0;
                } else {
                    n_rejected += 1;
                }
            }

            log::debug!("Local minimum {} has cost {:.6}", minimum + 1, cost);

            let improved = best.as_ref().map(|b| cost < b.cost()).unwrap_or(true);
            if improved {
                best = Some(current);
            }
        }

        // num_local_minima is validated to be positive
        best.ok_or(ClusteringError::Config(ConfigError::InvalidNumLocalMinima))
    }
}

impl SubsampledClarans {
    /// Cluster the trajectories by running CLARANS on random subsamples of the frames.
    ///
    /// Each subsample uses its own random number generator derived from the seed,
    /// so the result does not depend on the number of threads.
    pub fn cluster<M: Metric>(
        &self,
        metric: &M,
        trajectories: &[Trajectory],
    ) -> Result<FlatClustering, ClusteringError> {
        self.validate()?;
        self.info();

        let (prepared, lengths) = prepare_input(metric, trajectories)?;
        let n_frames = prepared.n_frames();
        let sample_size = self.shrink_multiple() * self.n_clusters();
        if sample_size > n_frames {
            return Err(ClusteringError::SubsampleTooLarge(sample_size, n_frames));
        }

        let base_seed = self.random_seed().unwrap_or_else(rand::random::<u64>);
        let clarans = self.to_clarans();

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.n_threads())
            .build()
            .map_err(|e| ClusteringError::ThreadPool(e.to_string()))?;

        let candidates: Vec<Vec<usize>> = pool.install(|| {
            (0..self.num_samples())
                .into_par_iter()
                .map(|s| -> Result<Vec<usize>, ClusteringError> {
                    let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(s as u64));
                    let indices = sample(&mut rng, n_frames, sample_size).into_vec();
                    let subsample = prepared.select(&indices);

                    let result = clarans.search(metric, &subsample, &mut rng)?;
                    log::debug!("Subsample {} has cost {:.6}", s, result.cost());
                    Ok(result.medoids.iter().map(|&m| indices[m]).collect())
                })
                .collect::<Result<Vec<Vec<usize>>, ClusteringError>>()
        })?;

        let mut best: Option<MedoidAssignment> = None;
        for medoids in candidates {
            let candidate = MedoidAssignment::compute(metric, &prepared, medoids)?;
            let improved = best
                .as_ref()
                .map(|b| candidate.cost() < b.cost())
                .unwrap_or(true);
            if improved {
                best = Some(candidate);
            }
        }

        let best = best.ok_or(ClusteringError::Config(ConfigError::InvalidNumSamples))?;

        log::info!("Subsampled CLARANS finished. Total cost: {:.6}", best.cost());
        Ok(best.into_flat(lengths))
    }
}
