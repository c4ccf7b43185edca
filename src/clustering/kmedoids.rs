// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Implementation of the hybrid k-medoids clustering algorithm.

use rand::Rng;

use crate::errors::ClusteringError;
use crate::input::HybridKMedoids;
use crate::metrics::{Metric, Prepared};
use crate::trajectory::Trajectory;

use super::kcenters::kcenters;
use super::{create_rng, prepare_input, FlatClustering, MedoidAssignment};

impl HybridKMedoids {
    /// Cluster the trajectories using k-centers followed by k-medoids refinement.
    pub fn cluster<M: Metric>(
        &self,
        metric: &M,
        trajectories: &[Trajectory],
    ) -> Result<FlatClustering, ClusteringError> {
        self.validate()?;
        self.info();

        let (prepared, lengths) = prepare_input(metric, trajectories)?;
        let initial = kcenters(metric, &prepared, self.n_clusters(), self.distance_cutoff(), 0)?;
        let refined = self.refine(metric, &prepared, initial)?;

        Ok(refined.into_flat(lengths))
    }

    /// Refine the medoids by proposing swaps.
    ///
    /// Each sweep visits every medoid and proposes a trial frame: a random member of the medoid's
    /// cluster in the local phase, any random frame in the global phase. The swap is accepted if
    /// the norm of the distances decreases and (unless ignored) the maximal distance does not increase.
    pub(crate) fn refine<M: Metric>(
        &self,
        metric: &M,
        prepared: &M::Prepared,
        initial: MedoidAssignment,
    ) -> Result<MedoidAssignment, ClusteringError> {
        let mut rng = create_rng(self.random_seed());
        let n_frames = prepared.n_frames();
        let n_medoids = initial.medoids.len();

        let mut current = initial;
        let mut objective = norm(&current.distances, self.norm_exponent());
        let mut max_distance = current.max_distance();
        log::info!(
            "Initial objective: {:.6}, maximal distance: {:.6}",
            objective,
            max_distance
        );

        let n_sweeps = self.local_num_iters() + self.global_num_iters();
        for sweep in 0..n_sweeps {
            let local = sweep < self.local_num_iters();
            let mut n_accepted = 0;

            for m in 0..n_medoids {
                let trial = if local {
                    let members = current.members(m);
                    if members.is_empty() {
                        continue;
                    }
                    let trial = members[rng.random_range(0..members.len())];
                    if current.distances[trial] < self.too_close_cutoff() {
                        continue;
                    }
                    trial
                } else {
                    rng.random_range(0..n_frames)
                };

                if current.is_medoid(trial) {
                    continue;
                }

                let candidate = current.swap(metric, prepared, m, trial)?;
                let new_objective = norm(&candidate.distances, self.norm_exponent());
                let new_max_distance = candidate.max_distance();

                if new_objective < objective
                    && (new_max_distance <= max_distance || self.ignore_max_objective())
                {
                    log::debug!(
                        "Accepted swap of medoid {} ({} -> {}). Objective: {:.6} -> {:.6}",
                        m,
                        current.medoids[m],
                        trial,
                        objective,
                        new_objective
                    );
                    current = candidate;
                    objective = new_objective;
                    max_distance = new_max_distance;
                    n_accepted += 1;
                } else {
                    log::debug!(
                        "Rejected swap of medoid {} ({} -> {}). Objective: {:.6}, maximal distance: {:.6}",
                        m,
                        current.medoids[m],
                        trial,
                        new_objective,
                        new_max_distance
                    );
                }
            }

            log::info!(
                "Sweep {} ({}): accepted {} swaps, objective: {:.6}, maximal distance: {:.6}",
                sweep + 1,
                if local { "local" } else { "global" },
                n_accepted,
                objective,
                max_distance
            );
        }

        Ok(current)
    }
}

/// Calculate the p-norm of the distances normalized by their number.
pub(crate) fn norm(distances: &[f32], exponent: f32) -> f64 {
    if distances.is_empty() {
        return 0.0;
    }

    let p = exponent as f64;
    let sum: f64 = distances.iter().map(|&d| (d as f64).powf(p)).sum();
    (sum / distances.len() as f64).powf(1.0 / p)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::input::KCenters;
    use crate::metrics::euclidean::Euclidean;

    fn line(xs: &[f32]) -> Trajectory {
        Trajectory::from_frames(xs.iter().map(|&x| vec![[x, 0.0, 0.0]]).collect()).unwrap()
    }

    fn uniform() -> Vec<Trajectory> {
        vec![
            line(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
            line(&[6.0, 7.0, 8.0, 9.0, 10.0]),
        ]
    }

    #[test]
    fn norm_values() {
        assert_relative_eq!(norm(&[3.0, 4.0], 2.0), (12.5f64).sqrt());
        assert_relative_eq!(norm(&[1.0, 2.0, 3.0], 1.0), 2.0);
        assert_eq!(norm(&[], 2.0), 0.0);
    }

    #[test]
    fn improves_kcenters() {
        let metric = Euclidean::new().build().unwrap();
        let trajectories = uniform();

        let kcenters = KCenters::new().n_clusters(2).build().unwrap();
        let initial = kcenters.cluster(&metric, &trajectories).unwrap();
        assert_eq!(initial.generator_indices(), &[0, 10]);

        let hybrid = HybridKMedoids::new()
            .n_clusters(2)
            .random_seed(42)
            .build()
            .unwrap();
        let refined = hybrid.cluster(&metric, &trajectories).unwrap();

        assert_eq!(refined.n_clusters(), 2);
        assert_ne!(refined.generator_indices()[0], refined.generator_indices()[1]);

        let before = norm(initial.flat_distances(), 2.0);
        let after = norm(refined.flat_distances(), 2.0);
        assert!(after < before);

        let max_before = initial.flat_distances().iter().copied().fold(0.0f32, f32::max);
        let max_after = refined.flat_distances().iter().copied().fold(0.0f32, f32::max);
        assert!(max_after <= max_before);
    }

    #[test]
    fn assignments_consistent() {
        let metric = Euclidean::new().build().unwrap();
        let trajectories = uniform();
        let hybrid = HybridKMedoids::new()
            .n_clusters(3)
            .global_num_iters(5)
            .random_seed(7)
            .build()
            .unwrap();
        let clustering = hybrid.cluster(&metric, &trajectories).unwrap();

        let xs: Vec<f32> = (0..11).map(|x| x as f32).collect();
        let generators: Vec<f32> = clustering
            .generator_indices()
            .iter()
            .map(|&i| xs[i])
            .collect();

        // every frame is assigned to its nearest medoid
        for (i, &x) in xs.iter().enumerate() {
            let assigned = clustering.flat_assignments()[i];
            let distance = clustering.flat_distances()[i];
            assert_relative_eq!(distance, (x - generators[assigned]).abs());
            for &g in &generators {
                assert!(distance <= (x - g).abs() + 1e-6);
            }
        }
    }

    #[test]
    fn reproducible() {
        let metric = Euclidean::new().build().unwrap();
        let trajectories = uniform();
        let hybrid = HybridKMedoids::new()
            .n_clusters(3)
            .global_num_iters(3)
            .random_seed(123)
            .build()
            .unwrap();

        let first = hybrid.cluster(&metric, &trajectories).unwrap();
        let second = hybrid.cluster(&metric, &trajectories).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_iterations_equals_kcenters() {
        let metric = Euclidean::new().build().unwrap();
        let trajectories = uniform();
        let hybrid = HybridKMedoids::new()
            .n_clusters(3)
            .local_num_iters(0)
            .build()
            .unwrap();
        let kcenters = KCenters::new().n_clusters(3).build().unwrap();

        assert_eq!(
            hybrid.cluster(&metric, &trajectories).unwrap(),
            kcenters.cluster(&metric, &trajectories).unwrap()
        );
    }
}
