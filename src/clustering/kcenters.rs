// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Implementation of the k-centers clustering algorithm.

use crate::errors::ClusteringError;
use crate::input::KCenters;
use crate::metrics::{Metric, Prepared};
use crate::trajectory::Trajectory;

use super::{prepare_input, FlatClustering, MedoidAssignment};

impl KCenters {
    /// Cluster the trajectories using greedy farthest-point selection of generators.
    pub fn cluster<M: Metric>(
        &self,
        metric: &M,
        trajectories: &[Trajectory],
    ) -> Result<FlatClustering, ClusteringError> {
        self.validate()?;
        self.info();

        let (prepared, lengths) = prepare_input(metric, trajectories)?;
        let result = kcenters(
            metric,
            &prepared,
            self.n_clusters(),
            self.distance_cutoff(),
            self.seed(),
        )?;

        Ok(result.into_flat(lengths))
    }
}

/// Find generators in a prepared trajectory.
///
/// The first generator is the `seed` frame. Each next generator is the first frame
/// with the largest distance to its nearest generator. Stops when `n_clusters` generators
/// have been found or when no frame is farther than `distance_cutoff` from its generator.
pub(crate) fn kcenters<M: Metric>(
    metric: &M,
    prepared: &M::Prepared,
    n_clusters: Option<usize>,
    distance_cutoff: Option<f32>,
    seed: usize,
) -> Result<MedoidAssignment, ClusteringError> {
    let n_frames = prepared.n_frames();
    if n_frames == 0 {
        return Err(ClusteringError::NoFrames);
    }

    if seed >= n_frames {
        return Err(ClusteringError::SeedOutOfRange(seed, n_frames));
    }

    let mut generators: Vec<usize> = Vec::new();
    let mut assignments = vec![0usize; n_frames];
    let mut distances = vec![f32::INFINITY; n_frames];
    let mut next = seed;

    loop {
        if let Some(k) = n_clusters {
            if generators.len() >= k {
                break;
            }
        }

        let new_distances = metric.one_to_all(prepared, prepared, next)?;
        let cluster = generators.len();
        generators.push(next);

        for (j, &d) in new_distances.iter().enumerate() {
            if d < distances[j] {
                distances[j] = d;
                assignments[j] = cluster;
            }
        }

        let (farthest, max_distance) = first_max(&distances);
        log::debug!(
            "Generator {} (frame {}), maximal distance of a frame to its generator: {}",
            cluster,
            next,
            max_distance
        );

        if let Some(cutoff) = distance_cutoff {
            if max_distance <= cutoff {
                break;
            }
        }

        if max_distance <= 0.0 {
            if let Some(k) = n_clusters {
                if generators.len() < k {
                    log::warn!(
                        "All frames coincide with one of the {} generators. Stopping before reaching {} clusters.",
                        generators.len(),
                        k
                    );
                }
            }
            break;
        }

        next = farthest;
    }

    log::info!(
        "K-centers identified {} generators. Maximal distance of a frame to its generator: {}",
        generators.len(),
        distances.iter().copied().fold(0.0f32, f32::max)
    );

    Ok(MedoidAssignment {
        medoids: generators,
        assignments,
        distances,
    })
}

/// Index and value of the first maximum.
fn first_max(values: &[f32]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best_d), (i, d)| {
            if d > best_d {
                (i, d)
            } else {
                (best_i, best_d)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::euclidean::Euclidean;

    fn line(xs: &[f32]) -> Trajectory {
        Trajectory::from_frames(xs.iter().map(|&x| vec![[x, 0.0, 0.0]]).collect()).unwrap()
    }

    fn trajectories() -> Vec<Trajectory> {
        vec![line(&[0.0, 1.0, 2.0]), line(&[4.0]), line(&[8.0, 9.0, 10.0])]
    }

    #[test]
    fn two_clusters_single_atom() {
        let metric = Euclidean::new().build().unwrap();
        let kcenters = KCenters::new().n_clusters(2).seed(0).build().unwrap();
        let clustering = kcenters.cluster(&metric, &trajectories()).unwrap();

        assert_eq!(clustering.generator_indices(), &[0, 6]);

        let assignments = clustering.assignments();
        assert_eq!(assignments.row(0), &[0, 0, 0]);
        assert_eq!(assignments.row(1), &[0, -1, -1]);
        assert_eq!(assignments.row(2), &[1, 1, 1]);

        let distances = clustering.distances();
        assert_eq!(distances.row(0), &[0.0, 1.0, 2.0]);
        assert_eq!(distances.row(1), &[4.0, -1.0, -1.0]);
        assert_eq!(distances.row(2), &[2.0, 1.0, 0.0]);

        let generators = clustering.generators(&trajectories()).unwrap();
        assert_eq!(generators, line(&[0.0, 10.0]));
    }

    #[test]
    fn distance_cutoff() {
        let metric = Euclidean::new().build().unwrap();

        // after generators 0 and 10, the farthest frame is 4 (distance 4)
        // after adding 4, the maximal distance is 2
        let kcenters = KCenters::new().distance_cutoff(2.5).build().unwrap();
        let clustering = kcenters.cluster(&metric, &trajectories()).unwrap();
        assert_eq!(clustering.generator_indices(), &[0, 6, 3]);
        assert!(clustering.flat_distances().iter().all(|&d| d <= 2.5));

        let kcenters = KCenters::new().distance_cutoff(100.0).build().unwrap();
        let clustering = kcenters.cluster(&metric, &trajectories()).unwrap();
        assert_eq!(clustering.generator_indices(), &[0]);
    }

    #[test]
    fn different_seed() {
        let metric = Euclidean::new().build().unwrap();
        let kcenters = KCenters::new().n_clusters(3).seed(3).build().unwrap();
        let clustering = kcenters.cluster(&metric, &trajectories()).unwrap();

        // 4 -> 10 (distance 6) -> 0 (distance 4)
        assert_eq!(clustering.generator_indices(), &[3, 6, 0]);
        assert_eq!(clustering.flat_assignments(), &[2, 2, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn deterministic() {
        let metric = Euclidean::new().build().unwrap();
        let trajectories = vec![
            line(&[0.3, 7.1, 2.2, 9.9, 4.4]),
            line(&[5.5, 1.0, 8.8]),
            line(&[3.3, 6.6]),
        ];

        for seed in [0, 4, 9] {
            let kcenters = KCenters::new().n_clusters(4).seed(seed).build().unwrap();
            let first = kcenters.cluster(&metric, &trajectories).unwrap();
            let second = kcenters.cluster(&metric, &trajectories).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.generator_indices()[0], seed);
        }
    }

    #[test]
    fn more_clusters_than_distinct_frames() {
        let metric = Euclidean::new().build().unwrap();
        let trajectories = vec![line(&[1.0, 1.0, 3.0, 3.0])];
        let kcenters = KCenters::new().n_clusters(10).build().unwrap();
        let clustering = kcenters.cluster(&metric, &trajectories).unwrap();

        assert_eq!(clustering.generator_indices(), &[0, 2]);
        assert!(clustering.flat_distances().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn seed_out_of_range() {
        let metric = Euclidean::new().build().unwrap();
        let kcenters = KCenters::new().n_clusters(2).seed(7).build().unwrap();
        match kcenters.cluster(&metric, &trajectories()) {
            Err(ClusteringError::SeedOutOfRange(7, 7)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn no_frames() {
        let metric = Euclidean::new().build().unwrap();
        let kcenters = KCenters::new().n_clusters(2).build().unwrap();
        match kcenters.cluster(&metric, &[Trajectory::empty(1)]) {
            Err(ClusteringError::NoFrames) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn first_max_ties() {
        assert_eq!(first_max(&[1.0, 3.0, 2.0, 3.0]), (1, 3.0));
        assert_eq!(first_max(&[f32::INFINITY, f32::INFINITY]), (0, f32::INFINITY));
    }
}
