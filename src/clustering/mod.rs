// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains the clustering algorithms and the structures describing their results.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::assigning::{
    argmin, AssignmentMatrix, DistanceMatrix, ASSIGNMENT_SENTINEL, DISTANCE_SENTINEL,
};
use crate::errors::{ClusteringError, WriteError};
use crate::input::ClusteringAlgorithm;
use crate::metrics::{Metric, Prepared};
use crate::presentation;
use crate::trajectory::Trajectory;
use crate::PANIC_MESSAGE;

pub mod clarans;
pub mod hierarchical;
pub mod kcenters;
pub mod kmedoids;

use hierarchical::MergeTree;

/// Position of a frame in a collection of trajectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneratorLocation {
    /// Index of the trajectory.
    pub trajectory: usize,
    /// Index of the frame in the trajectory.
    pub frame: usize,
}

impl GeneratorLocation {
    pub fn new(trajectory: usize, frame: usize) -> Self {
        GeneratorLocation { trajectory, frame }
    }

    /// Convert an index into concatenated trajectories into a location.
    /// Returns `None` if the index is out of range.
    pub fn from_global(index: usize, lengths: &[usize]) -> Option<Self> {
        let mut start = 0;
        for (trajectory, &len) in lengths.iter().enumerate() {
            if index < start + len {
                return Some(GeneratorLocation::new(trajectory, index - start));
            }
            start += len;
        }

        None
    }

    /// Read a list of locations from a yaml file.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<GeneratorLocation>, WriteError> {
        presentation::read_yaml(path)
    }

    /// Write a list of locations into a yaml file.
    /// If the file already exists, it is backed up unless `overwrite` is set.
    pub fn write_file(
        locations: &[GeneratorLocation],
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<(), WriteError> {
        presentation::write_yaml(path, &locations, overwrite, "generators")
    }
}

/// Result of a clustering algorithm.
#[derive(Debug, Clone)]
pub enum Clustering {
    Flat(FlatClustering),
    Hierarchical(MergeTree),
}

impl Clustering {
    pub fn as_flat(&self) -> Option<&FlatClustering> {
        match self {
            Clustering::Flat(x) => Some(x),
            Clustering::Hierarchical(_) => None,
        }
    }

    pub fn as_hierarchical(&self) -> Option<&MergeTree> {
        match self {
            Clustering::Flat(_) => None,
            Clustering::Hierarchical(x) => Some(x),
        }
    }
}

/// Partitioning of frames into clusters, each represented by a generator frame.
/// Cluster `i` is the cluster of generator `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatClustering {
    /// Indices of the generators in the concatenated input.
    generator_indices: Vec<usize>,
    /// Cluster index of every frame of the concatenated input.
    assignments: Vec<usize>,
    /// Distance of every frame to its generator.
    distances: Vec<f32>,
    /// Lengths of the clustered trajectories.
    traj_lengths: Vec<usize>,
}

impl FlatClustering {
    pub(crate) fn new(
        generator_indices: Vec<usize>,
        assignments: Vec<usize>,
        distances: Vec<f32>,
        traj_lengths: Vec<usize>,
    ) -> Self {
        debug_assert_eq!(assignments.len(), distances.len());
        debug_assert_eq!(assignments.len(), traj_lengths.iter().sum::<usize>());

        FlatClustering {
            generator_indices,
            assignments,
            distances,
            traj_lengths,
        }
    }

    /// Number of clusters.
    #[inline(always)]
    pub fn n_clusters(&self) -> usize {
        self.generator_indices.len()
    }

    /// Indices of the generators in the concatenated input.
    #[inline(always)]
    pub fn generator_indices(&self) -> &[usize] {
        &self.generator_indices
    }

    /// Cluster index of every frame of the concatenated input.
    #[inline(always)]
    pub fn flat_assignments(&self) -> &[usize] {
        &self.assignments
    }

    /// Distance of every frame of the concatenated input to its generator.
    #[inline(always)]
    pub fn flat_distances(&self) -> &[f32] {
        &self.distances
    }

    #[inline(always)]
    pub fn traj_lengths(&self) -> &[usize] {
        &self.traj_lengths
    }

    /// Locations of the generators in the clustered trajectories.
    pub fn generator_locations(&self) -> Vec<GeneratorLocation> {
        self.generator_indices
            .iter()
            .map(|&i| {
                GeneratorLocation::from_global(i, &self.traj_lengths).unwrap_or_else(|| {
                    panic!(
                        "FATAL MICROSTATES ERROR | FlatClustering::generator_locations | Generator index '{}' is out of range. {}",
                        i, PANIC_MESSAGE
                    )
                })
            })
            .collect()
    }

    /// Extract the generator frames from the clustered trajectories.
    pub fn generators(&self, trajectories: &[Trajectory]) -> Result<Trajectory, ClusteringError> {
        let concatenated = concatenate(trajectories)?;
        if concatenated.n_frames() != self.assignments.len() {
            return Err(ClusteringError::NotEnoughFrames(
                self.assignments.len(),
                concatenated.n_frames(),
            ));
        }

        Ok(concatenated.select(&self.generator_indices))
    }

    /// Cluster index of every frame of every trajectory.
    pub fn assignments(&self) -> AssignmentMatrix {
        let values: Vec<i32> = self.assignments.iter().map(|&x| x as i32).collect();
        AssignmentMatrix::from_concatenated(&self.traj_lengths, &values, ASSIGNMENT_SENTINEL)
    }

    /// Distance of every frame of every trajectory to its generator.
    pub fn distances(&self) -> DistanceMatrix {
        DistanceMatrix::from_concatenated(&self.traj_lengths, &self.distances, DISTANCE_SENTINEL)
    }

    /// Sum of distances of all frames to their generators.
    pub fn total_cost(&self) -> f64 {
        self.distances.iter().map(|&d| d as f64).sum()
    }
}

impl ClusteringAlgorithm {
    /// Cluster the trajectories using the selected algorithm.
    pub fn cluster<M: Metric>(
        &self,
        metric: &M,
        trajectories: &[Trajectory],
    ) -> Result<Clustering, ClusteringError> {
        match self {
            Self::KCenters(x) => x.cluster(metric, trajectories).map(Clustering::Flat),
            Self::HybridKMedoids(x) => x.cluster(metric, trajectories).map(Clustering::Flat),
            Self::Clarans(x) => x.cluster(metric, trajectories).map(Clustering::Flat),
            Self::SubsampledClarans(x) => x.cluster(metric, trajectories).map(Clustering::Flat),
            Self::Hierarchical(x) => x.cluster(metric, trajectories).map(Clustering::Hierarchical),
        }
    }
}

/// Concatenate trajectories checking that they contain the same number of atoms.
fn concatenate(trajectories: &[Trajectory]) -> Result<Trajectory, ClusteringError> {
    Trajectory::concatenate(trajectories).ok_or_else(|| {
        let reference = trajectories
            .iter()
            .find(|t| !t.is_empty())
            .map(|t| t.n_atoms())
            .unwrap_or(0);

        let other = trajectories
            .iter()
            .find(|t| !t.is_empty() && t.n_atoms() != reference)
            .map(|t| t.n_atoms())
            .unwrap_or(0);

        ClusteringError::InconsistentAtoms(reference, other)
    })
}

/// Concatenate and prepare the trajectories. Returns the prepared trajectory and lengths of the input trajectories.
pub(crate) fn prepare_input<M: Metric>(
    metric: &M,
    trajectories: &[Trajectory],
) -> Result<(M::Prepared, Vec<usize>), ClusteringError> {
    let concatenated = concatenate(trajectories)?;
    if concatenated.is_empty() {
        return Err(ClusteringError::NoFrames);
    }

    let lengths = trajectories.iter().map(|t| t.n_frames()).collect();
    let prepared = metric.prepare(&concatenated)?;
    log::info!(
        "Clustering {} frames from {} trajectories.",
        prepared.n_frames(),
        trajectories.len()
    );

    Ok((prepared, lengths))
}

/// Create a random number generator from an optional seed.
pub(crate) fn create_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(rand::random::<u64>);
    log::debug!("Random seed: {}", seed);
    StdRng::seed_from_u64(seed)
}

/// Assignment of frames to a set of medoids.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MedoidAssignment {
    /// Indices of the medoids (frames of the prepared trajectory).
    pub medoids: Vec<usize>,
    /// Index into `medoids` for every frame.
    pub assignments: Vec<usize>,
    /// Distance of every frame to its medoid.
    pub distances: Vec<f32>,
}

impl MedoidAssignment {
    /// Assign every frame to its nearest medoid (the first one in case of ties).
    pub fn compute<M: Metric>(
        metric: &M,
        prepared: &M::Prepared,
        medoids: Vec<usize>,
    ) -> Result<Self, ClusteringError> {
        let n = prepared.n_frames();
        let mut assignments = vec![0usize; n];
        let mut distances = vec![f32::INFINITY; n];

        for (m, &medoid) in medoids.iter().enumerate() {
            let d = metric.one_to_all(prepared, prepared, medoid)?;
            for (j, &dist) in d.iter().enumerate() {
                if dist < distances[j] {
                    distances[j] = dist;
                    assignments[j] = m;
                }
            }
        }

        Ok(MedoidAssignment {
            medoids,
            assignments,
            distances,
        })
    }

    /// Replace medoid `m` by frame `trial` and update the assignment.
    ///
    /// Frames closer to the trial than to their current medoid move to the trial.
    /// Remaining frames of the replaced medoid are reassigned against the new set of medoids.
    pub fn swap<M: Metric>(
        &self,
        metric: &M,
        prepared: &M::Prepared,
        m: usize,
        trial: usize,
    ) -> Result<Self, ClusteringError> {
        let d_trial = metric.one_to_all(prepared, prepared, trial)?;
        let mut swapped = self.clone();
        swapped.medoids[m] = trial;

        let mut ambiguous = Vec::new();
        for (j, &d) in d_trial.iter().enumerate() {
            if d < self.distances[j] {
                swapped.assignments[j] = m;
                swapped.distances[j] = d;
            } else if self.assignments[j] == m {
                ambiguous.push(j);
            }
        }

        for l in ambiguous {
            let d = metric.one_to_many(prepared, prepared, l, &swapped.medoids)?;
            let (nearest, distance) = argmin(&d);
            swapped.assignments[l] = nearest;
            swapped.distances[l] = distance;
        }

        Ok(swapped)
    }

    /// Is the frame one of the medoids?
    pub fn is_medoid(&self, frame: usize) -> bool {
        self.medoids.contains(&frame)
    }

    /// Maximal distance of a frame to its medoid.
    pub fn max_distance(&self) -> f32 {
        self.distances.iter().copied().fold(0.0f32, f32::max)
    }

    /// Sum of distances of all frames to their medoids.
    pub fn cost(&self) -> f64 {
        self.distances.iter().map(|&d| d as f64).sum()
    }

    /// Indices of frames assigned to medoid `m`.
    pub fn members(&self, m: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter_map(|(j, &a)| if a == m { Some(j) } else { None })
            .collect()
    }

    pub fn into_flat(self, traj_lengths: Vec<usize>) -> FlatClustering {
        FlatClustering::new(self.medoids, self.assignments, self.distances, traj_lengths)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn location_from_global() {
        let lengths = [3, 1, 3];
        assert_eq!(
            GeneratorLocation::from_global(0, &lengths),
            Some(GeneratorLocation::new(0, 0))
        );
        assert_eq!(
            GeneratorLocation::from_global(3, &lengths),
            Some(GeneratorLocation::new(1, 0))
        );
        assert_eq!(
            GeneratorLocation::from_global(6, &lengths),
            Some(GeneratorLocation::new(2, 2))
        );
        assert_eq!(GeneratorLocation::from_global(7, &lengths), None);
    }

    #[test]
    fn locations_file() {
        let locations = vec![GeneratorLocation::new(0, 0), GeneratorLocation::new(2, 2)];
        let file = NamedTempFile::new().unwrap();

        GeneratorLocation::write_file(&locations, file.path(), true).unwrap();
        let read = GeneratorLocation::read_file(file.path()).unwrap();
        assert_eq!(read, locations);
    }

    #[test]
    fn locations_file_missing() {
        match GeneratorLocation::read_file("this/file/does/not/exist.yaml") {
            Err(WriteError::CouldNotReadFile(_)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn flat_clustering_matrices() {
        let clustering = FlatClustering::new(
            vec![0, 6],
            vec![0, 0, 0, 0, 1, 1, 1],
            vec![0.0, 1.0, 2.0, 4.0, 2.0, 1.0, 0.0],
            vec![3, 1, 3],
        );

        assert_eq!(clustering.n_clusters(), 2);
        assert_eq!(
            clustering.generator_locations(),
            vec![GeneratorLocation::new(0, 0), GeneratorLocation::new(2, 2)]
        );

        let assignments = clustering.assignments();
        assert_eq!(assignments.shape(), (3, 3));
        assert_eq!(assignments.row(1), &[0, -1, -1]);

        let distances = clustering.distances();
        assert_eq!(distances.row(2), &[2.0, 1.0, 0.0]);
        assert_eq!(clustering.total_cost(), 10.0);
    }

    #[test]
    fn inconsistent_atoms() {
        let trajectories = vec![
            Trajectory::from_frames(vec![vec![[0.0; 3]]]).unwrap(),
            Trajectory::from_frames(vec![vec![[0.0; 3], [1.0; 3]]]).unwrap(),
        ];

        match concatenate(&trajectories) {
            Err(ClusteringError::InconsistentAtoms(1, 2)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }
}
