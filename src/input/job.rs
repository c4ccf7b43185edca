// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Contains the structures describing a single run of the `microstates` binary.

use std::fs::read_to_string;
use std::path::Path;

use getset::{CopyGetters, Getters};
use serde::Deserialize;

use crate::errors::{ApplicationError, ConfigError};
use crate::metrics::euclidean::Euclidean;
use crate::metrics::rmsd::Rmsd;

use super::{AssignMode, Assigner, ClusteringAlgorithm};

/// Metric to use together with its parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum MetricType {
    Rmsd(Rmsd),
    Euclidean(Euclidean),
}

impl MetricType {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Rmsd(x) => x.validate(),
            Self::Euclidean(x) => x.validate(),
        }
    }

    pub(crate) fn info(&self) {
        match self {
            Self::Rmsd(x) => x.info(),
            Self::Euclidean(x) => x.info(),
        }
    }
}

/// Job file: a single clustering or assignment run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum Job {
    Cluster(ClusterJob),
    Assign(AssignJob),
    AssignHierarchical(AssignHierarchicalJob),
}

/// Cluster the frames of a project.
#[derive(Debug, Clone, Getters, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterJob {
    /// Path to the project manifest.
    #[getset(get = "pub")]
    project: String,
    #[getset(get = "pub")]
    metric: MetricType,
    #[getset(get = "pub")]
    algorithm: ClusteringAlgorithm,
    /// Only every `stride`-th frame of each trajectory is clustered.
    #[serde(default = "default_stride")]
    #[getset(get_copy = "pub")]
    stride: usize,
    /// Output yaml file for the locations of the generators (flat algorithms).
    #[serde(default)]
    #[getset(get = "pub")]
    output_generators: Option<String>,
    /// Output yaml file for the assignments (flat algorithms without stride).
    #[serde(default)]
    #[getset(get = "pub")]
    output_assignments: Option<String>,
    /// Output yaml file for the distances of frames to their generators (flat algorithms, no stride).
    #[serde(default)]
    #[getset(get = "pub")]
    output_distances: Option<String>,
    /// Output yaml file for the merge tree (hierarchical clustering).
    #[serde(default)]
    #[getset(get = "pub")]
    output_merge_tree: Option<String>,
    /// Overwrite existing output files instead of backing them up.
    #[serde(default)]
    #[getset(get_copy = "pub")]
    overwrite: bool,
}

fn default_stride() -> usize {
    1
}

impl ClusterJob {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stride == 0 {
            return Err(ConfigError::InvalidStride);
        }

        self.metric.validate()?;
        self.algorithm.validate()?;

        // subsampled CLARANS performs its own subsampling
        if matches!(self.algorithm, ClusteringAlgorithm::SubsampledClarans(_)) && self.stride != 1 {
            return Err(ConfigError::StridedSubsampling(self.stride));
        }

        if self.algorithm.is_hierarchical() {
            if self.output_merge_tree.is_none() {
                return Err(ConfigError::MissingOutput(
                    "merge tree".to_owned(),
                    "output_merge_tree".to_owned(),
                ));
            }
        } else if self.output_generators.is_none() {
            return Err(ConfigError::MissingOutput(
                "generators".to_owned(),
                "output_generators".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Assign all frames of a project to generators identified by an earlier clustering.
#[derive(Debug, Clone, Getters, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignJob {
    /// Path to the project manifest.
    #[getset(get = "pub")]
    project: String,
    #[getset(get = "pub")]
    metric: MetricType,
    /// Path to the generator file written by a clustering job.
    #[getset(get = "pub")]
    generators: String,
    /// Path to the assignments container.
    #[getset(get = "pub")]
    output: String,
    #[serde(default)]
    #[getset(get_copy = "pub")]
    mode: AssignMode,
    #[serde(default = "default_checkpoint_interval")]
    #[getset(get_copy = "pub")]
    checkpoint_interval: usize,
    #[serde(default = "default_chunk_size")]
    #[getset(get_copy = "pub")]
    chunk_size: usize,
}

fn default_checkpoint_interval() -> usize {
    1
}

fn default_chunk_size() -> usize {
    10000
}

impl AssignJob {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.metric.validate()?;
        self.assigner().map(|_| ())
    }

    /// Construct the assigner described by the job.
    pub fn assigner(&self) -> Result<Assigner, ConfigError> {
        let assigner = Assigner::new()
            .output(self.output.as_str())
            .checkpoint_interval(self.checkpoint_interval)
            .chunk_size(self.chunk_size)
            .build();

        match assigner {
            Ok(x) => Ok(x),
            Err(_) if self.checkpoint_interval == 0 => Err(ConfigError::InvalidCheckpointInterval),
            Err(_) => Err(ConfigError::InvalidChunkSize),
        }
    }
}

/// Cut a merge tree into flat clusters.
#[derive(Debug, Clone, Getters, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignHierarchicalJob {
    /// Path to the merge tree written by a clustering job.
    #[getset(get = "pub")]
    merge_tree: String,
    #[serde(default, alias = "k")]
    #[getset(get_copy = "pub")]
    n_clusters: Option<usize>,
    #[serde(default, alias = "cutoff")]
    #[getset(get_copy = "pub")]
    distance_cutoff: Option<f32>,
    /// Output yaml file for the assignments.
    #[getset(get = "pub")]
    output: String,
    #[serde(default)]
    #[getset(get_copy = "pub")]
    overwrite: bool,
}

impl AssignHierarchicalJob {
    pub fn validate(&self) -> Result<(), ConfigError> {
        super::clustering::validate_criterion(self.n_clusters, self.distance_cutoff)
    }
}

impl Job {
    /// Read a job from a yaml file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Job, ApplicationError> {
        let name = path.as_ref().to_string_lossy().to_string();
        let string = read_to_string(&path)
            .map_err(|_| ApplicationError::CouldNotReadJob(name.clone()))?;
        let job: Job = serde_yaml::from_str(&string)
            .map_err(|e| ApplicationError::CouldNotParseJob(name.clone(), e))?;

        job.validate()?;
        Ok(job)
    }

    /// Check that the job is valid. Used after deserialization from the job file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Cluster(x) => x.validate(),
            Self::Assign(x) => x.validate(),
            Self::AssignHierarchical(x) => x.validate(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Cluster(_) => "clustering",
            Self::Assign(_) => "assignment",
            Self::AssignHierarchical(_) => "hierarchical assignment",
        }
    }

    /// Force overwriting of the output files.
    pub fn set_overwrite(&mut self) {
        match self {
            Self::Cluster(x) => x.overwrite = true,
            Self::AssignHierarchical(x) => x.overwrite = true,
            Self::Assign(_) => (),
        }
    }
}
