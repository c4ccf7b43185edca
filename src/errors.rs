// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains error types that can be returned by the `microstates` crate.

use std::path::Path;

use colored::{ColoredString, Colorize};
use thiserror::Error;

fn path_to_yellow(path: &Path) -> ColoredString {
    path.to_string_lossy().yellow()
}

/// Errors that can occur inside the application itself.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{} could not read the job file '{}'", "error:".red().bold(), .0.yellow())]
    CouldNotReadJob(String),
    #[error("{} could not understand the contents of the job file '{}' ({})", "error:".red().bold(), .0.yellow(), .1)]
    CouldNotParseJob(String, serde_yaml::Error),

    #[error("{}", .0)]
    Config(#[from] ConfigError),
}

/// Errors that can occur when constructing or validating the configuration
/// of a metric, a clustering algorithm, an assignment run or a project.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{} could not open the configuration file '{}'", "error:".red().bold(), .0.yellow())]
    CouldNotOpenConfig(String),

    #[error("{} could not understand the contents of the configuration file '{}' ({})", "error:".red().bold(), .0.yellow(), .1)]
    CouldNotParseConfig(String, serde_yaml::Error),

    #[error("{} neither the number of clusters nor the distance cut-off has been specified (specify exactly one of them)", "error:".red().bold())]
    NoStoppingCriterion,

    #[error("{} both the number of clusters and the distance cut-off have been specified (specify exactly one of them)", "error:".red().bold())]
    AmbiguousStoppingCriterion,

    #[error("{} the number of clusters must be a positive integer", "error:".red().bold())]
    InvalidNClusters,

    #[error("{} the distance cut-off ('{}') must be a non-negative number", "error:".red().bold(), .0.to_string().yellow())]
    InvalidDistanceCutoff(f32),

    #[error("{} the number of local minima to search for must be a positive integer", "error:".red().bold())]
    InvalidNumLocalMinima,

    #[error("{} the maximal number of neighbors to search must be a positive integer", "error:".red().bold())]
    InvalidMaxNeighbors,

    #[error("{} the number of subsamples must be a positive integer", "error:".red().bold())]
    InvalidNumSamples,

    #[error("{} the shrink multiple must be a positive integer", "error:".red().bold())]
    InvalidShrinkMultiple,

    #[error("{} the norm exponent ('{}') must be a positive number", "error:".red().bold(), .0.to_string().yellow())]
    InvalidNormExponent(f32),

    #[error("{} the 'too close' cut-off ('{}') must be a non-negative number", "error:".red().bold(), .0.to_string().yellow())]
    InvalidTooCloseCutoff(f32),

    #[error("{} unknown linkage method '{}' (available: single, complete, average, weighted, centroid, median, ward)", "error:".red().bold(), .0.yellow())]
    UnknownLinkageMethod(String),

    #[error("{} the number of threads must be a positive integer", "error:".red().bold())]
    InvalidNThreads,

    #[error("{} could not create a pool of '{}' threads ({})", "error:".red().bold(), .0.to_string().yellow(), .1)]
    CouldNotCreateThreadPool(usize, String),

    #[error("{} the list of atom indices is empty", "error:".red().bold())]
    EmptyAtomSelection,

    #[error("{} the checkpoint interval must be a positive integer", "error:".red().bold())]
    InvalidCheckpointInterval,

    #[error("{} the chunk size must be a positive integer", "error:".red().bold())]
    InvalidChunkSize,

    #[error("{} the stride must be a positive integer", "error:".red().bold())]
    InvalidStride,

    #[error("{} subsampled CLARANS can not be combined with a stride of '{}' (use '{}' to control the subsampling)", "error:".red().bold(), .0.to_string().yellow(), "shrink_multiple".yellow())]
    StridedSubsampling(usize),

    #[error("{} the project lists '{}' trajectory paths but '{}' trajectory lengths", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    InconsistentProject(usize, usize),

    #[error("{} the project contains no trajectories", "error:".red().bold())]
    EmptyProject,

    #[error("{} output file for the {} has not been specified (use '{}')", "error:".red().bold(), .0, .1.yellow())]
    MissingOutput(String, String),
}

/// Errors that can occur when calculating distances between structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("{} frame index '{}' is out of range for a trajectory with '{}' frames", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    FrameOutOfRange(usize, usize),

    #[error("{} atom index '{}' is out of range for a trajectory with '{}' atoms", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    AtomIndexOutOfRange(usize, usize),

    #[error("{} can not compare prepared trajectories with '{}' and '{}' atoms", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    IncompatibleTrajectories(usize, usize),

    #[error("{} can not calculate pairwise distances for an empty trajectory", "error:".red().bold())]
    EmptyTrajectory,

    #[error("{} {}", "error:".red().bold(), .0)]
    ThreadPool(String),
}

/// Errors that can occur while clustering the trajectories.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("{}", .0)]
    Metric(#[from] MetricError),

    #[error("{}", .0)]
    Config(#[from] ConfigError),

    #[error("{} there are no frames to cluster", "error:".red().bold())]
    NoFrames,

    #[error("{} the seed frame '{}' is out of range for '{}' frames", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    SeedOutOfRange(usize, usize),

    #[error("{} can not select '{}' generators from '{}' frames", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    NotEnoughFrames(usize, usize),

    #[error("{} subsample size ('{}' = shrink multiple x number of clusters) is larger than the number of frames ('{}')", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    SubsampleTooLarge(usize, usize),

    #[error("{} trajectories contain different numbers of atoms ('{}' vs '{}')", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    InconsistentAtoms(usize, usize),

    #[error("{} could not read the merge tree from '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotReadMergeTree(Box<Path>),

    #[error("{} could not parse the merge tree in '{}' ({})", "error:".red().bold(), path_to_yellow(.0), .1)]
    CouldNotParseMergeTree(Box<Path>, serde_yaml::Error),

    #[error("{} the merge tree is corrupted (row '{}' refers to an unknown cluster)", "error:".red().bold(), .0.to_string().yellow())]
    CorruptedMergeTree(usize),

    #[error("{}", .0)]
    Write(#[from] WriteError),

    #[error("{} {}", "error:".red().bold(), .0)]
    ThreadPool(String),
}

/// Errors that can occur while reading trajectories of a project.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("{} trajectory index '{}' is out of range for a project with '{}' trajectories", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    TrajectoryOutOfRange(usize, usize),

    #[error("{} frame '{}' is out of range for trajectory '{}' with '{}' frames", "error:".red().bold(), .1.to_string().yellow(), .0.to_string().yellow(), .2.to_string().yellow())]
    FrameOutOfRange(usize, usize, usize),

    #[error("{} could not read the structure file '{}' ({})", "error:".red().bold(), path_to_yellow(.0), .1)]
    CouldNotReadStructure(Box<Path>, String),

    #[error("{} could not read the trajectory file '{}' ({})", "error:".red().bold(), path_to_yellow(.0), .1)]
    CouldNotReadTrajectory(Box<Path>, String),

    #[error("{} trajectory file '{}' has an unsupported format (supported: xtc, trr, gro, pdb)", "error:".red().bold(), path_to_yellow(.0))]
    UnsupportedFormat(Box<Path>),

    #[error("{} atom number '{}' has an undefined position in '{}'", "error:".red().bold(), .0.to_string().yellow(), path_to_yellow(.1))]
    UndefinedPosition(usize, Box<Path>),

    #[error("{} frame contains '{}' atoms, expected '{}'", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow())]
    InconsistentFrame(usize, usize),
}

/// Errors that can occur while assigning frames to generators.
#[derive(Error, Debug)]
pub enum AssignmentError {
    #[error("{}", .0)]
    Metric(#[from] MetricError),

    #[error("{}", .0)]
    Project(#[from] ProjectError),

    #[error("{} the set of generators is empty", "error:".red().bold())]
    NoGenerators,

    #[error("{} the project has '{}' trajectories, but the checkpoint file '{}' has '{}'", "error:".red().bold(), .0.to_string().yellow(), path_to_yellow(.1), .2.to_string().yellow())]
    TrajectoryCountMismatch(usize, Box<Path>, usize),

    #[error("{} the longest trajectory of the project has '{}' frames, but rows of the checkpoint file '{}' have '{}' entries", "error:".red().bold(), .0.to_string().yellow(), path_to_yellow(.1), .2.to_string().yellow())]
    ShapeMismatch(usize, Box<Path>, usize),

    #[error("{} checkpoint file '{}' exists, but its counterpart '{}' is missing", "error:".red().bold(), path_to_yellow(.0), path_to_yellow(.1))]
    MissingContainer(Box<Path>, Box<Path>),

    #[error("{} checkpoint files '{}' and '{}' disagree on which trajectories are completed", "error:".red().bold(), path_to_yellow(.0), path_to_yellow(.1))]
    InconsistentFlags(Box<Path>, Box<Path>),

    #[error("{} trajectory '{}' is marked as completed in checkpoint file '{}', but some of its frames are not assigned", "error:".red().bold(), .1.to_string().yellow(), path_to_yellow(.0))]
    IncompleteTrajectory(Box<Path>, usize),

    #[error("{} trajectory '{}' is expected to have '{}' frames but '{}' frames were read", "error:".red().bold(), .0.to_string().yellow(), .1.to_string().yellow(), .2.to_string().yellow())]
    LengthMismatch(usize, usize, usize),

    #[error("{} output '{}' is locked by another running assignment (lock file '{}')", "error:".red().bold(), path_to_yellow(.0), path_to_yellow(.1))]
    Locked(Box<Path>, Box<Path>),

    #[error("{} could not lock file '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotLock(Box<Path>),

    #[error("{} could not create directory '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotCreateDirectory(Box<Path>),

    #[error("{} could not read checkpoint file '{}' ({})", "error:".red().bold(), path_to_yellow(.0), .1)]
    CouldNotReadCheckpoint(Box<Path>, String),

    #[error("{} could not write checkpoint file '{}' ({})", "error:".red().bold(), path_to_yellow(.0), .1)]
    CouldNotWriteCheckpoint(Box<Path>, String),

    #[error("{} could not move checkpoint file '{}' to '{}'", "error:".red().bold(), path_to_yellow(.0), path_to_yellow(.1))]
    CouldNotRenameCheckpoint(Box<Path>, Box<Path>),
}

/// Errors that can occur while writing the results.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{} could not create file '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotCreateFile(Box<Path>),

    #[error("{} could not create a backup for file '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotBackupFile(Box<Path>),

    #[error("{} could not write yaml into '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotWriteYaml(Box<Path>),

    #[error("{} could not read file '{}'", "error:".red().bold(), path_to_yellow(.0))]
    CouldNotReadFile(Box<Path>),

    #[error("{} could not parse yaml file '{}' ({})", "error:".red().bold(), path_to_yellow(.0), .1)]
    CouldNotParseYaml(Box<Path>, serde_yaml::Error),
}
