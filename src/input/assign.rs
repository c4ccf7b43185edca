// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Contains structures specifying how the frames are assigned to generators.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use getset::{CopyGetters, Getters};
use serde::Deserialize;

use crate::errors::ConfigError;

/// How the assignment is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum AssignMode {
    /// All results are kept in memory and written at the end.
    InMemory,
    /// Results are periodically committed to disk and an interrupted run can be resumed.
    #[default]
    Checkpointed,
    /// Like `Checkpointed`, but the trajectories are read in chunks.
    Streaming,
}

/// Parameters of a checkpointed assignment.
#[derive(Debug, Clone, Builder, Getters, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Assigner {
    /// Path to the assignments container.
    /// Distances are written into the same path with the `.distances` suffix.
    #[builder(setter(into))]
    #[getset(get = "pub")]
    output: String,
    /// Number of assigned trajectories after which the results are committed to disk.
    #[builder(default = "1")]
    #[serde(default = "default_checkpoint_interval")]
    #[getset(get_copy = "pub")]
    checkpoint_interval: usize,
    /// Maximal number of frames read at once in the streaming mode.
    #[builder(default = "10000")]
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

fn validate_checkpoint_interval(interval: usize) -> Result<(), ConfigError> {
    if interval == 0 {
        Err(ConfigError::InvalidCheckpointInterval)
    } else {
        Ok(())
    }
}

fn validate_chunk_size(chunk_size: usize) -> Result<(), ConfigError> {
    if chunk_size == 0 {
        Err(ConfigError::InvalidChunkSize)
    } else {
        Ok(())
    }
}

/// Append a suffix to a path without replacing its extension.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut string = path.as_os_str().to_owned();
    string.push(suffix);
    PathBuf::from(string)
}

impl Assigner {
    pub fn new() -> AssignerBuilder {
        AssignerBuilder::default()
    }

    /// Check that the Assigner structure is valid. Used after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_checkpoint_interval(self.checkpoint_interval)?;
        validate_chunk_size(self.chunk_size)
    }

    /// Path to the container with the assignments.
    pub fn assignments_path(&self) -> PathBuf {
        PathBuf::from(&self.output)
    }

    /// Path to the container with the distances.
    pub fn distances_path(&self) -> PathBuf {
        with_suffix(Path::new(&self.output), ".distances")
    }

    /// Path to the lock file preventing concurrent runs writing into the same output.
    pub fn lock_path(&self) -> PathBuf {
        with_suffix(Path::new(&self.output), ".lock")
    }

    pub(crate) fn info(&self) {
        log::info!(
            "Assignments will be written into '{}', distances into '{}'.",
            self.output,
            self.distances_path().to_string_lossy()
        );
        log::info!(
            "Committing after every {} trajectories.",
            self.checkpoint_interval
        );
    }
}

impl AssignerBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(interval) = self.checkpoint_interval {
            validate_checkpoint_interval(interval).map_err(|e| e.to_string())?;
        }

        if let Some(chunk_size) = self.chunk_size {
            validate_chunk_size(chunk_size).map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}
