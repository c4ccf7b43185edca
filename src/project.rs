// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Sources of trajectories: the project manifest read from a yaml file and an in-memory collection.

use std::fs::File;
use std::path::{Path, PathBuf};

use getset::Getters;
use groan_rs::errors::ReadTrajError;
use groan_rs::prelude::*;
use hashbrown::HashMap;
use serde::Deserialize;

use crate::clustering::GeneratorLocation;
use crate::errors::{ConfigError, ProjectError};
use crate::trajectory::Trajectory;

/// Collection of trajectories that can be iterated over, one trajectory at a time.
pub trait TrajectorySource {
    /// Number of trajectories.
    fn n_trajs(&self) -> usize;

    /// Expected number of frames of each trajectory.
    fn traj_lengths(&self) -> &[usize];

    /// Load a complete trajectory.
    fn load_traj(&self, index: usize) -> Result<Trajectory, ProjectError>;

    /// Does the source support reading trajectories in chunks?
    fn supports_chunks(&self) -> bool {
        false
    }

    /// Read trajectory `index` in consecutive chunks of at most `chunk_size` frames,
    /// passing each chunk to `consumer`. Sources without chunked reading load the whole
    /// trajectory and pass it as a single chunk.
    fn for_each_chunk<E, F>(
        &self,
        index: usize,
        _chunk_size: usize,
        mut consumer: F,
    ) -> Result<(), E>
    where
        E: From<ProjectError>,
        F: FnMut(Trajectory) -> Result<(), E>,
    {
        consumer(self.load_traj(index)?)
    }

    /// Load all trajectories of the source.
    fn load_all(&self) -> Result<Vec<Trajectory>, ProjectError> {
        (0..self.n_trajs()).map(|i| self.load_traj(i)).collect()
    }

    /// Extract frames at the specified locations into a single trajectory (in the specified order).
    /// Every trajectory is loaded at most once.
    fn extract_frames(&self, locations: &[GeneratorLocation]) -> Result<Trajectory, ProjectError> {
        let mut loaded: HashMap<usize, Trajectory> = HashMap::new();
        for location in locations {
            if location.trajectory >= self.n_trajs() {
                return Err(ProjectError::TrajectoryOutOfRange(
                    location.trajectory,
                    self.n_trajs(),
                ));
            }

            if !loaded.contains_key(&location.trajectory) {
                let traj = self.load_traj(location.trajectory)?;
                loaded.insert(location.trajectory, traj);
            }
        }

        let mut extracted: Option<Trajectory> = None;
        for location in locations {
            let traj = &loaded[&location.trajectory];
            if location.frame >= traj.n_frames() {
                return Err(ProjectError::FrameOutOfRange(
                    location.trajectory,
                    location.frame,
                    traj.n_frames(),
                ));
            }

            let output = extracted.get_or_insert_with(|| Trajectory::empty(traj.n_atoms()));
            if !output.push_frame(traj.frame(location.frame)) {
                return Err(ProjectError::InconsistentFrame(
                    traj.n_atoms(),
                    output.n_atoms(),
                ));
            }
        }

        Ok(extracted.unwrap_or_else(|| Trajectory::empty(0)))
    }
}

/// Trajectories held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProject {
    trajectories: Vec<Trajectory>,
    lengths: Vec<usize>,
}

impl InMemoryProject {
    pub fn new(trajectories: Vec<Trajectory>) -> Self {
        let lengths = trajectories.iter().map(|t| t.n_frames()).collect();
        InMemoryProject {
            trajectories,
            lengths,
        }
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }
}

impl TrajectorySource for InMemoryProject {
    #[inline(always)]
    fn n_trajs(&self) -> usize {
        self.trajectories.len()
    }

    #[inline(always)]
    fn traj_lengths(&self) -> &[usize] {
        &self.lengths
    }

    fn load_traj(&self, index: usize) -> Result<Trajectory, ProjectError> {
        self.trajectories
            .get(index)
            .cloned()
            .ok_or(ProjectError::TrajectoryOutOfRange(index, self.n_trajs()))
    }

    fn supports_chunks(&self) -> bool {
        true
    }

    fn for_each_chunk<E, F>(
        &self,
        index: usize,
        chunk_size: usize,
        mut consumer: F,
    ) -> Result<(), E>
    where
        E: From<ProjectError>,
        F: FnMut(Trajectory) -> Result<(), E>,
    {
        let traj = self
            .trajectories
            .get(index)
            .ok_or(ProjectError::TrajectoryOutOfRange(index, self.n_trajs()))?;

        let chunk_size = chunk_size.max(1);
        let mut start = 0;
        while start < traj.n_frames() {
            let end = (start + chunk_size).min(traj.n_frames());
            let indices: Vec<usize> = (start..end).collect();
            consumer(traj.select(&indices))?;
            start = end;
        }

        Ok(())
    }
}

/// Project manifest: a structure file and a list of trajectory files with their lengths.
/// Paths are relative to the directory containing the manifest.
#[derive(Debug, Clone, Getters, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    /// Path to the structure file (gro, pdb, tpr...) defining the atoms.
    #[getset(get = "pub")]
    conf_filename: String,
    /// Paths to the trajectory files (xtc, trr, gro or pdb).
    #[getset(get = "pub")]
    traj_paths: Vec<String>,
    /// Number of frames in each trajectory.
    traj_lengths: Vec<usize>,
    /// Directory relative to which the paths are resolved.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Supported formats of trajectory files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrajFormat {
    Xtc,
    Trr,
    Structure,
}

impl TrajFormat {
    fn from_path(path: &Path) -> Result<Self, ProjectError> {
        match path
            .extension()
            .and_then(|x| x.to_str())
            .map(|x| x.to_ascii_lowercase())
            .as_deref()
        {
            Some("xtc") => Ok(TrajFormat::Xtc),
            Some("trr") => Ok(TrajFormat::Trr),
            Some("gro") | Some("pdb") => Ok(TrajFormat::Structure),
            _ => Err(ProjectError::UnsupportedFormat(path.into())),
        }
    }
}

impl Project {
    /// Create a new project. Paths are resolved relative to `base_dir`.
    pub fn new(
        conf_filename: &str,
        traj_paths: Vec<String>,
        traj_lengths: Vec<usize>,
        base_dir: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let project = Project {
            conf_filename: conf_filename.to_owned(),
            traj_paths,
            traj_lengths,
            base_dir: base_dir.as_ref().to_path_buf(),
        };

        project.validate()?;
        Ok(project)
    }

    /// Read the project manifest from a yaml file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|_| ConfigError::CouldNotOpenConfig(path.to_string_lossy().to_string()))?;

        let mut project: Project = serde_yaml::from_reader(file).map_err(|e| {
            ConfigError::CouldNotParseConfig(path.to_string_lossy().to_string(), e)
        })?;

        project.base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();

        project.validate()?;
        Ok(project)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.traj_paths.len() != self.traj_lengths.len() {
            return Err(ConfigError::InconsistentProject(
                self.traj_paths.len(),
                self.traj_lengths.len(),
            ));
        }

        if self.traj_paths.is_empty() {
            return Err(ConfigError::EmptyProject);
        }

        Ok(())
    }

    /// Log basic info about the project.
    pub(crate) fn info(&self) {
        log::info!(
            "Project with {} trajectories ({} frames in total).",
            self.traj_paths.len(),
            self.traj_lengths.iter().sum::<usize>()
        );
        log::info!("Structure file: {}", self.conf_path().to_string_lossy());
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Path to the structure file.
    pub fn conf_path(&self) -> PathBuf {
        self.resolve(&self.conf_filename)
    }

    fn read_structure(&self) -> Result<System, ProjectError> {
        let conf = self.conf_path();
        System::from_file(&conf)
            .map_err(|e| ProjectError::CouldNotReadStructure(conf.into_boxed_path(), e.to_string()))
    }

    /// Read trajectory `index` frame by frame, collecting frames into chunks.
    fn read_chunks<E, F>(&self, index: usize, chunk_size: usize, mut consumer: F) -> Result<(), E>
    where
        E: From<ProjectError>,
        F: FnMut(Trajectory) -> Result<(), E>,
    {
        let path = self
            .traj_paths
            .get(index)
            .map(|p| self.resolve(p))
            .ok_or(ProjectError::TrajectoryOutOfRange(index, self.n_trajs()))?;

        let format = TrajFormat::from_path(&path)?;
        let chunk_size = chunk_size.max(1);

        if format == TrajFormat::Structure {
            let system = System::from_file(&path).map_err(|e| {
                ProjectError::CouldNotReadTrajectory(path.clone().into_boxed_path(), e.to_string())
            })?;

            let mut traj = Trajectory::empty(system.get_n_atoms());
            traj.push_frame(&frame_coordinates(&system, &path)?);
            return consumer(traj);
        }

        let mut system = self.read_structure()?;
        let n_atoms = system.get_n_atoms();
        let read_error = |e: ReadTrajError| {
            ProjectError::CouldNotReadTrajectory(path.clone().into_boxed_path(), e.to_string())
        };

        let mut chunk = Trajectory::empty(n_atoms);
        let mut process = |frame: &System, chunk: &mut Trajectory| -> Result<(), E> {
            let coordinates = frame_coordinates(frame, &path)?;
            if !chunk.push_frame(&coordinates) {
                return Err(ProjectError::InconsistentFrame(coordinates.len(), n_atoms).into());
            }

            if chunk.n_frames() >= chunk_size {
                consumer(std::mem::replace(chunk, Trajectory::empty(n_atoms)))?;
            }

            Ok(())
        };

        match format {
            TrajFormat::Xtc => {
                for frame in system.xtc_iter(&path).map_err(read_error)? {
                    let frame = frame.map_err(read_error)?;
                    process(frame, &mut chunk)?;
                }
            }
            TrajFormat::Trr => {
                for frame in system.trr_iter(&path).map_err(read_error)? {
                    let frame = frame.map_err(read_error)?;
                    process(frame, &mut chunk)?;
                }
            }
            TrajFormat::Structure => unreachable!(
                "FATAL MICROSTATES ERROR | Project::read_chunks | Structure files should have been handled. {}",
                crate::PANIC_MESSAGE
            ),
        }

        drop(process);
        if !chunk.is_empty() {
            consumer(chunk)?;
        }

        Ok(())
    }
}

/// Collect coordinates of all atoms of the current frame.
fn frame_coordinates(system: &System, path: &Path) -> Result<Vec<[f32; 3]>, ProjectError> {
    system
        .atoms_iter()
        .enumerate()
        .map(|(i, atom)| {
            atom.get_position()
                .map(|p| [p.x, p.y, p.z])
                .ok_or_else(|| ProjectError::UndefinedPosition(i + 1, path.into()))
        })
        .collect()
}

impl TrajectorySource for Project {
    #[inline(always)]
    fn n_trajs(&self) -> usize {
        self.traj_paths.len()
    }

    #[inline(always)]
    fn traj_lengths(&self) -> &[usize] {
        &self.traj_lengths
    }

    fn load_traj(&self, index: usize) -> Result<Trajectory, ProjectError> {
        let mut chunks = Vec::new();
        self.read_chunks::<ProjectError, _>(index, usize::MAX, |chunk| {
            chunks.push(chunk);
            Ok(())
        })?;

        match chunks.pop() {
            Some(traj) => Ok(traj),
            None => Ok(Trajectory::empty(self.read_structure()?.get_n_atoms())),
        }
    }

    fn supports_chunks(&self) -> bool {
        true
    }

    fn for_each_chunk<E, F>(
        &self,
        index: usize,
        chunk_size: usize,
        consumer: F,
    ) -> Result<(), E>
    where
        E: From<ProjectError>,
        F: FnMut(Trajectory) -> Result<(), E>,
    {
        self.read_chunks(index, chunk_size, consumer)
    }
}
