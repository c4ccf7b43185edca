// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Checkpointed assignment: results are periodically committed to disk
//! so that an interrupted run can be resumed.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs4::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::AssignmentError;
use crate::input::assign::with_suffix;
use crate::input::Assigner;
use crate::metrics::{Metric, Prepared};
use crate::project::TrajectorySource;
use crate::trajectory::Trajectory;

use super::{
    assign_prepared, check_length, AssignmentMatrix, DistanceMatrix, FrameMatrix,
    ASSIGNMENT_SENTINEL, DISTANCE_SENTINEL,
};

/// Persisted matrix of per-frame values together with flags marking completed trajectories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentContainer<T> {
    #[serde(rename = "Data")]
    data: FrameMatrix<T>,
    completed_trajs: Vec<bool>,
}

impl<T: Copy + PartialEq + Serialize + DeserializeOwned> AssignmentContainer<T> {
    /// Create a container with all values set to `sentinel` and no completed trajectories.
    pub fn new(n_trajs: usize, max_length: usize, sentinel: T) -> Self {
        AssignmentContainer {
            data: FrameMatrix::filled(n_trajs, max_length, sentinel),
            completed_trajs: vec![false; n_trajs],
        }
    }

    #[inline(always)]
    pub fn data(&self) -> &FrameMatrix<T> {
        &self.data
    }

    #[inline(always)]
    pub fn into_data(self) -> FrameMatrix<T> {
        self.data
    }

    #[inline(always)]
    pub fn completed_trajs(&self) -> &[bool] {
        &self.completed_trajs
    }

    /// Has trajectory `traj` been assigned? Out-of-range trajectories are never completed.
    #[inline(always)]
    pub fn is_completed(&self, traj: usize) -> bool {
        self.completed_trajs.get(traj).copied().unwrap_or(false)
    }

    /// Write values of a trajectory and mark it as completed.
    pub(crate) fn complete(&mut self, traj: usize, values: &[T]) {
        self.data.set_row(traj, values);
        self.completed_trajs[traj] = true;
    }

    /// Read a container from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssignmentError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| AssignmentError::CouldNotReadCheckpoint(path.into(), e.to_string()))?;

        let container: AssignmentContainer<T> = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| AssignmentError::CouldNotReadCheckpoint(path.into(), e.to_string()))?;

        if container.completed_trajs.len() != container.data.n_trajs() {
            return Err(AssignmentError::CouldNotReadCheckpoint(
                path.into(),
                format!(
                    "{} completion flags for {} trajectories",
                    container.completed_trajs.len(),
                    container.data.n_trajs()
                ),
            ));
        }

        Ok(container)
    }

    /// Create a container from a finished matrix. All trajectories are marked as completed.
    pub fn from_matrix(data: FrameMatrix<T>) -> Self {
        let n_trajs = data.n_trajs();
        AssignmentContainer {
            data,
            completed_trajs: vec![true; n_trajs],
        }
    }

    /// Write the container into a file, replacing it atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssignmentError> {
        let path = path.as_ref();
        let tmp = self.write_temporary(path)?;
        fs::rename(&tmp, path).map_err(|_| {
            let _ = fs::remove_file(&tmp);
            AssignmentError::CouldNotRenameCheckpoint(tmp.clone().into_boxed_path(), path.into())
        })
    }

    /// Check that no frame of a completed trajectory holds the `sentinel` value.
    fn check_completed(
        &self,
        path: &Path,
        lengths: &[usize],
        sentinel: T,
    ) -> Result<(), AssignmentError> {
        match lengths
            .iter()
            .enumerate()
            .find(|&(i, &len)| self.is_completed(i) && !self.data.row_complete(i, len, sentinel))
        {
            Some((i, _)) => Err(AssignmentError::IncompleteTrajectory(path.into(), i)),
            None => Ok(()),
        }
    }

    /// Check that the container matches a project with `n_trajs` trajectories, the longest having `max_length` frames.
    fn check_shape(
        &self,
        path: &Path,
        n_trajs: usize,
        max_length: usize,
    ) -> Result<(), AssignmentError> {
        if self.data.n_trajs() != n_trajs {
            return Err(AssignmentError::TrajectoryCountMismatch(
                n_trajs,
                path.into(),
                self.data.n_trajs(),
            ));
        }

        if self.data.max_length() != max_length {
            return Err(AssignmentError::ShapeMismatch(
                max_length,
                path.into(),
                self.data.max_length(),
            ));
        }

        Ok(())
    }

    /// Serialize the container into `<path>.tmp`, flush it and sync it to disk.
    /// Returns the path to the temporary file. The temporary file is removed on failure.
    fn write_temporary(&self, path: &Path) -> Result<PathBuf, AssignmentError> {
        let tmp = with_suffix(path, ".tmp");
        let result = (|| -> Result<(), String> {
            let file = File::create(&tmp).map_err(|e| e.to_string())?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, self).map_err(|e| e.to_string())?;
            writer.flush().map_err(|e| e.to_string())?;
            let file = writer.into_inner().map_err(|e| e.to_string())?;
            file.sync_all().map_err(|e| e.to_string())
        })();

        match result {
            Ok(_) => Ok(tmp),
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                Err(AssignmentError::CouldNotWriteCheckpoint(path.into(), e))
            }
        }
    }
}

/// Pair of containers with the assignments and the distances.
struct Containers<'a> {
    assignments: AssignmentContainer<i32>,
    distances: AssignmentContainer<f32>,
    assignments_path: &'a Path,
    distances_path: &'a Path,
}

impl<'a> Containers<'a> {
    /// Load the containers from disk or create fresh ones if neither exists.
    fn open(
        assignments_path: &'a Path,
        distances_path: &'a Path,
        lengths: &[usize],
    ) -> Result<Self, AssignmentError> {
        let n_trajs = lengths.len();
        let max_length = lengths.iter().copied().max().unwrap_or(0);

        match (assignments_path.exists(), distances_path.exists()) {
            (false, false) => {
                log::info!("Creating new checkpoint files.");
                let containers = Containers {
                    assignments: AssignmentContainer::new(n_trajs, max_length, ASSIGNMENT_SENTINEL),
                    distances: AssignmentContainer::new(n_trajs, max_length, DISTANCE_SENTINEL),
                    assignments_path,
                    distances_path,
                };
                containers.commit()?;
                Ok(containers)
            }
            (true, true) => {
                log::info!("Resuming from existing checkpoint files.");
                let assignments = AssignmentContainer::<i32>::load(assignments_path)?;
                let distances = AssignmentContainer::<f32>::load(distances_path)?;
                assignments.check_shape(assignments_path, n_trajs, max_length)?;
                distances.check_shape(distances_path, n_trajs, max_length)?;

                // distances are committed first so they may be ahead but never behind
                let consistent = assignments
                    .completed_trajs()
                    .iter()
                    .zip(distances.completed_trajs())
                    .all(|(&a, &d)| !a || d);

                if !consistent {
                    return Err(AssignmentError::InconsistentFlags(
                        assignments_path.into(),
                        distances_path.into(),
                    ));
                }

                assignments.check_completed(assignments_path, lengths, ASSIGNMENT_SENTINEL)?;
                distances.check_completed(distances_path, lengths, DISTANCE_SENTINEL)?;

                Ok(Containers {
                    assignments,
                    distances,
                    assignments_path,
                    distances_path,
                })
            }
            (true, false) => Err(AssignmentError::MissingContainer(
                assignments_path.into(),
                distances_path.into(),
            )),
            (false, true) => Err(AssignmentError::MissingContainer(
                distances_path.into(),
                assignments_path.into(),
            )),
        }
    }

    /// Atomically replace both containers on disk.
    /// The assignments container carrying the authoritative completion flags is replaced last.
    fn commit(&self) -> Result<(), AssignmentError> {
        let d_tmp = self.distances.write_temporary(self.distances_path)?;
        let a_tmp = match self.assignments.write_temporary(self.assignments_path) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&d_tmp);
                return Err(e);
            }
        };

        if fs::rename(&d_tmp, self.distances_path).is_err() {
            let _ = fs::remove_file(&d_tmp);
            let _ = fs::remove_file(&a_tmp);
            return Err(AssignmentError::CouldNotRenameCheckpoint(
                d_tmp.into_boxed_path(),
                self.distances_path.into(),
            ));
        }

        if fs::rename(&a_tmp, self.assignments_path).is_err() {
            let _ = fs::remove_file(&a_tmp);
            return Err(AssignmentError::CouldNotRenameCheckpoint(
                a_tmp.into_boxed_path(),
                self.assignments_path.into(),
            ));
        }

        log::debug!("Checkpoint committed.");
        Ok(())
    }
}

/// Advisory lock preventing two runs from writing into the same output.
/// The lock is held for as long as the file stays open and the operating system releases it
/// when the owning process ends, even if it is killed. The lock file itself is kept on disk.
struct OutputLock {
    _file: File,
}

impl OutputLock {
    fn acquire(output: &Path, path: PathBuf) -> Result<Self, AssignmentError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|_| AssignmentError::CouldNotLock(path.clone().into_boxed_path()))?;

        match file.try_lock_exclusive() {
            Ok(()) => (),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(AssignmentError::Locked(output.into(), path.into_boxed_path()))
            }
            Err(_) => return Err(AssignmentError::CouldNotLock(path.into_boxed_path())),
        }

        // identify the owner of the lock
        if file.set_len(0).is_err() || writeln!(file, "{}", std::process::id()).is_err() {
            log::warn!(
                "Could not write process id into lock file '{}'.",
                path.to_string_lossy()
            );
        }

        log::debug!("Acquired lock '{}'.", path.to_string_lossy());
        Ok(OutputLock { _file: file })
    }
}

impl Assigner {
    /// Assign all frames of all trajectories of the source to the generators,
    /// periodically committing the results into the output containers.
    ///
    /// If the output containers already exist, trajectories marked as completed are skipped.
    pub fn assign_with_checkpoint<M: Metric, S: TrajectorySource>(
        &self,
        metric: &M,
        generators: &Trajectory,
        source: &S,
    ) -> Result<(AssignmentMatrix, DistanceMatrix), AssignmentError> {
        self.run(metric, generators, source, false)
    }

    /// Same as [`Assigner::assign_with_checkpoint`], but the trajectories are read in chunks of
    /// at most `chunk_size` frames. Falls back to [`Assigner::assign_with_checkpoint`]
    /// if the source does not support chunked reading.
    pub fn streaming_assign_with_checkpoint<M: Metric, S: TrajectorySource>(
        &self,
        metric: &M,
        generators: &Trajectory,
        source: &S,
    ) -> Result<(AssignmentMatrix, DistanceMatrix), AssignmentError> {
        if !source.supports_chunks() {
            log::warn!("Trajectory source does not support chunked reading. Reading complete trajectories.");
            return self.run(metric, generators, source, false);
        }

        self.run(metric, generators, source, true)
    }

    fn run<M: Metric, S: TrajectorySource>(
        &self,
        metric: &M,
        generators: &Trajectory,
        source: &S,
        streaming: bool,
    ) -> Result<(AssignmentMatrix, DistanceMatrix), AssignmentError> {
        self.info();

        let pgens = metric.prepare(generators)?;
        if pgens.is_empty() {
            return Err(AssignmentError::NoGenerators);
        }

        let assignments_path = self.assignments_path();
        let distances_path = self.distances_path();

        if let Some(parent) = assignments_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|_| AssignmentError::CouldNotCreateDirectory(parent.into()))?;
            }
        }

        let _lock = OutputLock::acquire(&assignments_path, self.lock_path())?;

        let lengths = source.traj_lengths();
        let mut containers = Containers::open(&assignments_path, &distances_path, lengths)?;

        let mut uncommitted = 0;
        for (i, &expected) in lengths.iter().enumerate() {
            if containers.assignments.is_completed(i) {
                log::info!("Skipping trajectory {} -- already assigned", i);
                continue;
            }

            log::info!("Assigning trajectory {}", i);
            let (a, d) = if streaming {
                self.assign_chunked(metric, &pgens, source, i)?
            } else {
                let traj = source.load_traj(i)?;
                let ptraj = metric.prepare(&traj)?;
                assign_prepared(metric, &ptraj, &pgens)?
            };

            check_length(i, expected, a.len())?;
            containers.distances.complete(i, &d);
            containers.assignments.complete(i, &a);
            uncommitted += 1;

            if uncommitted >= self.checkpoint_interval() {
                containers.commit()?;
                uncommitted = 0;
            }
        }

        if uncommitted > 0 {
            containers.commit()?;
        }

        Ok((
            containers.assignments.into_data(),
            containers.distances.into_data(),
        ))
    }

    /// Assign a single trajectory reading it in chunks.
    fn assign_chunked<M: Metric, S: TrajectorySource>(
        &self,
        metric: &M,
        pgens: &M::Prepared,
        source: &S,
        traj: usize,
    ) -> Result<(Vec<i32>, Vec<f32>), AssignmentError> {
        let mut assignments = Vec::new();
        let mut distances = Vec::new();

        source.for_each_chunk::<AssignmentError, _>(traj, self.chunk_size(), |chunk| {
            let pchunk = metric.prepare(&chunk)?;
            let (a, d) = assign_prepared(metric, &pchunk, pgens)?;
            assignments.extend(a);
            distances.extend(d);
            Ok(())
        })?;

        Ok((assignments, distances))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::assigning::assign_in_memory;
    use crate::errors::ProjectError;
    use crate::metrics::euclidean::Euclidean;
    use crate::project::InMemoryProject;

    fn line(xs: &[f32]) -> Trajectory {
        Trajectory::from_frames(xs.iter().map(|&x| vec![[x, 0.0, 0.0]]).collect()).unwrap()
    }

    fn project() -> InMemoryProject {
        InMemoryProject::new(vec![
            line(&[0.0, 1.0, 2.0]),
            line(&[4.0]),
            line(&[8.0, 9.0, 10.0]),
        ])
    }

    fn generators() -> Trajectory {
        line(&[0.0, 10.0])
    }

    /// Source failing to load the specified trajectory and without chunked reading.
    struct FailingSource {
        inner: InMemoryProject,
        fail: usize,
    }

    impl TrajectorySource for FailingSource {
        fn n_trajs(&self) -> usize {
            self.inner.n_trajs()
        }

        fn traj_lengths(&self) -> &[usize] {
            self.inner.traj_lengths()
        }

        fn load_traj(&self, index: usize) -> Result<Trajectory, ProjectError> {
            if index == self.fail {
                Err(ProjectError::TrajectoryOutOfRange(index, 0))
            } else {
                self.inner.load_traj(index)
            }
        }
    }

    fn assert_unlocked(assigner: &Assigner) {
        assert!(OutputLock::acquire(&assigner.assignments_path(), assigner.lock_path()).is_ok());
    }

    fn assigner(dir: &TempDir) -> Assigner {
        Assigner::new()
            .output(dir.path().join("Data/Assignments.bin").to_str().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn fresh_run() {
        let dir = TempDir::new().unwrap();
        let assigner = assigner(&dir);
        let metric = Euclidean::new().build().unwrap();

        let (a, d) = assigner
            .assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();
        let (a_ref, d_ref) = assign_in_memory(&metric, &generators(), &project()).unwrap();
        assert_eq!(a, a_ref);
        assert_eq!(d, d_ref);

        let container = AssignmentContainer::<i32>::load(assigner.assignments_path()).unwrap();
        assert_eq!(container.completed_trajs(), &[true, true, true]);
        assert_eq!(container.data(), &a_ref);

        let container = AssignmentContainer::<f32>::load(assigner.distances_path()).unwrap();
        assert_eq!(container.completed_trajs(), &[true, true, true]);
        assert_eq!(container.data(), &d_ref);

        assert_unlocked(&assigner);
        assert!(!with_suffix(&assigner.assignments_path(), ".tmp").exists());
    }

    #[test]
    fn save_load_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("container.bin");

        let matrix =
            FrameMatrix::from_concatenated(&[2, 1], &[1.5f32, 2.5, 0.5], DISTANCE_SENTINEL);
        let container = AssignmentContainer::from_matrix(matrix.clone());
        container.save(&path).unwrap();

        let loaded = AssignmentContainer::<f32>::load(&path).unwrap();
        assert_eq!(loaded, container);
        assert_eq!(loaded.completed_trajs(), &[true, true]);
        assert_eq!(loaded.into_data(), matrix);
        assert!(!with_suffix(&path, ".tmp").exists());
    }

    #[test]
    fn load_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("container.bin");
        fs::write(&path, b"definitely not a container").unwrap();

        match AssignmentContainer::<i32>::load(&path) {
            Err(AssignmentError::CouldNotReadCheckpoint(_, _)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn resume_after_interruption() {
        let dir = TempDir::new().unwrap();
        let assigner = assigner(&dir);
        let metric = Euclidean::new().build().unwrap();

        // interrupted while assigning the second trajectory
        let interrupted = FailingSource {
            inner: project(),
            fail: 1,
        };
        match assigner.assign_with_checkpoint(&metric, &generators(), &interrupted) {
            Err(AssignmentError::Project(ProjectError::TrajectoryOutOfRange(1, 0))) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }

        assert_unlocked(&assigner);
        let container = AssignmentContainer::<i32>::load(assigner.assignments_path()).unwrap();
        assert_eq!(container.completed_trajs(), &[true, false, false]);
        assert_eq!(container.data().row(0), &[0, 0, 0]);
        assert_eq!(container.data().row(1), &[-1, -1, -1]);

        // first trajectory must not be loaded again
        let resumed = FailingSource {
            inner: project(),
            fail: 0,
        };
        let (a, d) = assigner
            .assign_with_checkpoint(&metric, &generators(), &resumed)
            .unwrap();
        let (a_ref, d_ref) = assign_in_memory(&metric, &generators(), &project()).unwrap();
        assert_eq!(a, a_ref);
        assert_eq!(d, d_ref);
    }

    #[test]
    fn checkpoint_interval_larger_than_project() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .checkpoint_interval(10)
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        assigner
            .assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();

        // everything committed at the end
        let container = AssignmentContainer::<i32>::load(assigner.assignments_path()).unwrap();
        assert_eq!(container.completed_trajs(), &[true, true, true]);
    }

    #[test]
    fn rerun_completed() {
        let dir = TempDir::new().unwrap();
        let assigner = assigner(&dir);
        let metric = Euclidean::new().build().unwrap();

        let first = assigner
            .assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();

        // nothing can be loaded, everything is skipped
        let nothing = FailingSource {
            inner: project(),
            fail: usize::MAX,
        };
        let second = assigner
            .assign_with_checkpoint(&metric, &generators(), &nothing)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn locked_output() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        // another run holds the lock
        let other = File::create(assigner.lock_path()).unwrap();
        other.try_lock_exclusive().unwrap();

        match assigner.assign_with_checkpoint(&metric, &generators(), &project()) {
            Err(AssignmentError::Locked(_, _)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
        assert!(!assigner.assignments_path().exists());

        // the other run ends
        drop(other);
        assigner
            .assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();
    }

    #[test]
    fn lock_held_during_run() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();

        let lock = OutputLock::acquire(&assigner.assignments_path(), assigner.lock_path()).unwrap();
        match OutputLock::acquire(&assigner.assignments_path(), assigner.lock_path()) {
            Err(AssignmentError::Locked(_, _)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }

        let owner = fs::read_to_string(assigner.lock_path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());

        drop(lock);
        assert!(assigner.lock_path().exists());
        assert_unlocked(&assigner);
    }

    #[test]
    fn resume_after_kill() {
        let dir = TempDir::new().unwrap();
        let assigner = assigner(&dir);
        let metric = Euclidean::new().build().unwrap();

        let interrupted = FailingSource {
            inner: project(),
            fail: 2,
        };
        assert!(assigner
            .assign_with_checkpoint(&metric, &generators(), &interrupted)
            .is_err());

        // killed process leaves its lock file behind without holding the lock
        fs::write(assigner.lock_path(), "4194304\n").unwrap();

        let resumed = FailingSource {
            inner: project(),
            fail: 0,
        };
        let (a, d) = assigner
            .assign_with_checkpoint(&metric, &generators(), &resumed)
            .unwrap();
        let (a_ref, d_ref) = assign_in_memory(&metric, &generators(), &project()).unwrap();
        assert_eq!(a, a_ref);
        assert_eq!(d, d_ref);
    }

    #[test]
    fn half_present_containers() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        assigner
            .assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();
        fs::remove_file(assigner.distances_path()).unwrap();

        match assigner.assign_with_checkpoint(&metric, &generators(), &project()) {
            Err(AssignmentError::MissingContainer(_, _)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }

        assert_unlocked(&assigner);
    }

    #[test]
    fn mismatched_containers() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        assigner
            .assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();

        let fewer = InMemoryProject::new(vec![line(&[0.0, 1.0, 2.0]), line(&[4.0])]);
        match assigner.assign_with_checkpoint(&metric, &generators(), &fewer) {
            Err(AssignmentError::TrajectoryCountMismatch(2, _, 3)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }

        let longer = InMemoryProject::new(vec![
            line(&[0.0, 1.0, 2.0, 3.0]),
            line(&[4.0]),
            line(&[8.0, 9.0, 10.0]),
        ]);
        match assigner.assign_with_checkpoint(&metric, &generators(), &longer) {
            Err(AssignmentError::ShapeMismatch(4, _, 3)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn inconsistent_flags() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        let mut assignments = AssignmentContainer::new(3, 3, ASSIGNMENT_SENTINEL);
        assignments.complete(0, &[0, 0, 0]);
        let distances = AssignmentContainer::new(3, 3, DISTANCE_SENTINEL);
        let assignments_path = assigner.assignments_path();
        let distances_path = assigner.distances_path();
        let containers = Containers {
            assignments,
            distances,
            assignments_path: &assignments_path,
            distances_path: &distances_path,
        };
        containers.commit().unwrap();

        match assigner.assign_with_checkpoint(&metric, &generators(), &project()) {
            Err(AssignmentError::InconsistentFlags(_, _)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn completed_trajectory_with_unassigned_frames() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        let mut assignments = AssignmentContainer::new(3, 3, ASSIGNMENT_SENTINEL);
        assignments.complete(0, &[0, 0, 0]);
        assignments.complete(2, &[1, 1, ASSIGNMENT_SENTINEL]);
        let mut distances = AssignmentContainer::new(3, 3, DISTANCE_SENTINEL);
        distances.complete(0, &[0.0, 1.0, 2.0]);
        distances.complete(2, &[2.0, 1.0, 0.0]);

        let assignments_path = assigner.assignments_path();
        let distances_path = assigner.distances_path();
        let containers = Containers {
            assignments,
            distances,
            assignments_path: &assignments_path,
            distances_path: &distances_path,
        };
        containers.commit().unwrap();

        match assigner.assign_with_checkpoint(&metric, &generators(), &project()) {
            Err(AssignmentError::IncompleteTrajectory(path, 2)) => {
                assert_eq!(&*path, assignments_path.as_path())
            }
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }

        // padding of the shorter trajectory is not checked
        let mut assignments = AssignmentContainer::new(3, 3, ASSIGNMENT_SENTINEL);
        assignments.complete(1, &[0, ASSIGNMENT_SENTINEL, ASSIGNMENT_SENTINEL]);
        let mut distances = AssignmentContainer::new(3, 3, DISTANCE_SENTINEL);
        distances.complete(1, &[4.0, DISTANCE_SENTINEL, DISTANCE_SENTINEL]);
        distances.complete(2, &[2.0, DISTANCE_SENTINEL, 0.0]);
        let containers = Containers {
            assignments,
            distances,
            assignments_path: &assignments_path,
            distances_path: &distances_path,
        };
        containers.commit().unwrap();

        match assigner.assign_with_checkpoint(&metric, &generators(), &project()) {
            Err(AssignmentError::IncompleteTrajectory(path, 2)) => {
                assert_eq!(&*path, distances_path.as_path())
            }
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn length_mismatch() {
        struct Lying(InMemoryProject, Vec<usize>);

        impl TrajectorySource for Lying {
            fn n_trajs(&self) -> usize {
                self.0.n_trajs()
            }

            fn traj_lengths(&self) -> &[usize] {
                &self.1
            }

            fn load_traj(&self, index: usize) -> Result<Trajectory, ProjectError> {
                self.0.load_traj(index)
            }
        }

        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        let source = Lying(project(), vec![3, 2, 3]);
        match assigner.assign_with_checkpoint(&metric, &generators(), &source) {
            Err(AssignmentError::LengthMismatch(1, 2, 1)) => (),
            Ok(_) => panic!("Function should have failed."),
            Err(e) => panic!("Incorrect error returned: {}", e),
        }
    }

    #[test]
    fn streaming_small_chunks() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .chunk_size(2)
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        let (a, d) = assigner
            .streaming_assign_with_checkpoint(&metric, &generators(), &project())
            .unwrap();
        let (a_ref, d_ref) = assign_in_memory(&metric, &generators(), &project()).unwrap();
        assert_eq!(a, a_ref);
        assert_eq!(d, d_ref);
    }

    #[test]
    fn streaming_fallback() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .chunk_size(1)
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        let source = FailingSource {
            inner: project(),
            fail: usize::MAX,
        };
        assert!(!source.supports_chunks());

        let (a, d) = assigner
            .streaming_assign_with_checkpoint(&metric, &generators(), &source)
            .unwrap();
        let (a_ref, d_ref) = assign_in_memory(&metric, &generators(), &project()).unwrap();
        assert_eq!(a, a_ref);
        assert_eq!(d, d_ref);
    }

    #[test]
    fn completed_flags_monotonic() {
        let dir = TempDir::new().unwrap();
        let assigner = Assigner::new()
            .output(dir.path().join("out.bin").to_str().unwrap())
            .build()
            .unwrap();
        let metric = Euclidean::new().build().unwrap();

        let mut previous = vec![false; 3];
        for fail in [2, 1, usize::MAX] {
            let source = FailingSource {
                inner: project(),
                fail,
            };
            let _ = assigner.assign_with_checkpoint(&metric, &generators(), &source);

            let container = AssignmentContainer::<i32>::load(assigner.assignments_path()).unwrap();
            for (old, new) in previous.iter().zip(container.completed_trajs()) {
                assert!(!old || *new);
            }
            previous = container.completed_trajs().to_vec();
        }

        assert_eq!(previous, vec![true, true, true]);
    }
}
