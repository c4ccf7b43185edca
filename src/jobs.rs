// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Execution of the jobs read from job files.

use std::path::Path;

use serde::Serialize;

use crate::assigning::{assign_in_memory, AssignmentContainer, FrameMatrix};
use crate::clustering::hierarchical::MergeTree;
use crate::clustering::{Clustering, GeneratorLocation};
use crate::errors::{ConfigError, WriteError};
use crate::input::{AssignHierarchicalJob, AssignJob, AssignMode, ClusterJob, Job, MetricType};
use crate::metrics::Metric;
use crate::presentation;
use crate::project::{Project, TrajectorySource};
use crate::trajectory::Trajectory;

type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

impl Job {
    /// Perform the job and write out the results.
    pub fn run(&self) -> JobResult {
        log::info!("Running {} job.", self.name());

        match self {
            Job::Cluster(job) => {
                job.metric().info();
                match job.metric() {
                    MetricType::Rmsd(metric) => run_cluster(metric, job),
                    MetricType::Euclidean(metric) => run_cluster(metric, job),
                }
            }
            Job::Assign(job) => {
                job.metric().info();
                match job.metric() {
                    MetricType::Rmsd(metric) => run_assign(metric, job),
                    MetricType::Euclidean(metric) => run_assign(metric, job),
                }
            }
            Job::AssignHierarchical(job) => run_assign_hierarchical(job),
        }
    }
}

fn run_cluster<M: Metric>(metric: &M, job: &ClusterJob) -> JobResult {
    let project = Project::from_file(job.project())?;
    project.info();

    let stride = job.stride();
    let trajectories: Vec<Trajectory> = project
        .load_all()?
        .into_iter()
        .map(|t| if stride > 1 { t.stride(stride) } else { t })
        .collect();

    log::info!(
        "Clustering {} frames (stride {}).",
        trajectories.iter().map(|t| t.n_frames()).sum::<usize>(),
        stride
    );

    match job.algorithm().cluster(metric, &trajectories)? {
        Clustering::Flat(clustering) => {
            log::info!(
                "Identified {} clusters. Total cost: {:.6}",
                clustering.n_clusters(),
                clustering.total_cost()
            );

            // locations in the original (unstrided) trajectories
            let locations: Vec<GeneratorLocation> = clustering
                .generator_locations()
                .into_iter()
                .map(|l| GeneratorLocation::new(l.trajectory, l.frame * stride))
                .collect();

            let output = job.output_generators().as_deref().ok_or_else(|| {
                ConfigError::MissingOutput("generators".to_owned(), "output_generators".to_owned())
            })?;
            GeneratorLocation::write_file(&locations, output, job.overwrite())?;

            if job.output_assignments().is_some() || job.output_distances().is_some() {
                if stride == 1 {
                    if let Some(output) = job.output_assignments() {
                        write_rows(
                            &clustering.assignments(),
                            clustering.traj_lengths(),
                            output,
                            job.overwrite(),
                            "assignments",
                        )?;
                    }

                    if let Some(output) = job.output_distances() {
                        write_rows(
                            &clustering.distances(),
                            clustering.traj_lengths(),
                            output,
                            job.overwrite(),
                            "distances",
                        )?;
                    }
                } else {
                    log::warn!(
                        "Assignments and distances are not written for strided clustering. Use an 'Assign' job to assign all frames."
                    );
                }
            }
        }
        Clustering::Hierarchical(tree) => {
            let output = job.output_merge_tree().as_deref().ok_or_else(|| {
                ConfigError::MissingOutput("merge tree".to_owned(), "output_merge_tree".to_owned())
            })?;
            tree.save(output, job.overwrite())?;
        }
    }

    Ok(())
}

fn run_assign<M: Metric>(metric: &M, job: &AssignJob) -> JobResult {
    let project = Project::from_file(job.project())?;
    project.info();

    let locations = GeneratorLocation::read_file(job.generators())?;
    log::info!(
        "Read {} generators from '{}'.",
        locations.len(),
        job.generators()
    );
    let generators = project.extract_frames(&locations)?;
    let assigner = job.assigner()?;

    let (assignments, _) = match job.mode() {
        AssignMode::InMemory => {
            let (assignments, distances) = assign_in_memory(metric, &generators, &project)?;
            let assignments_path = assigner.assignments_path();
            let distances_path = assigner.distances_path();
            presentation::try_backup_file(&assignments_path, false, "assignments")?;
            presentation::try_backup_file(&distances_path, false, "distances")?;

            let assignments = AssignmentContainer::from_matrix(assignments);
            let distances = AssignmentContainer::from_matrix(distances);
            distances.save(&distances_path)?;
            assignments.save(&assignments_path)?;
            (assignments.into_data(), distances.into_data())
        }
        AssignMode::Checkpointed => assigner.assign_with_checkpoint(metric, &generators, &project)?,
        AssignMode::Streaming => {
            assigner.streaming_assign_with_checkpoint(metric, &generators, &project)?
        }
    };

    log::info!(
        "Assigned {} frames of {} trajectories to {} generators.",
        project.traj_lengths().iter().sum::<usize>(),
        assignments.n_trajs(),
        locations.len()
    );

    Ok(())
}

fn run_assign_hierarchical(job: &AssignHierarchicalJob) -> JobResult {
    let tree = MergeTree::load(job.merge_tree())?;
    log::info!(
        "Read merge tree with {} leaves ('{}' linkage).",
        tree.n_leaves(),
        tree.method()
    );

    let assignments = tree.assignments(job.n_clusters(), job.distance_cutoff())?;
    write_rows(
        &assignments,
        tree.traj_lengths(),
        job.output(),
        job.overwrite(),
        "assignments",
    )?;

    Ok(())
}

/// Write per-frame values into a yaml file as one list per trajectory.
fn write_rows<T: Copy + PartialEq + Serialize>(
    matrix: &FrameMatrix<T>,
    lengths: &[usize],
    path: impl AsRef<Path>,
    overwrite: bool,
    what: &str,
) -> Result<(), WriteError> {
    let rows: Vec<&[T]> = lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| &matrix.row(i)[..len])
        .collect();

    presentation::write_yaml(path, &rows, overwrite, what)
}
