// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! # microstates: Clustering molecular dynamics trajectories into microstates
//!
//! Crate for measuring structural distances between conformations, partitioning
//! conformational ensembles into clusters ("microstates") and assigning every
//! trajectory frame to its nearest cluster center.
//!
//! ## Usage
//!
//! Import the crate in your Rust code:
//!
//! ```rust
//! use microstates::prelude::*;
//! ```
//!
//! `microstates` is also available as a command line tool driven by a yaml job file.
//!
//! ## Examples
//!
//! Cluster trajectories using the k-centers algorithm and the RMSD metric.
//! ```no_run
//! use microstates::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // load the project manifest listing the trajectories
//!     let project = Project::from_file("project.yaml")?;
//!     let trajectories = project.load_all()?;
//!
//!     // construct the metric
//!     let metric = Rmsd::new()
//!         .atom_indices(vec![0, 4, 8, 12])      // atoms to superpose (all if not set)
//!         .n_threads(4)                          // number of threads for batch evaluation
//!         .build()?;
//!
//!     // construct the clustering algorithm
//!     let kcenters = KCenters::new()
//!         .n_clusters(100)                       // number of generators to find
//!         .build()?;
//!
//!     // activate colog if you want logging (requires the `colog` crate)
//!     colog::init();
//!
//!     let clustering = kcenters.cluster(&metric, &trajectories)?;
//!     let assignments = clustering.assignments();
//!     println!("{:?}", assignments.shape());
//!
//!     Ok(())
//! }
//! ```
//!
//! ***
//!
//! Assign all frames of a project to previously identified generators with checkpointing.
//! If the run is interrupted, running it again resumes from the last commit.
//! ```no_run
//! use microstates::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let project = Project::from_file("project.yaml")?;
//!     let metric = Rmsd::new().build()?;
//!
//!     // generators identified by an earlier clustering run
//!     let locations = GeneratorLocation::read_file("generators.yaml")?;
//!     let generators = project.extract_frames(&locations)?;
//!
//!     let assigner = Assigner::new()
//!         .output("Data/Assignments.bin")        // distances go to 'Data/Assignments.bin.distances'
//!         .checkpoint_interval(5)                // commit after every 5 trajectories
//!         .build()?;
//!
//!     let (assignments, distances) =
//!         assigner.assign_with_checkpoint(&metric, &generators, &project)?;
//!
//!     Ok(())
//! }
//! ```

/// Version of the `microstates` crate.
pub const MICROSTATES_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Message that should be added to every panic.
pub(crate) const PANIC_MESSAGE: &str =
    "\n\n\n            >>> THIS SHOULD NOT HAVE HAPPENED! PLEASE REPORT THIS ERROR <<<
(open an issue at 'github.com/Ladme/microstates/issues' or write an e-mail to 'ladmeb@gmail.com')\n\n";

pub mod assigning;
pub mod clustering;
pub mod errors;
pub mod input;
mod jobs;
pub mod metrics;
pub(crate) mod presentation;
pub mod project;
pub mod trajectory;

/// This module contains re-exported public structures of the `microstates` crate.
pub mod prelude {
    pub use super::input::{
        AssignMode, Assigner, AssignerBuilder, Clarans, ClaransBuilder, ClusteringAlgorithm,
        Hierarchical, HierarchicalBuilder, HybridKMedoids, HybridKMedoidsBuilder, Job, KCenters,
        KCentersBuilder, LinkageMethod, MetricType, SubsampledClarans, SubsampledClaransBuilder,
    };

    pub use super::assigning::{
        assign_in_memory, assign_prepared, AssignmentContainer, AssignmentMatrix, DistanceMatrix,
        FrameMatrix, ASSIGNMENT_SENTINEL, DISTANCE_SENTINEL,
    };

    pub use super::clustering::{
        hierarchical::{LinkageRow, MergeTree},
        Clustering, FlatClustering, GeneratorLocation,
    };

    pub use super::metrics::{
        euclidean::{Euclidean, EuclideanBuilder, EuclideanPrepared},
        rmsd::{Rmsd, RmsdBuilder, RmsdPrepared},
        Metric, Prepared,
    };

    pub use super::project::{InMemoryProject, Project, TrajectorySource};
    pub use super::trajectory::Trajectory;
}
