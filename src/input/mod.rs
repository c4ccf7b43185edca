// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains structures and methods for specifying parameters of clustering and assignment runs.

pub mod assign;
pub mod clustering;
pub mod job;

pub use assign::{AssignMode, Assigner, AssignerBuilder};
pub use clustering::{
    Clarans, ClaransBuilder, ClusteringAlgorithm, Hierarchical, HierarchicalBuilder,
    HybridKMedoids, HybridKMedoidsBuilder, KCenters, KCentersBuilder, LinkageMethod,
    SubsampledClarans, SubsampledClaransBuilder,
};
pub use job::{AssignHierarchicalJob, AssignJob, ClusterJob, Job, MetricType};
