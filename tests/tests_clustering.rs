// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Integration tests of the clustering algorithms.

mod common;

use approx::assert_relative_eq;
use common::{assert_two_groups, line, rotate_translate};
use microstates::errors::ClusteringError;
use microstates::prelude::*;
use tempfile::TempDir;

fn shape_a() -> Vec<[f32; 3]> {
    vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]
}

fn shape_b() -> Vec<[f32; 3]> {
    vec![
        [0.0, 0.0, 0.0],
        [3.0, 0.0, 0.0],
        [0.0, 0.5, 0.0],
        [0.0, 0.0, 2.0],
    ]
}

/// Rigidly moved copies of two different conformations, the first three frames are copies of `shape_a`.
fn conformations() -> Vec<Trajectory> {
    vec![
        Trajectory::from_frames(vec![
            shape_a(),
            rotate_translate(&shape_a(), [1.0, 2.0, 3.0]),
            rotate_translate(&rotate_translate(&shape_a(), [0.0, 0.0, 0.0]), [-4.0, 0.5, 0.0]),
        ])
        .unwrap(),
        Trajectory::from_frames(vec![
            shape_b(),
            rotate_translate(&shape_b(), [2.0, -1.0, 0.5]),
        ])
        .unwrap(),
    ]
}

#[test]
fn kcenters_rmsd_rigid_copies() {
    let metric = Rmsd::new().build().unwrap();
    let kcenters = KCenters::new().n_clusters(2).build().unwrap();
    let clustering = kcenters.cluster(&metric, &conformations()).unwrap();

    assert_eq!(clustering.n_clusters(), 2);
    let assignments = clustering.assignments();
    assert_eq!(assignments.shape(), (2, 3));
    assert_eq!(assignments.row(1)[2], ASSIGNMENT_SENTINEL);
    assert_two_groups(&assignments.concatenated(&[3, 2]), 3);

    for &d in clustering.flat_distances() {
        assert_relative_eq!(d, 0.0, epsilon = 1e-2);
    }
}

#[test]
fn clustering_then_assignment() {
    let metric = Rmsd::new().n_threads(2).build().unwrap();
    let algorithm: ClusteringAlgorithm =
        serde_yaml::from_str("!HybridKMedoids {n_clusters: 2, random_seed: 3}").unwrap();
    algorithm.validate().unwrap();

    let trajectories = conformations();
    let clustering = algorithm.cluster(&metric, &trajectories).unwrap();
    let flat = clustering.as_flat().unwrap();
    assert!(clustering.as_hierarchical().is_none());

    let generators = flat.generators(&trajectories).unwrap();
    assert_eq!(generators.n_frames(), 2);

    let project = InMemoryProject::new(trajectories);
    let (assignments, distances) = assign_in_memory(&metric, &generators, &project).unwrap();
    assert_eq!(assignments, flat.assignments());

    let expected = flat.distances();
    for (a, b) in distances
        .concatenated(&[3, 2])
        .iter()
        .zip(expected.concatenated(&[3, 2]).iter())
    {
        assert_relative_eq!(*a, *b, epsilon = 1e-2);
    }
}

#[test]
fn generator_locations_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("generators.yaml");

    let metric = Euclidean::new().build().unwrap();
    let trajectories = vec![line(&[0.0, 1.0, 2.0]), line(&[10.0, 11.0])];
    let clustering = KCenters::new()
        .n_clusters(2)
        .build()
        .unwrap()
        .cluster(&metric, &trajectories)
        .unwrap();

    let locations = clustering.generator_locations();
    assert_eq!(
        locations,
        vec![GeneratorLocation::new(0, 0), GeneratorLocation::new(1, 1)]
    );

    GeneratorLocation::write_file(&locations, &path, false).unwrap();
    let read = GeneratorLocation::read_file(&path).unwrap();
    assert_eq!(read, locations);

    let project = InMemoryProject::new(trajectories);
    let generators = project.extract_frames(&read).unwrap();
    assert_eq!(generators, line(&[0.0, 11.0]));
}

#[test]
fn all_algorithms_find_groups() {
    let metric = Euclidean::new().build().unwrap();
    let trajectories = vec![
        line(&[0.0, 0.1, 0.2, 0.3]),
        line(&[50.0, 50.1, 50.2, 50.3]),
    ];

    let algorithms: Vec<ClusteringAlgorithm> = vec![
        KCenters::new().n_clusters(2).build().unwrap().into(),
        HybridKMedoids::new()
            .n_clusters(2)
            .random_seed(1)
            .build()
            .unwrap()
            .into(),
        Clarans::new()
            .n_clusters(2)
            .local_swap(false)
            .random_seed(1)
            .build()
            .unwrap()
            .into(),
        SubsampledClarans::new()
            .n_clusters(2)
            .num_samples(2)
            .shrink_multiple(4)
            .local_swap(false)
            .random_seed(1)
            .build()
            .unwrap()
            .into(),
    ];

    for algorithm in algorithms {
        let clustering = algorithm.cluster(&metric, &trajectories).unwrap();
        let flat = clustering.as_flat().unwrap();
        let assignments = flat.assignments().concatenated(&[4, 4]);
        assert_two_groups(&assignments, 4);
    }
}

#[test]
fn hierarchical_rmsd() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tree.yaml");

    let metric = Rmsd::new().build().unwrap();
    let algorithm: ClusteringAlgorithm =
        serde_yaml::from_str("!Hierarchical {method: average}").unwrap();
    let clustering = algorithm.cluster(&metric, &conformations()).unwrap();
    let tree = clustering.as_hierarchical().unwrap();

    assert_eq!(tree.n_leaves(), 5);
    assert_eq!(tree.rows().len(), 4);
    assert_eq!(tree.method(), LinkageMethod::Average);

    // heights never decrease for average linkage
    for pair in tree.rows().windows(2) {
        assert!(pair[0].height <= pair[1].height + 1e-6);
    }

    let assignments = tree.assignments(Some(2), None).unwrap();
    assert_two_groups(&assignments.concatenated(&[3, 2]), 3);

    tree.save(&path, false).unwrap();
    let loaded = MergeTree::load(&path).unwrap();
    assert_eq!(
        loaded.assignments(None, Some(0.1)).unwrap(),
        tree.assignments(None, Some(0.1)).unwrap()
    );
}

#[test]
fn inconsistent_atoms() {
    let metric = Euclidean::new().build().unwrap();
    let trajectories = vec![
        line(&[0.0, 1.0]),
        Trajectory::from_frames(vec![vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]]).unwrap(),
    ];

    match KCenters::new()
        .n_clusters(1)
        .build()
        .unwrap()
        .cluster(&metric, &trajectories)
    {
        Err(ClusteringError::InconsistentAtoms(1, 2)) => (),
        Ok(_) => panic!("Function should have failed."),
        Err(e) => panic!("Incorrect error returned: {}", e),
    }
}

#[test]
fn no_frames() {
    let metric = Euclidean::new().build().unwrap();
    match KCenters::new()
        .n_clusters(1)
        .build()
        .unwrap()
        .cluster(&metric, &[Trajectory::empty(1)])
    {
        Err(ClusteringError::NoFrames) => (),
        Ok(_) => panic!("Function should have failed."),
        Err(e) => panic!("Incorrect error returned: {}", e),
    }
}

#[test]
fn square_pairwise_symmetric() {
    let metric = Rmsd::new().build().unwrap();
    let trajectory = Trajectory::concatenate(&conformations()).unwrap();
    let prepared = metric.prepare(&trajectory).unwrap();
    let square = metric.square_all_pairwise(&prepared).unwrap();

    assert_eq!(square.len(), 5);
    for i in 0..5 {
        assert_eq!(square[i][i], 0.0);
        for j in 0..5 {
            assert_relative_eq!(square[i][j], square[j][i]);
            assert!(square[i][j] >= 0.0);
        }
    }
}
