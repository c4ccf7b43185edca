// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Functions used in various integration tests.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use microstates::prelude::*;

/// Test utility. Write a single-frame gro file.
#[allow(dead_code)]
pub(super) fn write_gro(dir: &Path, name: &str, positions: &[[f32; 3]]) {
    let mut file = File::create(dir.join(name)).unwrap();
    writeln!(file, "Generated for microstates tests").unwrap();
    writeln!(file, "{:>5}", positions.len()).unwrap();
    for (i, p) in positions.iter().enumerate() {
        writeln!(
            file,
            "{:>5}{:<5}{:>5}{:>5}{:>8.3}{:>8.3}{:>8.3}",
            1,
            "LIG",
            "C",
            i + 1,
            p[0],
            p[1],
            p[2]
        )
        .unwrap();
    }
    writeln!(file, "{:>10.5}{:>10.5}{:>10.5}", 10.0, 10.0, 10.0).unwrap();
}

/// Test utility. Frame with two atoms separated by 1 nm along x, the first one at `x`.
#[allow(dead_code)]
pub(super) fn dimer(x: f32) -> Vec<[f32; 3]> {
    vec![[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0]]
}

/// Test utility. Write a project with one single-frame trajectory per frame.
/// Returns the path to the project manifest.
#[allow(dead_code)]
pub(super) fn write_project(dir: &Path, frames: &[Vec<[f32; 3]>]) -> PathBuf {
    write_gro(dir, "conf.gro", &frames[0]);

    let mut paths = Vec::new();
    for (i, frame) in frames.iter().enumerate() {
        let name = format!("frame{:03}.gro", i);
        write_gro(dir, &name, frame);
        paths.push(name);
    }

    let manifest = dir.join("project.yaml");
    let mut file = File::create(&manifest).unwrap();
    writeln!(file, "conf_filename: conf.gro").unwrap();
    writeln!(file, "traj_paths: [{}]", paths.join(", ")).unwrap();
    writeln!(
        file,
        "traj_lengths: [{}]",
        vec!["1"; frames.len()].join(", ")
    )
    .unwrap();

    manifest
}

/// Test utility. Two well separated groups of dimers.
#[allow(dead_code)]
pub(super) fn two_groups() -> Vec<Vec<[f32; 3]>> {
    [0.0, 0.1, 0.2, 5.0, 5.1, 5.2]
        .iter()
        .map(|&x| dimer(x))
        .collect()
}

/// Test utility. Trajectory of single-atom frames placed along x.
#[allow(dead_code)]
pub(super) fn line(xs: &[f32]) -> Trajectory {
    Trajectory::from_frames(xs.iter().map(|&x| vec![[x, 0.0, 0.0]]).collect()).unwrap()
}

/// Test utility. Rotate a structure by 90 degrees around z and translate it.
#[allow(dead_code)]
pub(super) fn rotate_translate(frame: &[[f32; 3]], shift: [f32; 3]) -> Vec<[f32; 3]> {
    frame
        .iter()
        .map(|p| [-p[1] + shift[0], p[0] + shift[1], p[2] + shift[2]])
        .collect()
}

/// Test utility. Assert that the first `n` values are equal, the rest are equal, and the groups differ.
#[allow(dead_code)]
pub(super) fn assert_two_groups(values: &[i32], n: usize) {
    assert!(values[..n].iter().all(|&x| x == values[0]));
    assert!(values[n..].iter().all(|&x| x == values[n]));
    assert_ne!(values[0], values[n]);
}
