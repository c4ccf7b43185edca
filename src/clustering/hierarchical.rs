// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Implementation of agglomerative hierarchical clustering and of the merge tree it produces.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assigning::{AssignmentMatrix, ASSIGNMENT_SENTINEL};
use crate::errors::{ClusteringError, WriteError};
use crate::input::clustering::validate_criterion;
use crate::input::{Hierarchical, LinkageMethod};
use crate::metrics::{condensed_index, Metric, Prepared};
use crate::presentation;
use crate::trajectory::Trajectory;

use super::prepare_input;

/// Single merge of two clusters.
/// Leaves (frames) are clusters `0..n`, the cluster created by row `r` has index `n + r`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkageRow {
    /// Smaller index of the merged clusters.
    pub cluster_a: usize,
    /// Larger index of the merged clusters.
    pub cluster_b: usize,
    /// Distance between the merged clusters.
    pub height: f64,
    /// Number of frames in the new cluster.
    pub size: usize,
}

/// Result of a hierarchical clustering.
/// The tree can be cut repeatedly to obtain flat assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeTree {
    /// Linkage method used to construct the tree.
    method: LinkageMethod,
    /// Lengths of the clustered trajectories.
    traj_lengths: Vec<usize>,
    /// Merges in the order in which they happened.
    rows: Vec<LinkageRow>,
}

impl Hierarchical {
    /// Construct the merge tree for all frames of the trajectories.
    pub fn cluster<M: Metric>(
        &self,
        metric: &M,
        trajectories: &[Trajectory],
    ) -> Result<MergeTree, ClusteringError> {
        self.info();

        let (prepared, lengths) = prepare_input(metric, trajectories)?;
        let n_frames = prepared.n_frames();

        let rows = if n_frames > 1 {
            let condensed = metric.all_pairwise(&prepared)?;
            linkage(&condensed, n_frames, self.method())
        } else {
            Vec::new()
        };

        log::info!("Merge tree constructed ({} merges).", rows.len());

        Ok(MergeTree {
            method: self.method(),
            traj_lengths: lengths,
            rows,
        })
    }
}

impl MergeTree {
    /// Create a merge tree from linkage rows checking its consistency.
    pub fn new(
        method: LinkageMethod,
        traj_lengths: Vec<usize>,
        rows: Vec<LinkageRow>,
    ) -> Result<Self, ClusteringError> {
        let tree = MergeTree {
            method,
            traj_lengths,
            rows,
        };

        tree.validate()?;
        Ok(tree)
    }

    #[inline(always)]
    pub fn method(&self) -> LinkageMethod {
        self.method
    }

    #[inline(always)]
    pub fn rows(&self) -> &[LinkageRow] {
        &self.rows
    }

    #[inline(always)]
    pub fn traj_lengths(&self) -> &[usize] {
        &self.traj_lengths
    }

    /// Number of clustered frames.
    #[inline(always)]
    pub fn n_leaves(&self) -> usize {
        self.traj_lengths.iter().sum()
    }

    /// Check that every row only refers to previously existing clusters.
    fn validate(&self) -> Result<(), ClusteringError> {
        let n = self.n_leaves();
        if n == 0 {
            return Err(ClusteringError::NoFrames);
        }

        if self.rows.len() != n - 1 {
            return Err(ClusteringError::CorruptedMergeTree(self.rows.len().min(n - 1)));
        }

        let mut used = vec![false; 2 * n - 1];
        for (r, row) in self.rows.iter().enumerate() {
            for c in [row.cluster_a, row.cluster_b] {
                if c >= n + r || used[c] {
                    return Err(ClusteringError::CorruptedMergeTree(r));
                }
                used[c] = true;
            }
        }

        Ok(())
    }

    /// Cut the tree into flat clusters.
    ///
    /// Exactly one of `n_clusters` (maximal number of clusters) and `distance_cutoff`
    /// (maximal cophenetic distance inside a cluster) must be provided.
    /// Clusters are numbered in the left-to-right order of the tree.
    pub fn assignments(
        &self,
        n_clusters: Option<usize>,
        distance_cutoff: Option<f32>,
    ) -> Result<AssignmentMatrix, ClusteringError> {
        validate_criterion(n_clusters, distance_cutoff)?;

        let labels = match (n_clusters, distance_cutoff) {
            (Some(k), _) => self.cut_n_clusters(k),
            (None, Some(t)) => self.cut_distance(t as f64),
            (None, None) => unreachable!(
                "FATAL MICROSTATES ERROR | MergeTree::assignments | Stopping criterion should have been validated. {}",
                crate::PANIC_MESSAGE
            ),
        };

        let values: Vec<i32> = labels.into_iter().map(|x| x as i32).collect();
        Ok(AssignmentMatrix::from_concatenated(
            &self.traj_lengths,
            &values,
            ASSIGNMENT_SENTINEL,
        ))
    }

    /// Largest merge height inside the subtree of every internal node.
    fn max_dists(&self) -> Vec<f64> {
        let n = self.n_leaves();
        let mut max_dists = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut max = row.height;
            for c in [row.cluster_a, row.cluster_b] {
                if c >= n {
                    max = max.max(max_dists[c - n]);
                }
            }
            max_dists.push(max);
        }

        max_dists
    }

    /// Cut the tree so that there are at most `n_clusters` clusters.
    fn cut_n_clusters(&self, n_clusters: usize) -> Vec<usize> {
        let n = self.n_leaves();
        if n_clusters >= n {
            return self.cut_distance(f64::NEG_INFINITY);
        }

        let mut sorted = self.max_dists();
        sorted.sort_by(|a, b| a.total_cmp(b));
        self.cut_distance(sorted[n - n_clusters - 1])
    }

    /// Form flat clusters from subtrees with no merge higher than `threshold`.
    fn cut_distance(&self, threshold: f64) -> Vec<usize> {
        let n = self.n_leaves();
        let max_dists = self.max_dists();
        let mut labels = vec![0usize; n];
        let mut next_label = 0;

        let root = 2 * n - 2;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node < n {
                labels[node] = next_label;
                next_label += 1;
                continue;
            }

            if max_dists[node - n] <= threshold {
                for leaf in self.leaves(node) {
                    labels[leaf] = next_label;
                }
                next_label += 1;
                continue;
            }

            let row = &self.rows[node - n];
            stack.push(row.cluster_b);
            stack.push(row.cluster_a);
        }

        labels
    }

    /// Leaves of the subtree rooted at `node`.
    fn leaves(&self, node: usize) -> Vec<usize> {
        let n = self.n_leaves();
        let mut leaves = Vec::new();
        let mut stack = vec![node];
        while let Some(c) = stack.pop() {
            if c < n {
                leaves.push(c);
            } else {
                let row = &self.rows[c - n];
                stack.push(row.cluster_b);
                stack.push(row.cluster_a);
            }
        }

        leaves
    }

    /// Write the merge tree into a yaml file.
    pub fn save(&self, path: impl AsRef<Path>, overwrite: bool) -> Result<(), ClusteringError> {
        presentation::write_yaml(path, self, overwrite, "merge tree").map_err(ClusteringError::from)
    }

    /// Read a merge tree from a yaml file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClusteringError> {
        let tree: MergeTree = presentation::read_yaml(&path).map_err(|e| match e {
            WriteError::CouldNotParseYaml(p, e) => ClusteringError::CouldNotParseMergeTree(p, e),
            _ => ClusteringError::CouldNotReadMergeTree(Box::from(path.as_ref())),
        })?;

        tree.validate()?;
        Ok(tree)
    }
}

/// Active cluster during the agglomeration.
#[derive(Debug, Clone, Copy)]
struct Slot {
    /// Index of the cluster in the merge tree.
    label: usize,
    size: usize,
    active: bool,
}

/// Perform agglomerative clustering of `n` items using Lance-Williams distance updates.
/// Ties are resolved in favor of the pair with the smallest first and then second index.
fn linkage(condensed: &[f32], n: usize, method: LinkageMethod) -> Vec<LinkageRow> {
    let mut dist: Vec<f64> = condensed.iter().map(|&d| d as f64).collect();
    let d = |dist: &[f64], i: usize, j: usize| -> f64 {
        if i < j {
            dist[condensed_index(n, i, j)]
        } else {
            dist[condensed_index(n, j, i)]
        }
    };

    let mut slots: Vec<Slot> = (0..n)
        .map(|i| Slot {
            label: i,
            size: 1,
            active: true,
        })
        .collect();

    // nearest active neighbor with a larger index for every slot
    let nearest = |dist: &[f64], slots: &[Slot], i: usize| -> (usize, f64) {
        let mut best = (usize::MAX, f64::INFINITY);
        for j in (i + 1)..n {
            if slots[j].active {
                let dij = d(dist, i, j);
                if dij < best.1 || best.0 == usize::MAX {
                    best = (j, dij);
                }
            }
        }
        best
    };

    let mut neighbors: Vec<(usize, f64)> = (0..n).map(|i| nearest(&dist, &slots, i)).collect();
    let mut rows = Vec::with_capacity(n.saturating_sub(1));

    for r in 0..n.saturating_sub(1) {
        // closest pair
        let mut i = usize::MAX;
        let mut best = f64::INFINITY;
        for k in 0..n {
            if slots[k].active && neighbors[k].0 != usize::MAX {
                if i == usize::MAX || neighbors[k].1 < best {
                    i = k;
                    best = neighbors[k].1;
                }
            }
        }
        let (j, dij) = neighbors[i];

        let (size_i, size_j) = (slots[i].size, slots[j].size);
        let (label_i, label_j) = (slots[i].label, slots[j].label);
        rows.push(LinkageRow {
            cluster_a: label_i.min(label_j),
            cluster_b: label_i.max(label_j),
            height: dij,
            size: size_i + size_j,
        });

        // merge j into i
        for k in 0..n {
            if !slots[k].active || k == i || k == j {
                continue;
            }

            let updated = lance_williams(
                method,
                d(&dist, k, i),
                d(&dist, k, j),
                dij,
                size_i as f64,
                size_j as f64,
                slots[k].size as f64,
            );

            let index = if k < i {
                condensed_index(n, k, i)
            } else {
                condensed_index(n, i, k)
            };
            dist[index] = updated;
        }

        slots[i] = Slot {
            label: n + r,
            size: size_i + size_j,
            active: true,
        };
        slots[j].active = false;

        // update the nearest neighbors
        for k in 0..n {
            if !slots[k].active {
                continue;
            }

            if k == i || neighbors[k].0 == i || neighbors[k].0 == j {
                neighbors[k] = nearest(&dist, &slots, k);
            } else if k < i {
                let dki = d(&dist, k, i);
                if dki < neighbors[k].1 || (dki == neighbors[k].1 && i < neighbors[k].0) {
                    neighbors[k] = (i, dki);
                }
            }
        }
    }

    rows
}

/// Distance between cluster k and the cluster created by merging clusters i and j.
fn lance_williams(
    method: LinkageMethod,
    d_ki: f64,
    d_kj: f64,
    d_ij: f64,
    n_i: f64,
    n_j: f64,
    n_k: f64,
) -> f64 {
    match method {
        LinkageMethod::Single => d_ki.min(d_kj),
        LinkageMethod::Complete => d_ki.max(d_kj),
        LinkageMethod::Average => (n_i * d_ki + n_j * d_kj) / (n_i + n_j),
        LinkageMethod::Weighted => 0.5 * (d_ki + d_kj),
        LinkageMethod::Centroid => {
            let n_ij = n_i + n_j;
            let squared = (n_i * d_ki * d_ki + n_j * d_kj * d_kj) / n_ij
                - n_i * n_j * d_ij * d_ij / (n_ij * n_ij);
            squared.max(0.0).sqrt()
        }
        LinkageMethod::Median => (0.5 * d_ki * d_ki + 0.5 * d_kj * d_kj - 0.25 * d_ij * d_ij)
            .max(0.0)
            .sqrt(),
        LinkageMethod::Ward => {
            let total = n_i + n_j + n_k;
            (((n_i + n_k) * d_ki * d_ki + (n_j + n_k) * d_kj * d_kj - n_k * d_ij * d_ij) / total)
                .max(0.0)
                .sqrt()
        }
    }
}
