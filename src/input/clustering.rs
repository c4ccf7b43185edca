// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! Contains structures specifying the parameters of the clustering algorithms.

use std::fmt;
use std::str::FromStr;

use derive_builder::Builder;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::errors::ConfigError;

/// Clustering algorithm to use together with its parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub enum ClusteringAlgorithm {
    KCenters(KCenters),
    HybridKMedoids(HybridKMedoids),
    Clarans(Clarans),
    SubsampledClarans(SubsampledClarans),
    Hierarchical(Hierarchical),
}

impl ClusteringAlgorithm {
    /// Check that the parameters of the algorithm are valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::KCenters(x) => x.validate(),
            Self::HybridKMedoids(x) => x.validate(),
            Self::Clarans(x) => x.validate(),
            Self::SubsampledClarans(x) => x.validate(),
            Self::Hierarchical(_) => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::KCenters(_) => "k-centers",
            Self::HybridKMedoids(_) => "hybrid k-medoids",
            Self::Clarans(_) => "CLARANS",
            Self::SubsampledClarans(_) => "subsampled CLARANS",
            Self::Hierarchical(_) => "hierarchical",
        }
    }

    /// Does the algorithm produce a merge tree instead of a flat clustering?
    pub fn is_hierarchical(&self) -> bool {
        matches!(self, Self::Hierarchical(_))
    }
}

impl From<KCenters> for ClusteringAlgorithm {
    fn from(value: KCenters) -> Self {
        Self::KCenters(value)
    }
}

impl From<HybridKMedoids> for ClusteringAlgorithm {
    fn from(value: HybridKMedoids) -> Self {
        Self::HybridKMedoids(value)
    }
}

impl From<Clarans> for ClusteringAlgorithm {
    fn from(value: Clarans) -> Self {
        Self::Clarans(value)
    }
}

impl From<SubsampledClarans> for ClusteringAlgorithm {
    fn from(value: SubsampledClarans) -> Self {
        Self::SubsampledClarans(value)
    }
}

impl From<Hierarchical> for ClusteringAlgorithm {
    fn from(value: Hierarchical) -> Self {
        Self::Hierarchical(value)
    }
}

fn default_one() -> usize {
    1
}

fn default_num_local_minima() -> usize {
    10
}

fn default_max_neighbors() -> usize {
    20
}

fn default_local_num_iters() -> usize {
    10
}

fn default_norm_exponent() -> f32 {
    2.0
}

fn default_too_close_cutoff() -> f32 {
    1e-4
}

fn default_true() -> bool {
    true
}

/// Exactly one of the stopping criteria must be provided.
pub(crate) fn validate_criterion(
    n_clusters: Option<usize>,
    distance_cutoff: Option<f32>,
) -> Result<(), ConfigError> {
    match (n_clusters, distance_cutoff) {
        (None, None) => Err(ConfigError::NoStoppingCriterion),
        (Some(_), Some(_)) => Err(ConfigError::AmbiguousStoppingCriterion),
        (Some(k), None) => validate_n_clusters(k),
        (None, Some(d)) => validate_distance_cutoff(d),
    }
}

fn validate_n_clusters(n_clusters: usize) -> Result<(), ConfigError> {
    if n_clusters == 0 {
        Err(ConfigError::InvalidNClusters)
    } else {
        Ok(())
    }
}

fn validate_distance_cutoff(cutoff: f32) -> Result<(), ConfigError> {
    if cutoff.is_nan() || cutoff < 0.0 {
        Err(ConfigError::InvalidDistanceCutoff(cutoff))
    } else {
        Ok(())
    }
}

fn validate_positive(value: usize, error: ConfigError) -> Result<(), ConfigError> {
    if value == 0 {
        Err(error)
    } else {
        Ok(())
    }
}

/// Greedy farthest-point clustering.
/// Exactly one of `n_clusters` and `distance_cutoff` must be specified.
#[derive(Debug, Clone, Builder, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct KCenters {
    /// Number of generators to find.
    #[builder(setter(strip_option), default)]
    #[serde(default, alias = "k")]
    #[getset(get_copy = "pub")]
    n_clusters: Option<usize>,
    /// Stop once every frame is at most this far from its generator.
    #[builder(setter(strip_option), default)]
    #[serde(default, alias = "cutoff")]
    #[getset(get_copy = "pub")]
    distance_cutoff: Option<f32>,
    /// Index of the frame (in the concatenated input) used as the first generator.
    #[builder(default)]
    #[serde(default)]
    #[getset(get_copy = "pub")]
    seed: usize,
}

impl KCenters {
    pub fn new() -> KCentersBuilder {
        KCentersBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_criterion(self.n_clusters, self.distance_cutoff)
    }

    pub(crate) fn info(&self) {
        match (self.n_clusters, self.distance_cutoff) {
            (Some(k), _) => log::info!(
                "K-centers clustering into {} clusters (seed frame {}).",
                k,
                self.seed
            ),
            (None, Some(d)) => log::info!(
                "K-centers clustering with a distance cut-off of {} (seed frame {}).",
                d,
                self.seed
            ),
            (None, None) => (),
        }
    }
}

impl KCentersBuilder {
    fn validate(&self) -> Result<(), String> {
        validate_criterion(self.n_clusters.flatten(), self.distance_cutoff.flatten())
            .map_err(|e| e.to_string())
    }
}

/// K-medoids refinement of a k-centers clustering using random medoid swaps.
#[derive(Debug, Clone, Builder, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
#[getset(get_copy = "pub")]
pub struct HybridKMedoids {
    /// Number of medoids.
    #[builder(setter(strip_option), default)]
    #[serde(default, alias = "k")]
    n_clusters: Option<usize>,
    /// Distance cut-off used by the initial k-centers clustering.
    #[builder(setter(strip_option), default)]
    #[serde(default, alias = "cutoff")]
    distance_cutoff: Option<f32>,
    /// Number of sweeps proposing trial medoids from the medoid's own cluster.
    #[builder(default = "10")]
    #[serde(default = "default_local_num_iters")]
    local_num_iters: usize,
    /// Number of sweeps proposing trial medoids from all frames.
    #[builder(default = "0")]
    #[serde(default)]
    global_num_iters: usize,
    /// Exponent of the norm used as the objective function.
    #[builder(default = "2.0")]
    #[serde(default = "default_norm_exponent")]
    norm_exponent: f32,
    /// Local trials closer than this to the current medoid are skipped.
    #[builder(default = "1e-4")]
    #[serde(default = "default_too_close_cutoff")]
    too_close_cutoff: f32,
    /// Accept swaps even if they increase the maximal distance of a frame to its medoid.
    #[builder(default = "false")]
    #[serde(default)]
    ignore_max_objective: bool,
    /// Seed for the random number generator. Random if not specified.
    #[builder(setter(strip_option), default)]
    #[serde(default)]
    random_seed: Option<u64>,
}

impl HybridKMedoids {
    pub fn new() -> HybridKMedoidsBuilder {
        HybridKMedoidsBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_criterion(self.n_clusters, self.distance_cutoff)?;
        validate_norm_exponent(self.norm_exponent)?;
        validate_too_close_cutoff(self.too_close_cutoff)
    }

    pub(crate) fn info(&self) {
        log::info!(
            "Hybrid k-medoids clustering ({} local and {} global sweeps, norm exponent {}).",
            self.local_num_iters,
            self.global_num_iters,
            self.norm_exponent
        );
    }
}

fn validate_norm_exponent(exponent: f32) -> Result<(), ConfigError> {
    if exponent.is_nan() || exponent <= 0.0 {
        Err(ConfigError::InvalidNormExponent(exponent))
    } else {
        Ok(())
    }
}

fn validate_too_close_cutoff(cutoff: f32) -> Result<(), ConfigError> {
    if cutoff.is_nan() || cutoff < 0.0 {
        Err(ConfigError::InvalidTooCloseCutoff(cutoff))
    } else {
        Ok(())
    }
}

impl HybridKMedoidsBuilder {
    fn validate(&self) -> Result<(), String> {
        validate_criterion(self.n_clusters.flatten(), self.distance_cutoff.flatten())
            .map_err(|e| e.to_string())?;

        if let Some(exponent) = self.norm_exponent {
            validate_norm_exponent(exponent).map_err(|e| e.to_string())?;
        }

        if let Some(cutoff) = self.too_close_cutoff {
            validate_too_close_cutoff(cutoff).map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

/// Clustering Large Applications based on RANdomized Search.
#[derive(Debug, Clone, Builder, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
#[getset(get_copy = "pub")]
pub struct Clarans {
    /// Number of medoids.
    #[serde(alias = "k")]
    n_clusters: usize,
    /// Number of independent local searches.
    #[builder(default = "10")]
    #[serde(default = "default_num_local_minima")]
    num_local_minima: usize,
    /// Number of consecutive rejected swaps after which a search is declared a local minimum.
    #[builder(default = "20")]
    #[serde(default = "default_max_neighbors")]
    max_neighbors: usize,
    /// Propose trial medoids from the medoid's own cluster instead of from all frames.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    local_swap: bool,
    /// Seed for the random number generator. Random if not specified.
    #[builder(setter(strip_option), default)]
    #[serde(default)]
    random_seed: Option<u64>,
}

fn validate_clarans(
    n_clusters: usize,
    num_local_minima: usize,
    max_neighbors: usize,
) -> Result<(), ConfigError> {
    validate_n_clusters(n_clusters)?;
    validate_positive(num_local_minima, ConfigError::InvalidNumLocalMinima)?;
    validate_positive(max_neighbors, ConfigError::InvalidMaxNeighbors)
}

impl Clarans {
    pub fn new() -> ClaransBuilder {
        ClaransBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_clarans(self.n_clusters, self.num_local_minima, self.max_neighbors)
    }

    pub(crate) fn info(&self) {
        log::info!(
            "CLARANS clustering into {} clusters ({} local minima, {} neighbors, {} swaps).",
            self.n_clusters,
            self.num_local_minima,
            self.max_neighbors,
            if self.local_swap { "local" } else { "global" }
        );
    }
}

impl ClaransBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(k) = self.n_clusters {
            validate_n_clusters(k).map_err(|e| e.to_string())?;
        }

        if let Some(n) = self.num_local_minima {
            validate_positive(n, ConfigError::InvalidNumLocalMinima).map_err(|e| e.to_string())?;
        }

        if let Some(n) = self.max_neighbors {
            validate_positive(n, ConfigError::InvalidMaxNeighbors).map_err(|e| e.to_string())?;
        }

        Ok(())
    }
}

/// CLARANS performed independently on several random subsamples of the data.
/// The best set of medoids (evaluated on all frames) is kept.
#[derive(Debug, Clone, Builder, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[builder(build_fn(validate = "Self::validate"))]
#[getset(get_copy = "pub")]
pub struct SubsampledClarans {
    /// Number of medoids.
    #[serde(alias = "k")]
    n_clusters: usize,
    /// Number of subsamples to draw.
    num_samples: usize,
    /// Each subsample contains `shrink_multiple * n_clusters` frames.
    shrink_multiple: usize,
    #[builder(default = "10")]
    #[serde(default = "default_num_local_minima")]
    num_local_minima: usize,
    #[builder(default = "20")]
    #[serde(default = "default_max_neighbors")]
    max_neighbors: usize,
    #[builder(default = "false")]
    #[serde(default)]
    local_swap: bool,
    /// Number of threads searching the subsamples.
    #[builder(default = "1")]
    #[serde(default = "default_one")]
    n_threads: usize,
    /// Seed for the random number generator. Random if not specified.
    #[builder(setter(strip_option), default)]
    #[serde(default)]
    random_seed: Option<u64>,
}

impl SubsampledClarans {
    pub fn new() -> SubsampledClaransBuilder {
        SubsampledClaransBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_clarans(self.n_clusters, self.num_local_minima, self.max_neighbors)?;
        validate_positive(self.num_samples, ConfigError::InvalidNumSamples)?;
        validate_positive(self.shrink_multiple, ConfigError::InvalidShrinkMultiple)?;
        validate_positive(self.n_threads, ConfigError::InvalidNThreads)
    }

    /// Convert to the CLARANS search performed on each subsample.
    pub(crate) fn to_clarans(&self) -> Clarans {
        Clarans {
            n_clusters: self.n_clusters,
            num_local_minima: self.num_local_minima,
            max_neighbors: self.max_neighbors,
            local_swap: self.local_swap,
            random_seed: self.random_seed,
        }
    }

    pub(crate) fn info(&self) {
        log::info!(
            "Subsampled CLARANS clustering into {} clusters ({} samples of {} frames, {} threads).",
            self.n_clusters,
            self.num_samples,
            self.n_clusters * self.shrink_multiple,
            self.n_threads
        );
    }
}

impl SubsampledClaransBuilder {
    fn validate(&self) -> Result<(), String> {
        let checks = [
            (self.n_clusters, ConfigError::InvalidNClusters),
            (self.num_samples, ConfigError::InvalidNumSamples),
            (self.shrink_multiple, ConfigError::InvalidShrinkMultiple),
            (self.num_local_minima, ConfigError::InvalidNumLocalMinima),
            (self.max_neighbors, ConfigError::InvalidMaxNeighbors),
            (self.n_threads, ConfigError::InvalidNThreads),
        ];

        for (value, error) in checks {
            if let Some(v) = value {
                validate_positive(v, error).map_err(|e| e.to_string())?;
            }
        }

        Ok(())
    }
}

/// Method used to calculate distances between merged clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(try_from = "String", into = "String")]
pub enum LinkageMethod {
    Single,
    Complete,
    Average,
    Weighted,
    Centroid,
    Median,
    #[default]
    Ward,
}

impl FromStr for LinkageMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            "weighted" => Ok(Self::Weighted),
            "centroid" => Ok(Self::Centroid),
            "median" => Ok(Self::Median),
            "ward" => Ok(Self::Ward),
            _ => Err(ConfigError::UnknownLinkageMethod(s.to_owned())),
        }
    }
}

impl TryFrom<String> for LinkageMethod {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LinkageMethod> for String {
    fn from(value: LinkageMethod) -> Self {
        value.to_string()
    }
}

/// Agglomerative clustering producing a merge tree.
#[derive(Debug, Clone, Default, Builder, CopyGetters, Deserialize)]
#[serde(deny_unknown_fields)]
#[getset(get_copy = "pub")]
pub struct Hierarchical {
    /// Linkage method. Ward by default.
    #[builder(default)]
    #[serde(default)]
    method: LinkageMethod,
}

impl Hierarchical {
    pub fn new() -> HierarchicalBuilder {
        HierarchicalBuilder::default()
    }

    pub(crate) fn info(&self) {
        log::info!("Hierarchical clustering using '{}' linkage.", self.method);
    }
}

impl fmt::Display for ClusteringAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
