//! Configuration for the mining stages.
//!
//! # Example
//!
//! ```
//! use techskills_mining::{ClusterSelection, MiningConfig};
//!
//! let config = MiningConfig::builder()
//!     .cluster_selection(ClusterSelection::Fixed { k: 3 })
//!     .random_seed(7)
//!     .n_trees(25)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.n_trees, 25);
//! ```

use crate::error::MiningError;
use serde::{Deserialize, Serialize};
use techskills_processing::SourceType;

/// How the number of clusters is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ClusterSelection {
    /// Always use `k` clusters.
    Fixed { k: usize },

    /// `k = clamp(rows / rows_per_cluster, 2, max_clusters)`.
    RowHeuristic {
        max_clusters: usize,
        rows_per_cluster: usize,
    },

    /// Fit every `k` in `min_k..=max_k` and keep the highest mean silhouette.
    /// Ties go to the smaller `k`.
    Silhouette { min_k: usize, max_k: usize },
}

impl Default for ClusterSelection {
    fn default() -> Self {
        Self::RowHeuristic {
            max_clusters: 5,
            rows_per_cluster: 20,
        }
    }
}

impl ClusterSelection {
    /// Candidate cluster counts for `rows` feature rows, smallest first.
    pub fn candidates(&self, rows: usize) -> Vec<usize> {
        match *self {
            Self::Fixed { k } => vec![k],
            Self::RowHeuristic {
                max_clusters,
                rows_per_cluster,
            } => vec![(rows / rows_per_cluster).clamp(2, max_clusters)],
            Self::Silhouette { min_k, max_k } => (min_k..=max_k).collect(),
        }
    }
}

/// Rule deriving the binary high-demand label from a job's salary.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DemandRule {
    /// High demand when the salary is strictly above the median salary of
    /// the labeled records.
    #[default]
    MedianSalary,

    /// High demand when the salary is strictly above a fixed USD amount.
    SalaryAbove { threshold: f64 },
}

impl DemandRule {
    pub fn describe(&self) -> String {
        match self {
            Self::MedianSalary => "salary > median salary".to_string(),
            Self::SalaryAbove { threshold } => format!("salary > {:.0} USD", threshold),
        }
    }
}

/// Configuration for clustering, classification and the orchestrator.
///
/// Use [`MiningConfig::builder()`] to construct a validated configuration.
/// Deserialized configurations should be checked with [`MiningConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Seed for every random choice (default: 42).
    pub random_seed: u64,

    /// Source whose records are clustered (default: profiles).
    pub clustering_source: SourceType,

    pub cluster_selection: ClusterSelection,

    /// Independent seeded k-means runs; the lowest inertia wins (default: 10).
    pub kmeans_restarts: usize,

    /// Lloyd iteration cap per run (default: 300).
    pub max_iterations: usize,

    /// Source whose records are classified (default: jobs).
    pub classification_source: SourceType,

    pub demand_rule: DemandRule,

    /// Fraction of labeled records held out for evaluation (default: 0.3).
    pub test_fraction: f64,

    /// Trees in the random forest (default: 50).
    pub n_trees: usize,

    /// Maximum tree depth (default: 12).
    pub max_depth: usize,

    /// Minimum samples a node needs before it may be split (default: 2).
    pub min_samples_split: usize,

    /// Minimum labeled records required to train the classifier (default: 10).
    pub min_rows: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            random_seed: 42,
            clustering_source: SourceType::Profile,
            cluster_selection: ClusterSelection::default(),
            kmeans_restarts: 10,
            max_iterations: 300,
            classification_source: SourceType::Job,
            demand_rule: DemandRule::default(),
            test_fraction: 0.3,
            n_trees: 50,
            max_depth: 12,
            min_samples_split: 2,
            min_rows: 10,
        }
    }
}

impl MiningConfig {
    #[must_use]
    pub fn builder() -> MiningConfigBuilder {
        MiningConfigBuilder::default()
    }

    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::InvalidConfig`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), MiningError> {
        let invalid = |message: &str| Err(MiningError::InvalidConfig(message.to_string()));

        match self.cluster_selection {
            ClusterSelection::Fixed { k } if k < 2 => {
                return invalid("fixed cluster count must be at least 2");
            }
            ClusterSelection::RowHeuristic {
                max_clusters,
                rows_per_cluster,
            } if max_clusters < 2 || rows_per_cluster == 0 => {
                return invalid(
                    "row heuristic needs max_clusters >= 2 and rows_per_cluster >= 1",
                );
            }
            ClusterSelection::Silhouette { min_k, max_k } if min_k < 2 || max_k < min_k => {
                return invalid("silhouette search needs 2 <= min_k <= max_k");
            }
            _ => {}
        }

        if self.kmeans_restarts == 0 {
            return invalid("kmeans_restarts must be at least 1");
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1");
        }
        if let DemandRule::SalaryAbove { threshold } = self.demand_rule
            && !(threshold.is_finite() && threshold > 0.0)
        {
            return invalid("salary threshold must be a positive amount");
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return invalid("test_fraction must be between 0.0 and 1.0 (exclusive)");
        }
        if self.n_trees == 0 {
            return invalid("n_trees must be at least 1");
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1");
        }
        if self.min_samples_split < 2 {
            return invalid("min_samples_split must be at least 2");
        }
        if self.min_rows < 2 {
            return invalid("min_rows must be at least 2");
        }
        Ok(())
    }
}

/// Builder for [`MiningConfig`].
///
/// Created via [`MiningConfig::builder()`]. All setters return `self` to allow
/// method chaining.
#[derive(Debug, Clone, Default)]
pub struct MiningConfigBuilder {
    config: MiningConfig,
}

impl MiningConfigBuilder {
    /// Set the random seed for reproducibility (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    #[must_use]
    pub fn clustering_source(mut self, source: SourceType) -> Self {
        self.config.clustering_source = source;
        self
    }

    #[must_use]
    pub fn cluster_selection(mut self, selection: ClusterSelection) -> Self {
        self.config.cluster_selection = selection;
        self
    }

    #[must_use]
    pub fn kmeans_restarts(mut self, restarts: usize) -> Self {
        self.config.kmeans_restarts = restarts;
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.max_iterations = iterations;
        self
    }

    #[must_use]
    pub fn classification_source(mut self, source: SourceType) -> Self {
        self.config.classification_source = source;
        self
    }

    #[must_use]
    pub fn demand_rule(mut self, rule: DemandRule) -> Self {
        self.config.demand_rule = rule;
        self
    }

    /// Set the held-out fraction (default: 0.3).
    ///
    /// [`build()`](Self::build) returns an error unless `0.0 < fraction < 1.0`.
    #[must_use]
    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.config.test_fraction = fraction;
        self
    }

    #[must_use]
    pub fn n_trees(mut self, n: usize) -> Self {
        self.config.n_trees = n;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    #[must_use]
    pub fn min_samples_split(mut self, samples: usize) -> Self {
        self.config.min_samples_split = samples;
        self
    }

    #[must_use]
    pub fn min_rows(mut self, rows: usize) -> Self {
        self.config.min_rows = rows;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::InvalidConfig`] if any setting is out of range.
    pub fn build(self) -> Result<MiningConfig, MiningError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
