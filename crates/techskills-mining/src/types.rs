//! Result types produced by the mining stages.
//!
//! # Overview
//!
//! - [`ClusteringResult`]: per-record [`ClusterAssignment`]s and [`ClusterProfile`]s
//! - [`ClassificationResult`]: per-record predictions, [`ConfusionCounts`],
//!   feature importances, the [`ModelComparison`]s and the majority-class
//!   baseline

use crate::config::{ClusterSelection, DemandRule};
use serde::{Deserialize, Serialize};
use std::fmt;
use techskills_processing::{Country, RecordId, SourceType};

/// The mining techniques run by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    Clustering,
    Classification,
}

impl Technique {
    pub const ALL: [Technique; 2] = [Technique::Clustering, Technique::Classification];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clustering => "clustering",
            Self::Classification => "classification",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Clustering
// =============================================================================

/// Cluster label of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub record_id: RecordId,
    pub cluster: usize,
}

/// Human-readable description of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    /// Share of clustered records, in percent (two decimals).
    pub share_pct: f64,
    /// Mean over the members that have a salary.
    pub mean_salary: Option<f64>,
    /// Mean over the members that have an age.
    pub mean_age: Option<f64>,
    /// Most frequent country; ties go to declaration order.
    pub dominant_country: Option<Country>,
    /// Centroid in standardized feature space.
    pub centroid: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub source_type: SourceType,
    pub selection: ClusterSelection,
    /// Chosen number of clusters.
    pub k: usize,
    pub feature_names: Vec<String>,
    pub assignments: Vec<ClusterAssignment>,
    pub profiles: Vec<ClusterProfile>,
    /// Sum of squared distances to the assigned centroids.
    pub inertia: f64,
    /// Mean silhouette coefficient, when it could be computed.
    pub silhouette: Option<f64>,
    pub iterations: usize,
}

impl ClusteringResult {
    pub fn cluster_of(&self, record_id: RecordId) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| a.record_id == record_id)
            .map(|a| a.cluster)
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Binary confusion matrix on the test split; "positive" means high demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (bool, bool)>) -> Self {
        let mut counts = Self::default();
        for (actual, predicted) in pairs {
            match (actual, predicted) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Share of correct predictions; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => (self.true_positive + self.true_negative) as f64 / total as f64,
        }
    }
}

/// Coarse accuracy rating: High (> 0.8), Medium (> 0.6), Low otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelQuality {
    High,
    Medium,
    Low,
}

impl ModelQuality {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy > 0.8 {
            Self::High
        } else if accuracy > 0.6 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Classifiers trained on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    RandomForest,
    LogisticRegression,
}

impl ClassifierKind {
    /// Comparison order; earlier kinds win accuracy ties.
    pub const ALL: [ClassifierKind; 2] = [
        ClassifierKind::RandomForest,
        ClassifierKind::LogisticRegression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomForest => "random_forest",
            Self::LogisticRegression => "logistic_regression",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores of one trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model: ClassifierKind,
    pub train_accuracy: f64,
    /// Accuracy on the held-out split; picks the best model.
    pub test_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Prediction for one labeled record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPrediction {
    pub record_id: RecordId,
    pub actual: bool,
    pub predicted: bool,
    /// Whether the record was held out of training.
    pub in_test_split: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub source_type: SourceType,
    pub demand_rule: DemandRule,
    /// Salary the label compares against.
    pub salary_threshold: f64,
    pub labeled_records: usize,
    pub positive_records: usize,
    pub train_size: usize,
    pub test_size: usize,
    /// Model with the highest test accuracy; confusion, accuracy and
    /// predictions come from it.
    pub best_model: ClassifierKind,
    /// One entry per [`ClassifierKind`], in comparison order.
    pub models: Vec<ModelComparison>,
    pub confusion: ConfusionCounts,
    /// Always equal to `confusion.accuracy()`.
    pub accuracy: f64,
    /// Accuracy of always predicting the training split's majority class.
    pub baseline_accuracy: f64,
    pub quality: ModelQuality,
    /// From the random forest whichever model wins. Sorted descending; sums
    /// to 1 unless no tree ever split.
    pub feature_importances: Vec<FeatureImportance>,
    pub predictions: Vec<RecordPrediction>,
}
