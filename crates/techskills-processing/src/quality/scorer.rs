use crate::config::{QualityWeights, StatusThresholds};
use crate::types::CanonicalRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Overall verdict derived from the quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl QualityStatus {
    pub fn from_score(score: f64, thresholds: &StatusThresholds) -> Self {
        if score > thresholds.excellent {
            QualityStatus::Excellent
        } else if score > thresholds.good {
            QualityStatus::Good
        } else if score > thresholds.fair {
            QualityStatus::Fair
        } else {
            QualityStatus::NeedsImprovement
        }
    }
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityStatus::Excellent => "EXCELLENT",
            QualityStatus::Good => "GOOD",
            QualityStatus::Fair => "FAIR",
            QualityStatus::NeedsImprovement => "NEEDS_IMPROVEMENT",
        };
        f.write_str(label)
    }
}

/// Counts gathered by the earlier stages of one run.
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs<'a> {
    pub total_raw: usize,
    pub schema_rejections: usize,
    pub total_unified: usize,
    pub total_after_dedup: usize,
    pub duplicate_count: usize,
    /// Distinct records with at least one outlier flag.
    pub outlier_count: usize,
    /// Records the outlier engine evaluated.
    pub outlier_scope: usize,
    pub capped_count: usize,
    pub removed_count: usize,
    /// The resolved set that completeness is measured on.
    pub records: &'a [CanonicalRecord],
}

/// Aggregate quality of one pipeline run. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_raw: usize,
    pub schema_rejections: usize,
    pub total_unified: usize,
    pub total_after_dedup: usize,
    pub total_after_outliers: usize,
    pub duplicate_count: usize,
    pub outlier_count: usize,
    pub capped_count: usize,
    pub removed_count: usize,
    /// Missing applicable cells per field in the resolved set.
    pub missing_by_field: BTreeMap<String, usize>,
    pub completeness: f64,
    pub uniqueness: f64,
    pub validity: f64,
    /// Weighted composite in 0..=100.
    pub score: f64,
    pub status: QualityStatus,
    pub weights: QualityWeights,
    pub generated_at: DateTime<Utc>,
}

impl QualityReport {
    /// `duplicate_count + total_after_dedup == total_unified`.
    pub fn is_consistent(&self) -> bool {
        self.duplicate_count + self.total_after_dedup == self.total_unified
    }
}

/// Computes the composite quality score.
pub struct QualityScorer;

impl QualityScorer {
    /// Score a run.
    ///
    /// - completeness = 1 - missing applicable cells / applicable cells
    /// - uniqueness = 1 - duplicates / unified records
    /// - validity = 1 - outlier records / records evaluated for outliers
    ///
    /// An empty denominator gives a sub-score of 1.
    pub fn score(
        inputs: &QualityInputs<'_>,
        weights: &QualityWeights,
        thresholds: &StatusThresholds,
    ) -> QualityReport {
        let mut missing_by_field: BTreeMap<String, usize> = BTreeMap::new();
        let mut applicable = 0usize;
        for record in inputs.records {
            applicable += record.applicable_fields().len();
            for field in record.missing_fields() {
                *missing_by_field.entry(field.to_string()).or_default() += 1;
            }
        }
        let missing: usize = missing_by_field.values().sum();

        let completeness = complement_ratio(missing, applicable);
        let uniqueness = complement_ratio(inputs.duplicate_count, inputs.total_unified);
        let validity = complement_ratio(inputs.outlier_count, inputs.outlier_scope);
        let score = 100.0
            * (weights.completeness * completeness
                + weights.uniqueness * uniqueness
                + weights.validity * validity);
        let score = (score * 100.0).round() / 100.0;
        let status = QualityStatus::from_score(score, thresholds);

        info!(
            "Quality score {:.2} ({}): completeness {:.3}, uniqueness {:.3}, validity {:.3}",
            score, status, completeness, uniqueness, validity
        );

        QualityReport {
            total_raw: inputs.total_raw,
            schema_rejections: inputs.schema_rejections,
            total_unified: inputs.total_unified,
            total_after_dedup: inputs.total_after_dedup,
            total_after_outliers: inputs.records.len(),
            duplicate_count: inputs.duplicate_count,
            outlier_count: inputs.outlier_count,
            capped_count: inputs.capped_count,
            removed_count: inputs.removed_count,
            missing_by_field,
            completeness,
            uniqueness,
            validity,
            score,
            status,
            weights: *weights,
            generated_at: Utc::now(),
        }
    }
}

fn complement_ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        1.0
    } else {
        1.0 - part as f64 / whole as f64
    }
}
