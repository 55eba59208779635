//! Configuration types for the warehouse pipeline.
//!
//! Every threshold the cleaning stages use lives here and is passed in
//! explicitly, so a run is reproducible from its configuration alone.

use crate::types::NumericField;
use serde::{Deserialize, Serialize};

/// How flagged outliers of one field are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutlierPolicy {
    /// Clamp the value to the nearest IQR bound.
    #[default]
    Cap,
    /// Remove the whole record from the warehouse.
    Drop,
}

/// Grouping used when computing IQR bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stratification {
    /// One group over all records.
    Global,
    /// One group per source.
    SourceType,
    /// One group per (source, country) pair.
    #[default]
    SourceTypeAndCountry,
}

/// Outlier handling for a single numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierRule {
    pub field: NumericField,
    pub policy: OutlierPolicy,
    pub stratify: Stratification,
}

impl OutlierRule {
    /// Salary: capped, one group per (source, country).
    pub fn salary_default() -> Self {
        Self {
            field: NumericField::Salary,
            policy: OutlierPolicy::Cap,
            stratify: Stratification::SourceTypeAndCountry,
        }
    }

    /// Age: dropped, one group per source.
    pub fn age_default() -> Self {
        Self {
            field: NumericField::Age,
            policy: OutlierPolicy::Drop,
            stratify: Stratification::SourceType,
        }
    }
}

/// Numeric slack of the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupTolerance {
    /// Salaries are compared after rounding to this many USD.
    /// Default: 100.0
    pub salary_usd: f64,

    /// Periods are compared in buckets of this many days.
    /// Default: 1 (same date)
    pub period_days: u32,
}

impl Default for DedupTolerance {
    fn default() -> Self {
        Self {
            salary_usd: 100.0,
            period_days: 1,
        }
    }
}

/// Weights of the composite quality score. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub completeness: f64,
    pub uniqueness: f64,
    pub validity: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.4,
            uniqueness: 0.3,
            validity: 0.3,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.completeness + self.uniqueness + self.validity
    }
}

/// Score cut-offs for the quality status label (strictly greater than).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            excellent: 90.0,
            good: 80.0,
            fair: 70.0,
        }
    }
}

/// Configuration for the processing pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use techskills_processing::config::{OutlierPolicy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .salary_policy(OutlierPolicy::Drop)
///     .iqr_multiplier(3.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tolerances of the dedup key.
    pub dedup: DedupTolerance,

    /// One rule per numeric field under outlier handling.
    /// Default: salary capped per (source, country), age dropped per source.
    pub outlier_rules: Vec<OutlierRule>,

    /// IQR multiplier `k` of the bounds `[Q1 - k*IQR, Q3 + k*IQR]`.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Groups with fewer present values than this are not evaluated.
    /// Default: 4
    pub min_group_size: usize,

    /// Weights of the composite quality score.
    /// Default: 0.4 / 0.3 / 0.3
    pub quality_weights: QualityWeights,

    /// Cut-offs for the quality status label.
    /// Default: 90 / 80 / 70
    pub status_thresholds: StatusThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup: DedupTolerance::default(),
            outlier_rules: vec![OutlierRule::salary_default(), OutlierRule::age_default()],
            iqr_multiplier: 1.5,
            min_group_size: 4,
            quality_weights: QualityWeights::default(),
            status_thresholds: StatusThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// The rule configured for a field, if any.
    pub fn rule_for(&self, field: NumericField) -> Option<&OutlierRule> {
        self.outlier_rules.iter().find(|rule| rule.field == field)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.dedup.salary_usd.is_finite() || self.dedup.salary_usd <= 0.0 {
            return Err(ConfigValidationError::NonPositive {
                field: "dedup.salary_usd".to_string(),
                value: self.dedup.salary_usd,
            });
        }

        if self.dedup.period_days == 0 {
            return Err(ConfigValidationError::NonPositive {
                field: "dedup.period_days".to_string(),
                value: 0.0,
            });
        }

        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier <= 0.0 {
            return Err(ConfigValidationError::NonPositive {
                field: "iqr_multiplier".to_string(),
                value: self.iqr_multiplier,
            });
        }

        if self.min_group_size < 2 {
            return Err(ConfigValidationError::MinGroupSize(self.min_group_size));
        }

        for (i, rule) in self.outlier_rules.iter().enumerate() {
            if self.outlier_rules[..i].iter().any(|r| r.field == rule.field) {
                return Err(ConfigValidationError::DuplicateRule(rule.field.name()));
            }
        }

        let weights = &self.quality_weights;
        for (field, value) in [
            ("quality_weights.completeness", weights.completeness),
            ("quality_weights.uniqueness", weights.uniqueness),
            ("quality_weights.validity", weights.validity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if (weights.sum() - 1.0).abs() > 1e-9 {
            return Err(ConfigValidationError::WeightsSum(weights.sum()));
        }

        let status = &self.status_thresholds;
        if !(status.excellent >= status.good && status.good >= status.fair)
            || !(0.0..=100.0).contains(&status.excellent)
            || !(0.0..=100.0).contains(&status.fair)
        {
            return Err(ConfigValidationError::StatusThresholds {
                excellent: status.excellent,
                good: status.good,
                fair: status.fair,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid value for '{field}': {value} (must be positive)")]
    NonPositive { field: String, value: f64 },

    #[error("Invalid minimum group size: {0} (must be at least 2)")]
    MinGroupSize(usize),

    #[error("More than one outlier rule for field '{0}'")]
    DuplicateRule(&'static str),

    #[error("Quality weights sum to {0} (must sum to 1.0)")]
    WeightsSum(f64),

    #[error(
        "Invalid status thresholds {excellent}/{good}/{fair} (must be descending within 0..=100)"
    )]
    StatusThresholds { excellent: f64, good: f64, fair: f64 },
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    salary_tolerance: Option<f64>,
    period_tolerance_days: Option<u32>,
    salary_policy: Option<OutlierPolicy>,
    age_policy: Option<OutlierPolicy>,
    outlier_rules: Option<Vec<OutlierRule>>,
    iqr_multiplier: Option<f64>,
    min_group_size: Option<usize>,
    quality_weights: Option<QualityWeights>,
    status_thresholds: Option<StatusThresholds>,
}

impl PipelineConfigBuilder {
    /// Set the salary rounding step of the dedup key, in USD.
    pub fn salary_tolerance(mut self, usd: f64) -> Self {
        self.salary_tolerance = Some(usd);
        self
    }

    /// Set the period bucket width of the dedup key, in days.
    pub fn period_tolerance_days(mut self, days: u32) -> Self {
        self.period_tolerance_days = Some(days);
        self
    }

    /// Set how salary outliers are resolved.
    pub fn salary_policy(mut self, policy: OutlierPolicy) -> Self {
        self.salary_policy = Some(policy);
        self
    }

    /// Set how age outliers are resolved.
    pub fn age_policy(mut self, policy: OutlierPolicy) -> Self {
        self.age_policy = Some(policy);
        self
    }

    /// Replace the outlier rules entirely.
    ///
    /// `salary_policy` and `age_policy` still apply on top of these.
    pub fn outlier_rules(mut self, rules: Vec<OutlierRule>) -> Self {
        self.outlier_rules = Some(rules);
        self
    }

    /// Set the IQR multiplier.
    pub fn iqr_multiplier(mut self, k: f64) -> Self {
        self.iqr_multiplier = Some(k);
        self
    }

    /// Set the minimum group size evaluated for outliers.
    pub fn min_group_size(mut self, size: usize) -> Self {
        self.min_group_size = Some(size);
        self
    }

    pub fn quality_weights(mut self, weights: QualityWeights) -> Self {
        self.quality_weights = Some(weights);
        self
    }

    pub fn status_thresholds(mut self, thresholds: StatusThresholds) -> Self {
        self.status_thresholds = Some(thresholds);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let mut outlier_rules = self.outlier_rules.unwrap_or(defaults.outlier_rules);
        for (field, policy) in [
            (NumericField::Salary, self.salary_policy),
            (NumericField::Age, self.age_policy),
        ] {
            let Some(policy) = policy else { continue };
            match outlier_rules.iter_mut().find(|rule| rule.field == field) {
                Some(rule) => rule.policy = policy,
                None => {
                    let mut rule = match field {
                        NumericField::Salary => OutlierRule::salary_default(),
                        NumericField::Age => OutlierRule::age_default(),
                    };
                    rule.policy = policy;
                    outlier_rules.push(rule);
                }
            }
        }

        let config = PipelineConfig {
            dedup: DedupTolerance {
                salary_usd: self.salary_tolerance.unwrap_or(defaults.dedup.salary_usd),
                period_days: self
                    .period_tolerance_days
                    .unwrap_or(defaults.dedup.period_days),
            },
            outlier_rules,
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            min_group_size: self.min_group_size.unwrap_or(defaults.min_group_size),
            quality_weights: self.quality_weights.unwrap_or_default(),
            status_thresholds: self.status_thresholds.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.dedup.salary_usd, 100.0);
        assert_eq!(config.dedup.period_days, 1);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.min_group_size, 4);
        assert_eq!(
            config.rule_for(NumericField::Salary).map(|r| r.policy),
            Some(OutlierPolicy::Cap)
        );
        assert_eq!(
            config.rule_for(NumericField::Age).map(|r| r.policy),
            Some(OutlierPolicy::Drop)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .salary_tolerance(500.0)
            .salary_policy(OutlierPolicy::Drop)
            .age_policy(OutlierPolicy::Cap)
            .iqr_multiplier(3.0)
            .build()
            .unwrap();

        assert_eq!(config.dedup.salary_usd, 500.0);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(
            config.rule_for(NumericField::Salary).unwrap().policy,
            OutlierPolicy::Drop
        );
        assert_eq!(
            config.rule_for(NumericField::Age).unwrap().policy,
            OutlierPolicy::Cap
        );
    }

    #[test]
    fn test_policy_override_adds_missing_rule() {
        let config = PipelineConfig::builder()
            .outlier_rules(Vec::new())
            .salary_policy(OutlierPolicy::Drop)
            .build()
            .unwrap();
        assert_eq!(config.outlier_rules.len(), 1);
        assert_eq!(
            config.outlier_rules[0].stratify,
            Stratification::SourceTypeAndCountry
        );
    }

    #[test]
    fn test_validation_weights_must_sum_to_one() {
        let result = PipelineConfig::builder()
            .quality_weights(QualityWeights {
                completeness: 0.5,
                uniqueness: 0.5,
                validity: 0.5,
            })
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::WeightsSum(_)
        ));
    }

    #[test]
    fn test_validation_rejects_bad_tolerances() {
        assert!(matches!(
            PipelineConfig::builder().salary_tolerance(0.0).build(),
            Err(ConfigValidationError::NonPositive { .. })
        ));
        assert!(matches!(
            PipelineConfig::builder().period_tolerance_days(0).build(),
            Err(ConfigValidationError::NonPositive { .. })
        ));
        assert!(matches!(
            PipelineConfig::builder().min_group_size(1).build(),
            Err(ConfigValidationError::MinGroupSize(1))
        ));
    }

    #[test]
    fn test_validation_rejects_duplicate_rules() {
        let result = PipelineConfig::builder()
            .outlier_rules(vec![OutlierRule::salary_default(), OutlierRule::salary_default()])
            .build();
        assert!(matches!(
            result,
            Err(ConfigValidationError::DuplicateRule("salary"))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);

        // Partial documents fall back to defaults.
        let partial: PipelineConfig = serde_json::from_str(r#"{"iqr_multiplier": 2.0}"#).unwrap();
        assert_eq!(partial.iqr_multiplier, 2.0);
        assert_eq!(partial.min_group_size, 4);
    }
}
