//! Outlier handling module.
//!
//! Bounds are computed per field and stratification group from the
//! deduplicated set, all before any value is touched, then every rule is
//! applied with its configured policy.

use crate::config::{OutlierPolicy, OutlierRule, PipelineConfig, Stratification};
use crate::types::{
    CanonicalRecord, DetectionMethod, NumericField, OutlierAction, OutlierFlag, RecordId,
};
use crate::utils::{quantile_sorted, sorted_finite};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// IQR bounds of one field within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBounds {
    pub field: NumericField,
    pub group: String,
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
    /// Number of present values the bounds were computed from.
    pub sample_size: usize,
}

impl FieldBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Resolved records and what happened to them.
#[derive(Debug, Clone, Default)]
pub struct OutlierOutcome {
    /// Records after capping, without removed ones, in input order.
    pub records: Vec<CanonicalRecord>,
    pub flags: Vec<OutlierFlag>,
    pub bounds: Vec<FieldBounds>,
}

impl OutlierOutcome {
    /// Number of distinct records with at least one flag.
    pub fn flagged_records(&self) -> usize {
        self.flags
            .iter()
            .map(|f| f.record_id)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn capped_count(&self) -> usize {
        self.count_action(OutlierAction::Capped)
    }

    pub fn removed_count(&self) -> usize {
        self.count_action(OutlierAction::Removed)
    }

    fn count_action(&self, action: OutlierAction) -> usize {
        self.flags.iter().filter(|f| f.action == action).count()
    }
}

/// Handles outlier detection and treatment.
pub struct OutlierEngine;

impl OutlierEngine {
    /// Label of the stratification group a record belongs to.
    pub fn group_label(record: &CanonicalRecord, stratify: Stratification) -> String {
        match stratify {
            Stratification::Global => "all".to_string(),
            Stratification::SourceType => record.source_type.to_string(),
            Stratification::SourceTypeAndCountry => {
                format!("{}/{}", record.source_type, record.country)
            }
        }
    }

    /// Compute IQR bounds for every (field, group) with enough values.
    pub fn compute_bounds(records: &[CanonicalRecord], config: &PipelineConfig) -> Vec<FieldBounds> {
        let mut bounds = Vec::new();
        for rule in &config.outlier_rules {
            let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for record in records {
                if let Some(value) = rule.field.get(record) {
                    groups
                        .entry(Self::group_label(record, rule.stratify))
                        .or_default()
                        .push(value);
                }
            }

            for (group, values) in groups {
                let sorted = sorted_finite(values);
                if sorted.len() < config.min_group_size {
                    debug!(
                        "Skipping {} outliers for group {} ({} values)",
                        rule.field,
                        group,
                        sorted.len()
                    );
                    continue;
                }
                let (Some(q1), Some(q3)) =
                    (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75))
                else {
                    continue;
                };
                let iqr = q3 - q1;
                bounds.push(FieldBounds {
                    field: rule.field,
                    group,
                    q1,
                    q3,
                    lower: q1 - config.iqr_multiplier * iqr,
                    upper: q3 + config.iqr_multiplier * iqr,
                    sample_size: sorted.len(),
                });
            }
        }
        bounds
    }

    /// Detect and resolve outliers according to the configured rules.
    pub fn handle_outliers(records: Vec<CanonicalRecord>, config: &PipelineConfig) -> OutlierOutcome {
        let bounds = Self::compute_bounds(&records, config);
        let lookup: HashMap<(NumericField, String), &FieldBounds> = bounds
            .iter()
            .map(|b| ((b.field, b.group.clone()), b))
            .collect();
        let method = DetectionMethod::Iqr {
            multiplier: config.iqr_multiplier,
        };

        let mut flags = Vec::new();
        let mut removed: BTreeSet<RecordId> = BTreeSet::new();
        let mut caps: Vec<(usize, NumericField, f64)> = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            for rule in &config.outlier_rules {
                let Some(value) = rule.field.get(record) else {
                    continue;
                };
                let group = Self::group_label(record, rule.stratify);
                let Some(field_bounds) = lookup.get(&(rule.field, group)) else {
                    continue;
                };
                if field_bounds.contains(value) {
                    continue;
                }

                let flag = Self::resolve(record, rule, field_bounds, value, method);
                match flag.resolved_value {
                    Some(capped) => caps.push((idx, rule.field, capped)),
                    None => {
                        removed.insert(record.id);
                    }
                }
                flags.push(flag);
            }
        }

        let mut records = records;
        for (idx, field, capped) in caps {
            field.set(&mut records[idx], capped);
        }
        let before = records.len();
        records.retain(|r| !removed.contains(&r.id));

        let outcome = OutlierOutcome {
            records,
            flags,
            bounds,
        };
        info!(
            "Outlier handling: {} flags ({} capped, {} removed), {} of {} records kept",
            outcome.flags.len(),
            outcome.capped_count(),
            outcome.removed_count(),
            outcome.records.len(),
            before
        );
        outcome
    }

    fn resolve(
        record: &CanonicalRecord,
        rule: &OutlierRule,
        bounds: &FieldBounds,
        value: f64,
        method: DetectionMethod,
    ) -> OutlierFlag {
        let (action, resolved_value) = match rule.policy {
            OutlierPolicy::Cap => (
                OutlierAction::Capped,
                Some(value.clamp(bounds.lower, bounds.upper)),
            ),
            OutlierPolicy::Drop => (OutlierAction::Removed, None),
        };
        debug!(
            "Record {}: {} {} outside [{:.2}, {:.2}] in {} -> {:?}",
            record.id, rule.field, value, bounds.lower, bounds.upper, bounds.group, action
        );
        OutlierFlag {
            record_id: record.id,
            field: rule.field,
            group: bounds.group.clone(),
            method,
            lower_bound: bounds.lower,
            upper_bound: bounds.upper,
            original_value: value,
            action,
            resolved_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Country, SourceType};
    use pretty_assertions::assert_eq;

    fn job(id: u64, country: Country, salary: f64) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(RecordId(id), SourceType::Job, country);
        record.technology.insert("Java".to_string());
        record.salary = Some(salary);
        record
    }

    fn salary_records() -> Vec<CanonicalRecord> {
        let mut records: Vec<CanonicalRecord> =
            (1..=9).map(|id| job(id, Country::Peru, 30_000.0)).collect();
        records.push(job(10, Country::Peru, 500_000.0));
        records
    }

    // ==================== Bounds tests ====================

    #[test]
    fn test_bounds_are_stratified_by_country() {
        let mut records: Vec<CanonicalRecord> = (1..=5)
            .map(|id| job(id, Country::Usa, 120_000.0 + id as f64 * 1_000.0))
            .collect();
        records.extend((6..=10).map(|id| job(id, Country::Colombia, 12_000.0 + id as f64 * 100.0)));

        let bounds = OutlierEngine::compute_bounds(&records, &PipelineConfig::default());
        let groups: Vec<&str> = bounds.iter().map(|b| b.group.as_str()).collect();
        assert_eq!(groups, vec!["job/Colombia", "job/USA"]);

        // No Colombian salary is an outlier just for being far below USA ones.
        let outcome = OutlierEngine::handle_outliers(records, &PipelineConfig::default());
        assert!(outcome.flags.is_empty());
    }

    #[test]
    fn test_small_groups_are_skipped() {
        let records = vec![job(1, Country::Chile, 10_000.0), job(2, Country::Chile, 900_000.0)];
        let outcome = OutlierEngine::handle_outliers(records, &PipelineConfig::default());
        assert!(outcome.bounds.is_empty());
        assert!(outcome.flags.is_empty());
        assert_eq!(outcome.records.len(), 2);
    }

    // ==================== Resolution tests ====================

    #[test]
    fn test_cap_policy_clamps_to_upper_bound() {
        let outcome = OutlierEngine::handle_outliers(salary_records(), &PipelineConfig::default());

        assert_eq!(outcome.flags.len(), 1);
        let flag = &outcome.flags[0];
        assert_eq!(flag.record_id, RecordId(10));
        assert_eq!(flag.action, OutlierAction::Capped);
        assert_eq!(flag.original_value, 500_000.0);
        assert_eq!(flag.resolved_value, Some(flag.upper_bound));

        assert_eq!(outcome.records.len(), 10);
        assert_eq!(outcome.records[9].salary, Some(flag.upper_bound));
        assert!(outcome.records[..9].iter().all(|r| r.salary == Some(30_000.0)));
    }

    #[test]
    fn test_drop_policy_removes_record() {
        let config = PipelineConfig::builder()
            .salary_policy(OutlierPolicy::Drop)
            .build()
            .unwrap();
        let outcome = OutlierEngine::handle_outliers(salary_records(), &config);

        assert_eq!(outcome.removed_count(), 1);
        assert_eq!(outcome.records.len(), 9);
        assert!(outcome.records.iter().all(|r| r.id != RecordId(10)));
        assert_eq!(outcome.flags[0].resolved_value, None);
    }

    #[test]
    fn test_no_capped_value_outside_bounds() {
        let mut records: Vec<CanonicalRecord> = (1..=20)
            .map(|id| job(id, Country::Spain, 40_000.0 + (id % 7) as f64 * 2_500.0))
            .collect();
        records.push(job(21, Country::Spain, 1_000.0));
        records.push(job(22, Country::Spain, 400_000.0));

        let outcome = OutlierEngine::handle_outliers(records, &PipelineConfig::default());
        let bounds = &outcome.bounds[0];
        assert_eq!(outcome.capped_count(), 2);
        assert!(
            outcome
                .records
                .iter()
                .filter_map(|r| r.salary)
                .all(|s| bounds.contains(s))
        );
    }

    #[test]
    fn test_age_outliers_are_dropped_per_source() {
        let mut records: Vec<CanonicalRecord> = (1..=8)
            .map(|id| {
                let mut r = CanonicalRecord::new(RecordId(id), SourceType::Profile, Country::Mexico);
                r.age = Some(28.0 + id as f64);
                r
            })
            .collect();
        let mut old = CanonicalRecord::new(RecordId(9), SourceType::Profile, Country::Usa);
        old.age = Some(140.0);
        records.push(old);

        let outcome = OutlierEngine::handle_outliers(records, &PipelineConfig::default());
        assert_eq!(outcome.flags.len(), 1);
        assert_eq!(outcome.flags[0].field, NumericField::Age);
        assert_eq!(outcome.flags[0].group, "profile");
        assert_eq!(outcome.records.len(), 8);
        assert_eq!(outcome.flagged_records(), 1);
    }
}
