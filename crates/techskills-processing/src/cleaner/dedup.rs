//! Duplicate detection and removal.
//!
//! Two records are duplicates when they produce the same [`DedupKey`]. The
//! key rounds salary, age and period so that minor numeric noise between
//! re-published rows does not hide a duplicate.

use crate::config::DedupTolerance;
use crate::types::{
    CanonicalRecord, Country, DuplicateGroup, ExperienceLevel, RecordId, SourceType,
};
use chrono::Datelike;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Composite identity of a record under the configured tolerance.
///
/// `source_id` is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    source_type: SourceType,
    country: Country,
    city: Option<String>,
    technology: BTreeSet<String>,
    framework: BTreeSet<String>,
    experience: Option<ExperienceLevel>,
    salary_bucket: Option<i64>,
    age: Option<i64>,
    period_bucket: Option<i64>,
}

/// Survivors and the groups that were collapsed.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Surviving records in id order.
    pub survivors: Vec<CanonicalRecord>,
    /// Groups of size > 1, ordered by survivor id.
    pub groups: Vec<DuplicateGroup>,
}

impl DedupOutcome {
    /// Number of records removed as duplicates.
    pub fn duplicate_count(&self) -> usize {
        self.groups.iter().map(|g| g.removed.len()).sum()
    }
}

/// Handles duplicate detection.
pub struct Deduplicator;

impl Deduplicator {
    /// Compute the dedup key of one record.
    pub fn key(record: &CanonicalRecord, tolerance: &DedupTolerance) -> DedupKey {
        let period_bucket = record.period.map(|date| {
            let days = i64::from(date.num_days_from_ce());
            days.div_euclid(i64::from(tolerance.period_days.max(1)))
        });

        DedupKey {
            source_type: record.source_type,
            country: record.country,
            city: record.city.as_ref().map(|c| c.to_lowercase()),
            technology: record.technology.clone(),
            framework: record.framework.clone(),
            experience: record.experience_level,
            salary_bucket: record
                .salary
                .map(|s| (s / tolerance.salary_usd).round() as i64),
            age: record.age.map(|a| a.round() as i64),
            period_bucket,
        }
    }

    /// Remove duplicates, keeping one survivor per key.
    ///
    /// The survivor is the record with the fewest missing applicable fields;
    /// ties go to the lowest id.
    pub fn deduplicate(
        mut records: Vec<CanonicalRecord>,
        tolerance: &DedupTolerance,
    ) -> DedupOutcome {
        records.sort_by_key(|r| r.id);
        let total = records.len();

        let mut buckets: HashMap<DedupKey, Vec<usize>> = HashMap::new();
        let mut first_seen: Vec<DedupKey> = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            let key = Self::key(record, tolerance);
            let members = buckets.entry(key.clone()).or_default();
            if members.is_empty() {
                first_seen.push(key);
            }
            members.push(idx);
        }

        let mut keep = vec![false; records.len()];
        let mut groups = Vec::new();
        for key in &first_seen {
            let members = &buckets[key];
            let Some(&survivor) = members
                .iter()
                .min_by_key(|&&idx| (records[idx].missing_field_count(), records[idx].id))
            else {
                continue;
            };
            keep[survivor] = true;

            if members.len() > 1 {
                let removed = members
                    .iter()
                    .filter(|&&idx| idx != survivor)
                    .map(|&idx| records[idx].id)
                    .collect();
                groups.push(DuplicateGroup {
                    survivor: records[survivor].id,
                    removed,
                });
            }
        }
        groups.sort_by_key(|g| g.survivor);

        let survivors: Vec<CanonicalRecord> = records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, kept)| kept.then_some(record))
            .collect();

        let removed = total - survivors.len();
        if removed > 0 {
            debug!(
                "Collapsed {} duplicate groups ({} records removed)",
                groups.len(),
                removed
            );
        }
        info!(
            "Deduplication kept {} of {} records",
            survivors.len(),
            total
        );

        DedupOutcome { survivors, groups }
    }

    /// Fold the groups of a later pass into those of an earlier one.
    ///
    /// A record removed by the later pass takes the records it had absorbed
    /// with it, so every removed id ends up under its final survivor.
    pub fn merge_groups(
        earlier: Vec<DuplicateGroup>,
        later: &[DuplicateGroup],
    ) -> Vec<DuplicateGroup> {
        let mut by_survivor: BTreeMap<RecordId, Vec<RecordId>> = earlier
            .into_iter()
            .map(|group| (group.survivor, group.removed))
            .collect();

        for group in later {
            let mut removed = by_survivor.remove(&group.survivor).unwrap_or_default();
            for &id in &group.removed {
                removed.push(id);
                if let Some(absorbed) = by_survivor.remove(&id) {
                    removed.extend(absorbed);
                }
            }
            removed.sort_unstable();
            by_survivor.insert(group.survivor, removed);
        }

        by_survivor
            .into_iter()
            .map(|(survivor, removed)| DuplicateGroup { survivor, removed })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;
    use pretty_assertions::assert_eq;

    fn job(id: u64, salary: f64) -> CanonicalRecord {
        let mut record = CanonicalRecord::new(RecordId(id), SourceType::Job, Country::Argentina);
        record.technology.insert("Python".to_string());
        record.salary = Some(salary);
        record
    }

    // ==================== Key tests ====================

    #[test]
    fn test_salary_within_tolerance_shares_key() {
        let tolerance = DedupTolerance::default();
        let a = Deduplicator::key(&job(1, 30_010.0), &tolerance);
        let b = Deduplicator::key(&job(2, 29_990.0), &tolerance);
        let c = Deduplicator::key(&job(3, 30_400.0), &tolerance);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_source_id_is_not_part_of_key() {
        let tolerance = DedupTolerance::default();
        let mut a = job(1, 30_000.0);
        let mut b = job(2, 30_000.0);
        a.source_id = Some("A-1".to_string());
        b.source_id = Some("B-7".to_string());
        assert_eq!(Deduplicator::key(&a, &tolerance), Deduplicator::key(&b, &tolerance));
    }

    #[test]
    fn test_city_case_is_ignored() {
        let tolerance = DedupTolerance::default();
        let mut a = job(1, 30_000.0);
        let mut b = job(2, 30_000.0);
        a.city = Some("Rosario".to_string());
        b.city = Some("ROSARIO".to_string());
        assert_eq!(Deduplicator::key(&a, &tolerance), Deduplicator::key(&b, &tolerance));
    }

    // ==================== Survivor tests ====================

    #[test]
    fn test_most_complete_record_survives() {
        let sparse = job(1, 30_000.0);
        let mut complete = job(2, 30_000.0);
        complete.role = Some("Data Engineer".to_string());
        complete.organization = Some("Mercado Libre".to_string());

        let outcome =
            Deduplicator::deduplicate(vec![sparse, complete], &DedupTolerance::default());
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.survivors[0].id, RecordId(2));
        assert_eq!(
            outcome.groups,
            vec![DuplicateGroup {
                survivor: RecordId(2),
                removed: vec![RecordId(1)]
            }]
        );
    }

    #[test]
    fn test_lowest_id_breaks_ties() {
        let outcome = Deduplicator::deduplicate(
            vec![job(5, 30_000.0), job(3, 30_000.0), job(4, 30_000.0)],
            &DedupTolerance::default(),
        );
        assert_eq!(outcome.survivors[0].id, RecordId(3));
        assert_eq!(outcome.groups[0].removed, vec![RecordId(4), RecordId(5)]);
        assert_eq!(outcome.duplicate_count(), 2);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let records = vec![
            job(1, 30_000.0),
            job(2, 30_000.0),
            job(3, 45_000.0),
            job(4, 45_020.0),
            job(5, 80_000.0),
        ];
        let tolerance = DedupTolerance::default();
        let first = Deduplicator::deduplicate(records, &tolerance);
        let ids: Vec<RecordId> = first.survivors.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(3), RecordId(5)]);

        let second = Deduplicator::deduplicate(first.survivors.clone(), &tolerance);
        assert_eq!(second.survivors, first.survivors);
        assert!(second.groups.is_empty());
    }

    #[test]
    fn test_merge_groups_moves_absorbed_records() {
        let earlier = vec![
            DuplicateGroup {
                survivor: RecordId(2),
                removed: vec![RecordId(5)],
            },
            DuplicateGroup {
                survivor: RecordId(3),
                removed: vec![RecordId(4)],
            },
        ];
        let later = vec![DuplicateGroup {
            survivor: RecordId(1),
            removed: vec![RecordId(2)],
        }];

        assert_eq!(
            Deduplicator::merge_groups(earlier, &later),
            vec![
                DuplicateGroup {
                    survivor: RecordId(1),
                    removed: vec![RecordId(2), RecordId(5)],
                },
                DuplicateGroup {
                    survivor: RecordId(3),
                    removed: vec![RecordId(4)],
                },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let outcome = Deduplicator::deduplicate(Vec::new(), &DedupTolerance::default());
        assert!(outcome.survivors.is_empty());
        assert_eq!(outcome.duplicate_count(), 0);
    }
}
