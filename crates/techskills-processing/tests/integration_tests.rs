//! Integration tests for the warehouse processing pipeline.
//!
//! These tests run the full pipeline on the CSV fixtures and on generated
//! sources to check the end-to-end counting and cleaning guarantees.

use pretty_assertions::assert_eq;
use std::path::PathBuf;
use techskills_processing::cleaner::Deduplicator;
use techskills_processing::{
    Country, DuplicateGroup, OutlierAction, OutlierPolicy, Pipeline, PipelineConfig,
    PipelineResult, RawRecord, RawSources, RecordId, SchemaError, SourceType, ingest,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture_sources() -> RawSources {
    let dir = fixtures_path();
    ingest::load_sources(
        &dir.join("jobs.csv"),
        &dir.join("investments.csv"),
        &dir.join("profiles.csv"),
    )
    .expect("Failed to load fixtures")
}

fn run(sources: RawSources, config: PipelineConfig) -> PipelineResult {
    Pipeline::builder()
        .config(config)
        .build()
        .expect("valid config")
        .process(sources)
        .expect("pipeline should succeed")
}

/// Ten Peruvian job postings that differ only by publication day.
fn peru_jobs(salaries: &[f64]) -> Vec<RawRecord> {
    salaries
        .iter()
        .enumerate()
        .map(|(i, salary)| {
            RawRecord::new()
                .with("País", "Perú")
                .with("Lenguaje", "Python")
                .with("Salario_Anual_USD", *salary)
                .with("Fecha_Publicación", format!("2024-05-{:02}", i + 1))
        })
        .collect()
}

// ============================================================================
// Fixture Runs
// ============================================================================

#[test]
fn test_fixture_run_counts() {
    let result = run(load_fixture_sources(), PipelineConfig::default());
    let report = &result.quality_report;

    assert_eq!(report.total_raw, 21);
    assert_eq!(report.schema_rejections, 1);
    assert_eq!(report.total_unified, 20);
    assert_eq!(report.duplicate_count, 1);
    assert_eq!(report.total_after_dedup, 19);
    assert_eq!(report.outlier_count, 0);
    assert_eq!(result.warehouse.len(), 19);
    assert!(report.is_consistent());

    assert!(matches!(
        result.schema_rejections[0],
        SchemaError::UnknownCountry {
            source_type: SourceType::Profile,
            ..
        }
    ));
}

#[test]
fn test_fixture_records_are_canonical() {
    let result = run(load_fixture_sources(), PipelineConfig::default());
    let warehouse = &result.warehouse;

    // Ingestion order is preserved and ids are strictly increasing.
    let ids: Vec<u64> = warehouse.records().iter().map(|r| r.id.0).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(warehouse.records()[0].source_type, SourceType::Job);

    // A zero investment is stored as missing, not as a sentinel.
    let nsf = warehouse
        .by_source(SourceType::Investment)
        .find(|r| r.organization.as_deref() == Some("NSF"))
        .expect("NSF program present");
    assert_eq!(nsf.investment_usd, None);
    assert_eq!(nsf.country, Country::Usa);

    // Delimited skill lists are split and canonicalized.
    let profile = warehouse
        .by_source(SourceType::Profile)
        .find(|r| r.source_id.as_deref() == Some("4"))
        .expect("profile 4 present");
    assert_eq!(
        profile.technology.iter().cloned().collect::<Vec<_>>(),
        vec!["Go".to_string(), "Rust".to_string()]
    );
}

#[test]
fn test_fixture_summary() {
    let result = run(load_fixture_sources(), PipelineConfig::default());
    let summary = &result.summary;
    assert_eq!(summary.total_records, 19);
    assert_eq!(summary.records_by_source.get(&SourceType::Job), Some(&9));
    assert_eq!(summary.records_by_source.get(&SourceType::Investment), Some(&4));
    assert_eq!(summary.records_by_source.get(&SourceType::Profile), Some(&6));
    assert_eq!(summary.top_technologies[0], ("Python".to_string(), 4));
}

// ============================================================================
// Deduplication Scenarios
// ============================================================================

#[test]
fn test_ten_jobs_with_one_duplicate_pair() {
    let dir = fixtures_path();
    let jobs = ingest::load_records(&dir.join("jobs.csv")).unwrap();
    assert_eq!(jobs.len(), 10);

    let result = run(
        RawSources {
            jobs,
            ..Default::default()
        },
        PipelineConfig::default(),
    );

    assert_eq!(result.warehouse.len(), 9);
    assert_eq!(result.quality_report.duplicate_count, 1);
    assert_eq!(result.duplicate_groups.len(), 1);
    assert_eq!(result.duplicate_groups[0].size(), 2);
}

#[test]
fn test_dedup_is_idempotent_on_warehouse_output() {
    let result = run(load_fixture_sources(), PipelineConfig::default());
    let records = result.warehouse.records().to_vec();
    let again = Deduplicator::deduplicate(records.clone(), &PipelineConfig::default().dedup);
    assert!(again.groups.is_empty());
    assert_eq!(again.survivors, records);
}

#[test]
fn test_capped_salaries_do_not_leave_duplicates() {
    // Two postings on the same day that only differ by an extreme salary.
    let mut jobs = peru_jobs(&[30_000.0; 8]);
    for salary in [500_000.0, 600_000.0] {
        jobs.push(
            RawRecord::new()
                .with("País", "Perú")
                .with("Lenguaje", "Python")
                .with("Salario_Anual_USD", salary)
                .with("Fecha_Publicación", "2024-06-01"),
        );
    }
    let result = run(
        RawSources {
            jobs,
            ..Default::default()
        },
        PipelineConfig::default(),
    );
    let report = &result.quality_report;

    let records = result.warehouse.records().to_vec();
    let again = Deduplicator::deduplicate(records.clone(), &PipelineConfig::default().dedup);
    assert!(again.groups.is_empty());
    assert_eq!(again.survivors, records);

    assert_eq!(result.warehouse.len(), 9);
    assert_eq!(report.duplicate_count, 1);
    assert_eq!(report.total_after_dedup, 9);
    assert_eq!(report.capped_count, 2);
    assert!(report.is_consistent());
    assert_eq!(
        result.duplicate_groups,
        vec![DuplicateGroup {
            survivor: RecordId(9),
            removed: vec![RecordId(10)],
        }]
    );
}

#[test]
fn test_count_invariant_with_many_duplicates() {
    let mut jobs = Vec::new();
    for copy in 0..4 {
        for salary in [20_000.0, 21_000.0, 22_000.0] {
            // Salary noise below the 100 USD tolerance still collapses.
            jobs.push(
                RawRecord::new()
                    .with("País", "Argentina")
                    .with("Lenguaje", "Go")
                    .with("Salario_Anual_USD", salary + copy as f64 * 10.0),
            );
        }
    }
    let result = run(
        RawSources {
            jobs,
            ..Default::default()
        },
        PipelineConfig::default(),
    );
    let report = &result.quality_report;
    assert_eq!(report.total_unified, 12);
    assert_eq!(report.total_after_dedup, 3);
    assert_eq!(report.duplicate_count, 9);
    assert_eq!(
        report.duplicate_count + report.total_after_dedup,
        report.total_unified
    );
}

// ============================================================================
// Outlier Scenarios
// ============================================================================

fn skewed_salaries() -> Vec<f64> {
    let mut salaries = vec![30_000.0; 9];
    salaries.push(500_000.0);
    salaries
}

#[test]
fn test_salary_outlier_is_capped() {
    let result = run(
        RawSources {
            jobs: peru_jobs(&skewed_salaries()),
            ..Default::default()
        },
        PipelineConfig::default(),
    );

    assert_eq!(result.outlier_flags.len(), 1);
    let flag = &result.outlier_flags[0];
    assert_eq!(flag.action, OutlierAction::Capped);
    assert_eq!(flag.original_value, 500_000.0);
    assert_eq!(flag.group, "job/Peru");

    let salaries: Vec<f64> = result
        .warehouse
        .records()
        .iter()
        .filter_map(|r| r.salary)
        .collect();
    assert_eq!(salaries.len(), 10);
    assert!(salaries.iter().all(|s| *s <= flag.upper_bound));
    assert_eq!(salaries.iter().filter(|s| **s == 30_000.0).count(), 10);
}

#[test]
fn test_salary_outlier_is_dropped_when_configured() {
    let config = PipelineConfig::builder()
        .salary_policy(OutlierPolicy::Drop)
        .build()
        .unwrap();
    let result = run(
        RawSources {
            jobs: peru_jobs(&skewed_salaries()),
            ..Default::default()
        },
        config,
    );

    assert_eq!(result.warehouse.len(), 9);
    assert!(
        result
            .warehouse
            .records()
            .iter()
            .all(|r| r.salary == Some(30_000.0))
    );
    let removed = result.outlier_flags[0].record_id;
    assert!(result.warehouse.get(removed).is_none());
    assert_eq!(result.quality_report.removed_count, 1);
}

#[test]
fn test_countries_are_not_compared_to_each_other() {
    let mut jobs = peru_jobs(&[14_000.0, 15_000.0, 16_000.0, 15_500.0, 14_500.0]);
    for (i, salary) in [150_000.0, 160_000.0, 155_000.0, 148_000.0, 152_000.0]
        .into_iter()
        .enumerate()
    {
        jobs.push(
            RawRecord::new()
                .with("País", "USA")
                .with("Lenguaje", "Python")
                .with("Salario_Anual_USD", salary)
                .with("Fecha_Publicación", format!("2024-06-{:02}", i + 1)),
        );
    }
    let result = run(
        RawSources {
            jobs,
            ..Default::default()
        },
        PipelineConfig::default(),
    );
    assert!(result.outlier_flags.is_empty());
    assert_eq!(result.warehouse.len(), 10);
}
