//! CLI entry point: builds the TechWarehouse from the three raw sources and
//! mines it.

mod report;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use report::{OutputPaths, QualityDocument, RunReport};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use techskills_mining::{ClusterSelection, MiningConfig, MiningOrchestrator, MiningSummary};
use techskills_processing::{OutlierPolicy, Pipeline, PipelineConfig, PipelineResult, ingest};
use tracing::{error, info};

/// CLI-compatible outlier policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierPolicy {
    /// Clamp outliers to the IQR bounds
    Cap,
    /// Remove records holding an outlier
    Drop,
}

impl From<CliOutlierPolicy> for OutlierPolicy {
    fn from(cli: CliOutlierPolicy) -> Self {
        match cli {
            CliOutlierPolicy::Cap => OutlierPolicy::Cap,
            CliOutlierPolicy::Drop => OutlierPolicy::Drop,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Tech labor market warehouse: ETL, quality scoring and mining",
    long_about = "Unifies job postings, investment records and professional profiles into \
                  one warehouse, scores its quality, then segments profiles and classifies \
                  high-demand jobs.\n\n\
                  EXAMPLES:\n  \
                  # Default run\n  \
                  techskills --jobs jobs.csv --investments inv.csv --profiles profiles.csv\n\n  \
                  # Drop salary outliers and force four profile clusters\n  \
                  techskills --jobs jobs.csv --investments inv.csv --profiles profiles.csv \
                  --salary-policy drop --clusters 4\n\n  \
                  # Machine-readable output\n  \
                  techskills --jobs jobs.csv --investments inv.csv --profiles profiles.csv --json"
)]
struct Args {
    /// CSV of job postings
    #[arg(long)]
    jobs: PathBuf,

    /// CSV of investment records
    #[arg(long)]
    investments: PathBuf,

    /// CSV of professional profiles
    #[arg(long)]
    profiles: PathBuf,

    /// Output directory for the warehouse and reports
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// JSON file with the processing configuration
    ///
    /// Missing keys fall back to their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with the mining configuration
    ///
    /// Missing keys fall back to their defaults
    #[arg(long)]
    mining_config: Option<PathBuf>,

    /// Fixed number of profile clusters
    ///
    /// Overrides the cluster selection of the mining configuration
    #[arg(long)]
    clusters: Option<usize>,

    /// Random seed shared by clustering and classification
    #[arg(long)]
    seed: Option<u64>,

    /// How salary outliers are resolved
    #[arg(long, value_enum)]
    salary_policy: Option<CliOutlierPolicy>,

    /// How age outliers are resolved
    #[arg(long, value_enum)]
    age_policy: Option<CliOutlierPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final summary)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only outputs the combined quality report and
    /// mining summary. Useful for piping: `... --json | jq .mining_summary`
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let pipeline_config = resolve_pipeline_config(&args)?;
    let mining_config = resolve_mining_config(&args)?;

    for path in [&args.jobs, &args.investments, &args.profiles] {
        if !path.exists() {
            return Err(anyhow!("Input file not found: {}", path.display()));
        }
    }

    info!("{}", "=".repeat(80));
    info!("Starting TechWarehouse run...");
    info!("{}", "=".repeat(80));

    let sources = ingest::load_sources(&args.jobs, &args.investments, &args.profiles)?;
    info!("Loaded {} raw records", sources.total());

    let pipeline = build_pipeline(&args, pipeline_config)?;
    let mut result = pipeline.process(sources).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    let orchestrator = MiningOrchestrator::new(mining_config)?;
    let mining = orchestrator
        .run(&mut result.warehouse)
        .context("Attaching mining results to the warehouse")?;

    let paths = report::write_outputs(&args.output, &result, &mining)?;

    if args.json {
        let combined = RunReport {
            outputs: &paths,
            quality_report: QualityDocument::from_result(&result),
            mining_summary: &mining,
        };
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    print_human_readable_summary(&result, &mining, &paths);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Reading configuration {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Parsing configuration {}", path.display()))
}

/// Processing configuration from `--config`, with the policy flags on top.
fn resolve_pipeline_config(args: &Args) -> Result<PipelineConfig> {
    let base: PipelineConfig = match &args.config {
        Some(path) => read_json(path)?,
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineConfig::builder()
        .salary_tolerance(base.dedup.salary_usd)
        .period_tolerance_days(base.dedup.period_days)
        .outlier_rules(base.outlier_rules)
        .iqr_multiplier(base.iqr_multiplier)
        .min_group_size(base.min_group_size)
        .quality_weights(base.quality_weights)
        .status_thresholds(base.status_thresholds);

    if let Some(policy) = args.salary_policy {
        builder = builder.salary_policy(policy.into());
    }
    if let Some(policy) = args.age_policy {
        builder = builder.age_policy(policy.into());
    }

    Ok(builder.build()?)
}

/// Mining configuration from `--mining-config`, with `--clusters` and
/// `--seed` on top.
fn resolve_mining_config(args: &Args) -> Result<MiningConfig> {
    let mut config: MiningConfig = match &args.mining_config {
        Some(path) => read_json(path)?,
        None => MiningConfig::default(),
    };

    if let Some(k) = args.clusters {
        config.cluster_selection = ClusterSelection::Fixed { k };
    }
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }

    config.validate()?;
    Ok(config)
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !args.quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(
    result: &PipelineResult,
    mining: &MiningSummary,
    paths: &OutputPaths,
) {
    let quality = &result.quality_report;
    let summary = &result.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("TECHWAREHOUSE RUN COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", result.duration_ms);
    println!(
        "  Records: {} raw -> {} unified -> {} deduplicated -> {} in warehouse",
        quality.total_raw,
        quality.total_unified,
        quality.total_after_dedup,
        quality.total_after_outliers
    );
    println!(
        "  Removed: {} rejected, {} duplicates, {} outliers dropped ({} capped)",
        quality.schema_rejections,
        quality.duplicate_count,
        quality.removed_count,
        quality.capped_count
    );
    for (source, count) in &summary.records_by_source {
        println!("  {}: {} records", source, count);
    }
    println!();

    println!("Data Quality: {:.1} ({})", quality.score, quality.status);
    println!(
        "  {}",
        quality_breakdown(quality.completeness, quality.uniqueness, quality.validity)
    );
    println!();

    if let Some(median) = summary.median_salary {
        println!(
            "Salary: median {:.0} USD over {} records",
            median, summary.records_with_salary
        );
    }
    if !summary.top_technologies.is_empty() {
        let top: Vec<String> = summary
            .top_technologies
            .iter()
            .take(5)
            .map(|(tech, count)| format!("{} ({})", tech, count))
            .collect();
        println!("Top technologies: {}", top.join(", "));
    }
    println!();

    println!(
        "Mining: {}/{} techniques succeeded ({:.1}%)",
        mining.techniques_succeeded, mining.techniques_attempted, mining.success_rate
    );
    match mining.clustering.payload() {
        Some(clustering) => {
            println!(
                "  Clustering: k={} over {} records, inertia {:.2}",
                clustering.k,
                clustering.assignments.len(),
                clustering.inertia
            );
            for profile in &clustering.profiles {
                println!(
                    "    cluster {}: {} records ({:.1}%), mean salary {}",
                    profile.cluster,
                    profile.size,
                    profile.share_pct,
                    profile
                        .mean_salary
                        .map_or_else(|| "n/a".to_string(), |s| format!("{:.0}", s))
                );
            }
        }
        None => println!(
            "  Clustering: failed ({})",
            mining.clustering.failure_reason().unwrap_or("unknown")
        ),
    }
    match mining.classification.payload() {
        Some(classification) => {
            println!(
                "  Classification: {} accuracy {:.4} (baseline {:.4}, {:?} quality) on {} test records",
                classification.best_model,
                classification.accuracy,
                classification.baseline_accuracy,
                classification.quality,
                classification.test_size
            );
            if let Some(top) = classification.feature_importances.first() {
                println!("    top feature: {} ({:.3})", top.feature, top.importance);
            }
        }
        None => println!(
            "  Classification: failed ({})",
            mining.classification.failure_reason().unwrap_or("unknown")
        ),
    }
    println!();

    if !result.schema_rejections.is_empty() {
        println!("Warnings:");
        for rejection in result.schema_rejections.iter().take(5) {
            println!("  ! {}", rejection);
        }
        if result.schema_rejections.len() > 5 {
            println!("  ... and {} more rejections", result.schema_rejections.len() - 5);
        }
        println!();
    }

    println!("Output:");
    println!("  - {}", paths.warehouse_csv.display());
    println!("  - {}", paths.quality_report.display());
    println!("  - {}", paths.mining_summary.display());
    println!();
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}

/// Sub-scores are ratios in 0..=1; shown as percentages.
fn quality_breakdown(completeness: f64, uniqueness: f64, validity: f64) -> String {
    format!(
        "Completeness: {:.1}%  Uniqueness: {:.1}%  Validity: {:.1}%",
        completeness * 100.0,
        uniqueness * 100.0,
        validity * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "techskills",
            "--jobs",
            "jobs.csv",
            "--investments",
            "inv.csv",
            "--profiles",
            "profiles.csv",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_quality_breakdown_in_percent() {
        assert_eq!(
            quality_breakdown(0.875, 1.0, 0.9),
            "Completeness: 87.5%  Uniqueness: 100.0%  Validity: 90.0%"
        );
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        assert_eq!(args.output, PathBuf::from("./outputs"));
        assert_eq!(resolve_pipeline_config(&args).unwrap(), PipelineConfig::default());
        assert_eq!(resolve_mining_config(&args).unwrap(), MiningConfig::default());
    }

    #[test]
    fn test_policy_flags_override_rules() {
        let args = args(&["--salary-policy", "drop", "--age-policy", "cap"]);
        let config = resolve_pipeline_config(&args).unwrap();
        assert_eq!(
            config
                .rule_for(techskills_processing::NumericField::Salary)
                .map(|r| r.policy),
            Some(OutlierPolicy::Drop)
        );
        assert_eq!(
            config
                .rule_for(techskills_processing::NumericField::Age)
                .map(|r| r.policy),
            Some(OutlierPolicy::Cap)
        );
    }

    #[test]
    fn test_mining_flags() {
        let args = args(&["--clusters", "4", "--seed", "7"]);
        let config = resolve_mining_config(&args).unwrap();
        assert_eq!(config.cluster_selection, ClusterSelection::Fixed { k: 4 });
        assert_eq!(config.random_seed, 7);
    }

    #[test]
    fn test_single_cluster_is_rejected() {
        let args = args(&["--clusters", "1"]);
        assert!(resolve_mining_config(&args).is_err());
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let argv = [
            "techskills",
            "--jobs",
            "a.csv",
            "--investments",
            "b.csv",
            "--profiles",
            "c.csv",
            "--salary-policy",
            "median",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }
}
