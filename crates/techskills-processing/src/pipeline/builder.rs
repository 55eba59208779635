//! Main processing pipeline.
//!
//! Sequences unification, deduplication, outlier handling, quality scoring
//! and warehouse assembly over the complete output of the previous stage.

use super::progress::{ClosureProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::cleaner::{Deduplicator, FieldBounds, OutlierEngine};
use crate::config::PipelineConfig;
use crate::error::{ResultExt, Result, SchemaError};
use crate::quality::{QualityInputs, QualityReport, QualityScorer};
use crate::types::{DuplicateGroup, OutlierAction, OutlierFlag, RawSources};
use crate::unify::unify_sources;
use crate::warehouse::{Warehouse, WarehouseSummary};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything one processing run produces.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The verified, ordered record set.
    pub warehouse: Warehouse,
    pub quality_report: QualityReport,
    pub summary: WarehouseSummary,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub outlier_flags: Vec<OutlierFlag>,
    pub outlier_bounds: Vec<FieldBounds>,
    /// Raw records dropped during unification, with the reason.
    pub schema_rejections: Vec<SchemaError>,
    /// Human-readable log of what each stage did.
    pub processing_steps: Vec<String>,
    pub duration_ms: u64,
}

/// The processing pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use techskills_processing::{Pipeline, PipelineConfig};
///
/// let result = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .build()?
///     .process(sources)?;
///
/// println!("Quality score: {:.1}", result.quality_report.score);
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Ensure Pipeline is Send (can be moved to another thread)
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over the three raw sources.
    ///
    /// Records that cannot be unified are dropped and reported in the
    /// result. Only a warehouse integrity violation fails the run.
    pub fn process(&self, sources: RawSources) -> Result<PipelineResult> {
        match self.process_internal(sources) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn process_internal(&self, sources: RawSources) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let mut processing_steps: Vec<String> = Vec::new();
        let total_raw = sources.total();

        // Step 1: Unification
        self.report_progress(ProgressUpdate::started(
            ProcessingStage::Unification,
            format!("Unifying {} raw records...", total_raw),
        ));
        info!("Step 1: Unifying {} raw records...", total_raw);
        let unified = unify_sources(&sources);
        drop(sources);
        let total_unified = unified.records.len();
        processing_steps.push(format!(
            "Unified {} of {} raw records ({} rejected)",
            total_unified,
            total_raw,
            unified.rejections.len()
        ));

        // Step 2: Deduplication
        self.report_progress(ProgressUpdate::started(
            ProcessingStage::Deduplication,
            "Removing duplicate records...",
        ));
        info!("Step 2: Removing duplicates...");
        let dedup = Deduplicator::deduplicate(unified.records, &self.config.dedup);
        let mut duplicate_count = dedup.duplicate_count();
        let mut total_after_dedup = dedup.survivors.len();
        let dedup_survivors = total_after_dedup;
        processing_steps.push(format!(
            "Removed {} duplicates in {} groups",
            duplicate_count,
            dedup.groups.len()
        ));

        // Step 3: Outliers
        self.report_progress(ProgressUpdate::started(
            ProcessingStage::OutlierHandling,
            "Handling outliers...",
        ));
        info!("Step 3: Handling outliers...");
        let outliers = OutlierEngine::handle_outliers(dedup.survivors, &self.config);
        processing_steps.push(format!(
            "Flagged {} outliers ({} capped, {} removed)",
            outliers.flags.len(),
            outliers.capped_count(),
            outliers.removed_count()
        ));

        // Capping can pull two survivors onto the same salary bucket.
        let outlier_count = outliers.flagged_records();
        let capped_count = outliers.capped_count();
        let removed_count = outliers.removed_count();
        let resolved = Deduplicator::deduplicate(outliers.records, &self.config.dedup);
        let collapsed = resolved.duplicate_count();
        if collapsed > 0 {
            info!("Capping produced {} further duplicates", collapsed);
            processing_steps.push(format!(
                "Collapsed {} duplicates produced by capping",
                collapsed
            ));
        }
        let duplicate_groups = Deduplicator::merge_groups(dedup.groups, &resolved.groups);
        duplicate_count += collapsed;
        total_after_dedup -= collapsed;

        // Step 4: Quality
        self.report_progress(ProgressUpdate::started(
            ProcessingStage::QualityScoring,
            "Scoring data quality...",
        ));
        info!("Step 4: Scoring data quality...");
        let quality_report = QualityScorer::score(
            &QualityInputs {
                total_raw,
                schema_rejections: unified.rejections.len(),
                total_unified,
                total_after_dedup,
                duplicate_count,
                outlier_count,
                outlier_scope: dedup_survivors,
                capped_count,
                removed_count,
                records: &resolved.survivors,
            },
            &self.config.quality_weights,
            &self.config.status_thresholds,
        );
        processing_steps.push(format!(
            "Quality score {:.2} ({})",
            quality_report.score, quality_report.status
        ));

        // Step 5: Warehouse
        self.report_progress(ProgressUpdate::started(
            ProcessingStage::WarehouseAssembly,
            "Assembling warehouse...",
        ));
        info!("Step 5: Assembling warehouse...");
        let removed_ids = outliers
            .flags
            .iter()
            .filter(|f| f.action == OutlierAction::Removed)
            .map(|f| f.record_id);
        let warehouse = Warehouse::builder()
            .removed(removed_ids)
            .build(resolved.survivors)
            .context("Warehouse assembly failed")?;
        let summary = warehouse.summary();
        processing_steps.push(format!("Warehouse holds {} records", warehouse.len()));

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Processing finished in {} ms", duration_ms);

        Ok(PipelineResult {
            warehouse,
            quality_report,
            summary,
            duplicate_groups,
            outlier_flags: outliers.flags,
            outlier_bounds: outliers.bounds,
            schema_rejections: unified.rejections,
            processing_steps,
            duration_ms,
        })
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Ensure PipelineBuilder is Send (can be moved to another thread during construction)
static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving stage updates.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a closure to receive stage updates.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}
