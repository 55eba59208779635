//! Progress reporting for the processing pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use techskills_processing::Pipeline;
//!
//! let result = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process(sources)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    /// Mapping raw records onto the canonical schema
    Unification,
    /// Collapsing duplicate records
    Deduplication,
    /// Flagging and resolving outliers
    OutlierHandling,
    /// Computing the quality report
    QualityScoring,
    /// Assembling and verifying the warehouse
    WarehouseAssembly,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl ProcessingStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unification => "Unifying Sources",
            Self::Deduplication => "Removing Duplicates",
            Self::OutlierHandling => "Handling Outliers",
            Self::QualityScoring => "Scoring Quality",
            Self::WarehouseAssembly => "Assembling Warehouse",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Unification => 0.0,
            Self::Deduplication => 0.30,
            Self::OutlierHandling => 0.55,
            Self::QualityScoring => 0.75,
            Self::WarehouseAssembly => 0.85,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A progress update emitted at stage boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Overall progress (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
}

impl ProgressUpdate {
    /// Update marking the start of a stage.
    pub fn started(stage: ProcessingStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress(),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::started(ProcessingStage::Complete, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::started(ProcessingStage::Failed, message)
    }
}

/// Trait for receiving progress updates during processing.
///
/// Implementations must be `Send + Sync` so a pipeline can be moved to a
/// worker thread together with its reporter.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_stage_progress_is_monotonic() {
        let stages = [
            ProcessingStage::Unification,
            ProcessingStage::Deduplication,
            ProcessingStage::OutlierHandling,
            ProcessingStage::QualityScoring,
            ProcessingStage::WarehouseAssembly,
            ProcessingStage::Complete,
        ];
        assert!(
            stages
                .windows(2)
                .all(|w| w[0].base_progress() < w[1].base_progress())
        );
    }

    #[test]
    fn test_closure_reporter_receives_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        });
        reporter.report(ProgressUpdate::started(ProcessingStage::Deduplication, "dedup"));
        reporter.report(ProgressUpdate::complete("done"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ProcessingStage::Deduplication, ProcessingStage::Complete]
        );
    }
}
