//! Mining orchestrator.
//!
//! Runs clustering and classification against the same warehouse snapshot,
//! isolates their failures, then attaches the derived labels back onto the
//! warehouse records.
//!
//! # Example
//!
//! ```rust,ignore
//! use techskills_mining::{MiningConfig, MiningOrchestrator};
//!
//! let orchestrator = MiningOrchestrator::new(MiningConfig::default())?;
//! let summary = orchestrator.run(&mut result.warehouse)?;
//! println!("{}/{} techniques succeeded",
//!     summary.techniques_succeeded, summary.techniques_attempted);
//! ```

use crate::classification::ClassificationStage;
use crate::clustering::ClusteringStage;
use crate::config::MiningConfig;
use crate::error::MiningError;
use crate::types::{ClassificationResult, ClusteringResult, Technique};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use techskills_processing::{IntegrityError, Warehouse};
use tracing::{info, warn};

/// Terminal state of one mining technique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Success(T),
    Failed { reason: String, code: String },
}

impl<T> StageOutcome<T> {
    fn from_result(technique: Technique, result: Result<T, MiningError>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(e) => {
                warn!("Mining technique '{}' failed: {}", technique, e);
                Self::Failed {
                    reason: e.to_string(),
                    code: e.error_code().to_string(),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failed { reason, .. } => Some(reason),
        }
    }
}

/// Everything one mining run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningSummary {
    pub total_records: usize,
    pub clustering: StageOutcome<ClusteringResult>,
    pub classification: StageOutcome<ClassificationResult>,
    pub techniques_attempted: usize,
    pub techniques_succeeded: usize,
    /// Percentage of attempted techniques that succeeded.
    pub success_rate: f64,
    pub generated_at: DateTime<Utc>,
}

impl MiningSummary {
    pub fn succeeded(&self, technique: Technique) -> bool {
        match technique {
            Technique::Clustering => self.clustering.is_success(),
            Technique::Classification => self.classification.is_success(),
        }
    }
}

/// Sequences the mining stages over one warehouse.
#[derive(Debug, Clone)]
pub struct MiningOrchestrator {
    config: MiningConfig,
}

static_assertions::assert_impl_all!(MiningOrchestrator: Send, Sync);
static_assertions::assert_impl_all!(MiningSummary: Send);

impl MiningOrchestrator {
    /// # Errors
    ///
    /// Returns [`MiningError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: MiningConfig) -> Result<Self, MiningError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Run every technique and attach cluster ids and predictions.
    ///
    /// A technique that lacks data is reported as failed; the other still
    /// runs. Both read the warehouse before anything is attached.
    ///
    /// # Errors
    ///
    /// Only an [`IntegrityError`] while attaching derived fields fails the run.
    pub fn run(&self, warehouse: &mut Warehouse) -> Result<MiningSummary, IntegrityError> {
        info!("Starting mining over {} warehouse records", warehouse.len());

        let clustering = StageOutcome::from_result(
            Technique::Clustering,
            ClusteringStage::run(warehouse, &self.config),
        );
        let classification = StageOutcome::from_result(
            Technique::Classification,
            ClassificationStage::run(warehouse, &self.config),
        );

        if let Some(result) = clustering.payload() {
            for assignment in &result.assignments {
                warehouse.attach_cluster(assignment.record_id, assignment.cluster)?;
            }
        }
        if let Some(result) = classification.payload() {
            for prediction in &result.predictions {
                warehouse.attach_prediction(prediction.record_id, prediction.predicted)?;
            }
        }

        let techniques_attempted = Technique::ALL.len();
        let techniques_succeeded =
            usize::from(clustering.is_success()) + usize::from(classification.is_success());
        let success_rate =
            (techniques_succeeded as f64 / techniques_attempted as f64 * 1000.0).round() / 10.0;
        info!(
            "Mining complete: {}/{} techniques succeeded",
            techniques_succeeded, techniques_attempted
        );

        Ok(MiningSummary {
            total_records: warehouse.len(),
            clustering,
            classification,
            techniques_attempted,
            techniques_succeeded,
            success_rate,
            generated_at: Utc::now(),
        })
    }
}
