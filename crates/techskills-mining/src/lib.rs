//! Mining stages over the TechWarehouse.
//!
//! # Overview
//!
//! - **Clustering**: k-means segmentation of professional profiles on
//!   standardized salary, age, experience and country features
//! - **Classification**: random forest predicting whether a job is
//!   "high demand" (salary above a documented threshold)
//! - **Orchestration**: runs both on one warehouse snapshot, reports each as
//!   a [`StageOutcome`] and attaches cluster ids and predictions to records
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use techskills_mining::{MiningConfig, MiningOrchestrator};
//!
//! let config = MiningConfig::builder().random_seed(42).build()?;
//! let summary = MiningOrchestrator::new(config)?.run(&mut warehouse)?;
//!
//! if let Some(classification) = summary.classification.payload() {
//!     println!("accuracy {:.2}", classification.accuracy);
//! }
//! ```
//!
//! # Error Handling
//!
//! A stage without enough data fails with [`MiningError::InsufficientData`],
//! which the orchestrator folds into the summary. Only an
//! [`techskills_processing::IntegrityError`] raised while attaching derived
//! fields aborts a run.

pub mod classification;
pub mod clustering;
pub mod config;
pub mod error;
pub mod features;
pub mod orchestrator;
pub mod types;

pub use classification::ClassificationStage;
pub use clustering::ClusteringStage;
pub use config::{ClusterSelection, DemandRule, MiningConfig, MiningConfigBuilder};
pub use error::MiningError;
pub use orchestrator::{MiningOrchestrator, MiningSummary, StageOutcome};
pub use types::{
    ClassificationResult, ClassifierKind, ClusterAssignment, ClusterProfile, ClusteringResult,
    ConfusionCounts, FeatureImportance, ModelComparison, ModelQuality, RecordPrediction,
    Technique,
};
