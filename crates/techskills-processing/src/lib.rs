//! Tech labor market warehouse processing.
//!
//! Consolidates three heterogeneous sources (job postings, technology
//! investment programs and professional profiles) into one cleaned,
//! verified record set: the TechWarehouse.
//!
//! # Overview
//!
//! - **Unification**: maps each source's field names, units and spellings
//!   onto one canonical record schema
//! - **Deduplication**: collapses records sharing a tolerant dedup key
//! - **Outlier handling**: IQR bounds per field and stratification group,
//!   resolved by capping or dropping
//! - **Quality scoring**: completeness, uniqueness and validity folded into
//!   a 0-100 score
//! - **Warehouse assembly**: ordered, invariant-checked record set that
//!   downstream mining stages enrich with derived labels
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use techskills_processing::{ingest, Pipeline, PipelineConfig, OutlierPolicy};
//!
//! let sources = ingest::load_sources(jobs_path, investments_path, profiles_path)?;
//!
//! let config = PipelineConfig::builder()
//!     .salary_policy(OutlierPolicy::Cap)
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .build()?
//!     .process(sources)?;
//!
//! println!("{} records, quality {:.1} ({})",
//!     result.warehouse.len(),
//!     result.quality_report.score,
//!     result.quality_report.status);
//! ```
//!
//! # Error Handling
//!
//! Records that cannot be unified are dropped and reported as
//! [`SchemaError`]s. A violated warehouse invariant is an
//! [`IntegrityError`] and aborts the run with [`PipelineError::Integrity`].

pub mod cleaner;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod quality;
pub mod types;
pub mod unify;
pub mod utils;
pub mod warehouse;

// Re-export main types for convenience
pub use config::{
    ConfigValidationError, DedupTolerance, OutlierPolicy, OutlierRule, PipelineConfig,
    PipelineConfigBuilder, QualityWeights, StatusThresholds, Stratification,
};
pub use error::{IntegrityError, PipelineError, Result, ResultExt, SchemaError};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineResult, ProcessingStage,
    ProgressReporter, ProgressUpdate,
};
pub use quality::{QualityReport, QualityStatus};
pub use types::{
    CanonicalRecord, Country, DuplicateGroup, ExperienceLevel, NumericField, OutlierAction,
    OutlierFlag, RawRecord, RawSources, RawValue, RecordId, SalaryBand, SourceType,
};
pub use warehouse::{Warehouse, WarehouseBuilder, WarehouseSummary};
