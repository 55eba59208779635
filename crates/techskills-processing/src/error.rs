//! Error types for the warehouse processing pipeline.
//!
//! Three families of failure exist, each with its own propagation policy:
//!
//! - [`SchemaError`]: a single raw record cannot be mapped to the canonical
//!   schema. The record is dropped and counted; the run continues.
//! - [`IntegrityError`]: a warehouse invariant is violated after assembly.
//!   This is fatal, since every downstream statistic would be meaningless.
//! - [`PipelineError`]: the top-level error returned by [`crate::Pipeline`].
//!
//! Errors are serializable as `{code, message}` so they can be written into
//! JSON reports alongside the results.

use crate::types::{RecordId, SourceType};
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// A raw record could not be mapped to a [`crate::CanonicalRecord`].
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    /// A required field is absent or holds a null marker.
    #[error("{source_type} row {row}: required field '{field}' is missing")]
    MissingField {
        source_type: SourceType,
        row: usize,
        field: &'static str,
    },

    /// A required field is present but cannot be interpreted.
    #[error("{source_type} row {row}: field '{field}' has unparseable value '{value}'")]
    Unparseable {
        source_type: SourceType,
        row: usize,
        field: &'static str,
        value: String,
    },

    /// The country is outside the closed vocabulary.
    #[error("{source_type} row {row}: country '{value}' is not one of the known countries")]
    UnknownCountry {
        source_type: SourceType,
        row: usize,
        value: String,
    },
}

impl SchemaError {
    /// Source the rejected record came from.
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::MissingField { source_type, .. }
            | Self::Unparseable { source_type, .. }
            | Self::UnknownCountry { source_type, .. } => *source_type,
        }
    }

    /// Zero-based row index of the rejected record within its source.
    pub fn row(&self) -> usize {
        match self {
            Self::MissingField { row, .. }
            | Self::Unparseable { row, .. }
            | Self::UnknownCountry { row, .. } => *row,
        }
    }
}

/// A warehouse invariant does not hold.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    /// Two records share the same surrogate id.
    #[error("duplicate record id {0}")]
    DuplicateId(RecordId),

    /// A numeric field holds a zero, negative or non-finite value instead of `None`.
    #[error("record {id} stores sentinel value {value} in '{field}'")]
    SentinelValue {
        id: RecordId,
        field: &'static str,
        value: f64,
    },

    /// A record flagged for removal by the outlier engine is still present.
    #[error("record {0} was flagged for removal but is still present")]
    RemovedRecordPresent(RecordId),

    /// A derived label targets a record the warehouse does not hold.
    #[error("no record with id {0} in the warehouse")]
    UnknownRecord(RecordId),

    /// A derived label was attached twice to the same record.
    #[error("record {id} already has a value for derived field '{field}'")]
    DerivedFieldAlreadySet { id: RecordId, field: &'static str },
}

/// The main error type for the processing pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The assembled warehouse violates an invariant.
    #[error("Warehouse integrity violated: {0}")]
    Integrity(#[from] IntegrityError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for reports and exit handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Integrity(_) => "INTEGRITY_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error aborted the run because of a warehouse invariant.
    pub fn is_integrity_violation(&self) -> bool {
        match self {
            Self::Integrity(_) => true,
            Self::WithContext { source, .. } => source.is_integrity_violation(),
            _ => false,
        }
    }
}

impl From<crate::config::ConfigValidationError> for PipelineError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, IntegrityError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Integrity(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = PipelineError::Integrity(IntegrityError::DuplicateId(RecordId(3)));
        assert_eq!(err.error_code(), "INTEGRITY_ERROR");
        assert_eq!(
            PipelineError::InvalidConfig("x".to_string()).error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_with_context_preserves_code() {
        let err = PipelineError::Integrity(IntegrityError::RemovedRecordPresent(RecordId(9)))
            .with_context("During warehouse assembly");
        assert!(err.to_string().contains("During warehouse assembly"));
        assert_eq!(err.error_code(), "INTEGRITY_ERROR");
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_error_serialization() {
        let err = PipelineError::Integrity(IntegrityError::DuplicateId(RecordId(12)));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INTEGRITY_ERROR"));
        assert!(json.contains("12"));
    }

    #[test]
    fn test_schema_error_accessors() {
        let err = SchemaError::UnknownCountry {
            source_type: SourceType::Profile,
            row: 4,
            value: "Narnia".to_string(),
        };
        assert_eq!(err.source_type(), SourceType::Profile);
        assert_eq!(err.row(), 4);
        assert!(err.to_string().contains("Narnia"));

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unknown_country");
    }
}
