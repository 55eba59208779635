//! Error types for the mining stages.
//!
//! [`MiningError::InsufficientData`] is a stage-local failure: the
//! orchestrator records it against the technique and keeps going.
//! [`MiningError::InvalidConfig`] is raised when building a [`crate::MiningConfig`].

use thiserror::Error;

/// The main error type for mining operations.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MiningError {
    /// Not enough rows, or not enough label diversity, to fit a model.
    ///
    /// Common causes:
    /// - Fewer rows than requested clusters
    /// - The demand label has a single class in the labeled set or the training split
    /// - Too few records of the selected source carry a salary
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Invalid configuration provided to a mining stage.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MiningError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientData(_) => "INSUFFICIENT_DATA",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    pub(crate) fn insufficient(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MiningError::insufficient("3 rows for 5 clusters").error_code(),
            "INSUFFICIENT_DATA"
        );
        assert_eq!(
            MiningError::InvalidConfig("n_trees".into()).error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_error_display() {
        let err = MiningError::insufficient("label has a single class");
        assert_eq!(err.to_string(), "Insufficient data: label has a single class");
    }
}
