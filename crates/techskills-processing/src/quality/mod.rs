//! Data quality scoring module.
//!
//! Turns the counts collected while cleaning into a [`QualityReport`] with a
//! reproducible 0-100 score.

mod scorer;

pub use scorer::{QualityInputs, QualityReport, QualityScorer, QualityStatus};
