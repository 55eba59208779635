//! Record cleaning stages.
//!
//! - [`Deduplicator`]: collapses records sharing a tolerant dedup key.
//! - [`OutlierEngine`]: flags IQR outliers per field and stratification
//!   group, then caps or drops them.

mod dedup;
mod outliers;

pub use dedup::{DedupKey, DedupOutcome, Deduplicator};
pub use outliers::{FieldBounds, OutlierEngine, OutlierOutcome};
