//! Niche-opportunity scoring for extracted products.
//!
//! Pure functions over a finished batch: no I/O, no global thresholds. The
//! caller supplies the [`nichefinder_core::FilterCriteria`].

pub mod scorer;
pub mod summary;

pub use scorer::{meets_criteria, opportunity_score, score, ScoredProductRecord};
pub use summary::{summarize, ScoreSummary};
