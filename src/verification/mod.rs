//! Verification primitives for federated learning rounds.
//!
//! - [`tolerance`]: Krum's `n >= 2f+3`, the trimmed-mean `n > 2k` requirement
//!   and the honest-majority draw
//! - [`audit`]: Per-round aggregation trail

pub mod audit;
pub mod tolerance;

pub use audit::{AggregationAuditEntry, AuditLog};
pub use tolerance::{
    honest_majority, honest_majority_possible, krum_condition_met, trim_condition_met,
};
