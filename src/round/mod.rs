//! Round orchestration: participant sampling, dispatch, aggregation and
//! metrics.

pub mod metrics;
pub mod orchestrator;
pub mod sampling;

pub use metrics::{RoundRecord, RunMetrics};
pub use orchestrator::{
    train_spec, training_seed, Orchestrator, RoundReport, RunSummary, Termination,
};
pub use sampling::{ParticipantPool, RoundSelection};
