//! # Siege-FL: federated learning under adaptive Byzantine attack
//!
//! Siege-FL simulates federated-learning rounds in which a bounded fraction
//! of participants is malicious. Each round a coordinator samples
//! participants, collects their updates, aggregates them with a
//! Byzantine-robust rule and applies the result to a shared global model.
//! Malicious participants run attacks tailored to the rule in use.
//!
//! ## Aggregation Rules
//!
//! - [`fedavg()`] - Coordinate-wise mean (no Byzantine tolerance)
//! - [`trimmed_mean()`] - Coordinate-wise trimmed mean
//! - [`multi_krum()`] - Multi-Krum selection (n >= 2f+3)
//! - [`rank_vote()`] - Positional majority vote over score rankings
//!
//! ## Attacks
//!
//! - Scale: model replacement against the mean
//! - Deviation search: the largest deviation Trimmed-Mean or Multi-Krum
//!   still accepts
//! - Rank permutation: rearranged consensus rankings against rank voting
//!
//! ## Running a Simulation
//!
//! Build a [`RunConfig`], provide a [`LocalTrainer`] and an [`Evaluator`]
//! (the [`synthetic`] module has a ready-made one), and hand both to an
//! [`Orchestrator`].
//!
//! ```rust
//! use std::sync::Arc;
//! use siege_fl::{Orchestrator, ParameterSchema, RunConfig, Termination};
//! use siege_fl::aggregators::AggregationRule;
//! use siege_fl::attacks::AttackStrategy;
//! use siege_fl::synthetic::QuadraticTask;
//!
//! let schema = Arc::new(ParameterSchema::builder().weight("w", &[16]).build().unwrap());
//! let task = QuadraticTask::new(schema, 100, 0.1, 0);
//!
//! let config = RunConfig {
//!     rounds: 20,
//!     aggregation: AggregationRule::Mean,
//!     attack: AttackStrategy::Scale { factor: 100_000.0 },
//!     ..Default::default()
//! };
//! let mut orch = Orchestrator::new(config, task.clone(), task.clone(), task.initial_model()).unwrap();
//! let summary = orch.run().unwrap();
//! assert!(matches!(summary.termination, Termination::Diverged { .. }));
//! ```

#![deny(missing_docs)]

pub mod aggregators;
pub mod attacks;
pub mod config;
pub mod error;
pub mod math;
pub mod model;
pub mod round;
pub mod services;
pub mod synthetic;
pub mod update;
pub mod verification;

// Re-exports
pub use aggregators::fedavg;
pub use aggregators::multi_krum;
pub use aggregators::rank_vote;
pub use aggregators::trimmed_mean;
pub use aggregators::{Aggregate, AggregateUpdate, AggregationRule, RobustAggregator};
pub use attacks::{AttackContext, AttackReference, AttackStrategy};
pub use config::RunConfig;
pub use error::SiegeError;
pub use model::{GlobalModel, InitialScores, ParameterSchema};
pub use round::{Orchestrator, RoundReport, RunMetrics, RunSummary, Termination};
pub use services::{Evaluation, Evaluator, LocalTrainer, TrainSpec, TrainerError};
pub use update::{RankUpdate, Update, UpdateBatch, UpdateForm};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
