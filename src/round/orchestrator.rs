//! The round loop.
//!
//! Each round samples participants, trains the honest ones on the worker
//! pool, crafts one malicious update if the round has malicious members,
//! aggregates the full batch, applies it to the global model and evaluates.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregators::{Aggregate, RobustAggregator};
use crate::attacks::{AttackContext, AttackReference};
use crate::config::RunConfig;
use crate::error::SiegeError;
use crate::model::{GlobalModel, InitialScores};
use crate::round::metrics::{RoundRecord, RunMetrics};
use crate::round::sampling::{ParticipantPool, RoundSelection};
use crate::services::{Evaluation, Evaluator, LocalTrainer, TrainSpec};
use crate::update::{Update, UpdateBatch, UpdateForm};
use crate::verification::AuditLog;

/// Seed handed to a participant's local training.
///
/// Depends only on the run seed, the round and the participant, so results
/// do not depend on worker scheduling.
pub fn training_seed(run_seed: u64, round: usize, participant: usize) -> u64 {
    let mut z = run_seed
        ^ (round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (participant as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Training hyperparameters for one participant in one round.
pub fn train_spec(config: &RunConfig, round: usize, participant: usize) -> TrainSpec {
    TrainSpec {
        local_steps: config.local_steps,
        learning_rate: config.learning_rate_at(round),
        momentum: config.momentum,
        weight_decay: config.weight_decay,
        seed: training_seed(config.seed, round, participant),
    }
}

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Termination {
    /// Every configured round ran
    Completed,
    /// The divergence guard fired
    Diverged {
        /// Round whose evaluation diverged
        round: usize,
        /// Offending loss (NaN or above the ceiling)
        loss: f32,
    },
}

/// Everything that happened in one round.
#[derive(Clone, Debug)]
pub struct RoundReport {
    /// Round number (0-indexed)
    pub round: usize,
    /// Who took part, in slot order
    pub selection: RoundSelection,
    /// Corruption bound passed to the rule
    pub assumed_corrupted: usize,
    /// What the rule produced
    pub aggregate: Aggregate,
    /// Evaluation, if this round was evaluated
    pub evaluation: Option<Evaluation>,
    /// Metrics record, if this round was evaluated
    pub record: Option<RoundRecord>,
    /// Whether the divergence guard fired
    pub diverged: bool,
}

/// Outcome of a full run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Why the run stopped
    pub termination: Termination,
    /// Rounds executed
    pub rounds_run: usize,
    /// Per-round records
    pub metrics: RunMetrics,
}

/// Owns the global model and drives rounds.
pub struct Orchestrator<T: LocalTrainer, E: Evaluator> {
    config: RunConfig,
    trainer: T,
    evaluator: E,
    model: GlobalModel,
    initial_scores: InitialScores,
    form: UpdateForm,
    pool: ParticipantPool,
    aggregator: RobustAggregator,
    metrics: RunMetrics,
    rng: ChaCha8Rng,
    workers: ThreadPool,
    round: usize,
}

impl<T: LocalTrainer, E: Evaluator> Orchestrator<T, E> {
    /// Validate `config` and set up a run starting from `initial_model`.
    pub fn new(
        config: RunConfig,
        trainer: T,
        evaluator: E,
        initial_model: GlobalModel,
    ) -> Result<Self, SiegeError> {
        config.validate()?;
        let form = config.aggregation.form();
        if form == UpdateForm::Rank && initial_model.schema().score_lengths().is_empty() {
            return Err(SiegeError::InvalidConfig(
                "rank aggregation needs at least one score tensor".to_string(),
            ));
        }

        let pool = ParticipantPool::new(config.population, config.malicious_count())?;
        let workers = ThreadPoolBuilder::new()
            .num_threads(config.workers.unwrap_or(0))
            .thread_name(|i| format!("siege-worker-{}", i))
            .build()?;

        Ok(Self {
            initial_scores: InitialScores::capture(&initial_model),
            aggregator: RobustAggregator::new(config.aggregation),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            metrics: RunMetrics::new(),
            model: initial_model,
            round: 0,
            form,
            pool,
            workers,
            config,
            trainer,
            evaluator,
        })
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current global model.
    pub fn model(&self) -> &GlobalModel {
        &self.model
    }

    /// Metrics recorded so far.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Aggregation audit trail.
    pub fn audit(&self) -> &AuditLog {
        self.aggregator.audit()
    }

    /// The participant pool.
    pub fn pool(&self) -> &ParticipantPool {
        &self.pool
    }

    /// Index of the next round.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Execute one round.
    pub fn run_round(&mut self) -> Result<RoundReport, SiegeError> {
        let round = self.round;
        let selection = self.pool.select(
            &mut self.rng,
            self.config.round_size,
            self.config.max_resample_attempts,
        )?;
        let malicious_in_round = selection.malicious_count();
        let attack = &self.config.attack;
        let attacking = attack.is_active() && malicious_in_round > 0;

        // slots trained honestly; without an attack malicious members train too
        let trained_slots: Vec<(usize, usize)> = if attacking {
            selection.honest().collect()
        } else {
            selection.participants().iter().copied().enumerate().collect()
        };
        let crafters = if attacking && attack.needs_reference() {
            self.pool
                .draw_crafters(&mut self.rng, self.config.crafting_participants)
        } else {
            Vec::new()
        };
        debug!(
            round,
            malicious = malicious_in_round,
            crafters = crafters.len(),
            "Selected participants"
        );

        let participants: Vec<usize> = trained_slots
            .iter()
            .map(|&(_, p)| p)
            .chain(crafters.iter().copied())
            .collect();
        let mut updates = self.train(round, &participants)?;
        let reference_updates = updates.split_off(trained_slots.len());

        let mut batch = UpdateBatch::for_model(self.form, selection.len(), &self.model);
        for (&(slot, _), update) in trained_slots.iter().zip(&updates) {
            batch.set(slot, update)?;
        }

        if attacking {
            let reference = AttackReference::from_updates(&reference_updates)?;
            let ctx = AttackContext {
                global: &self.model,
                malicious_in_round,
                rule: self.config.aggregation,
                reference: &reference,
            };
            let crafted = attack.craft(&ctx)?;
            if crafted.form() != self.form {
                return Err(SiegeError::FormMismatch {
                    rule: self.config.aggregation.name(),
                    attack: attack.name(),
                });
            }
            for (slot, _) in selection.malicious() {
                batch.set(slot, &crafted)?;
            }
        }

        let assumed_corrupted = self.config.assumed_corrupted.unwrap_or(malicious_in_round);
        let aggregate = self.aggregator.aggregate(round, &batch, assumed_corrupted)?;
        aggregate.apply_to(&mut self.model, &self.initial_scores)?;
        self.round += 1;

        let evaluate =
            (round + 1) % self.config.eval_every == 0 || round + 1 == self.config.rounds;
        let (evaluation, record, diverged) = if evaluate {
            let evaluation = self.evaluator.evaluate(&self.model)?;
            let record = self.metrics.record(round, malicious_in_round, evaluation);
            let diverged =
                evaluation.loss.is_nan() || evaluation.loss > self.config.divergence_ceiling;
            info!(
                round,
                malicious = malicious_in_round,
                loss = evaluation.loss,
                accuracy = evaluation.accuracy,
                best = record.best_accuracy,
                "Round complete"
            );
            if diverged {
                warn!(
                    round,
                    loss = evaluation.loss,
                    ceiling = self.config.divergence_ceiling,
                    "Global model destroyed, stopping run"
                );
            }
            (Some(evaluation), Some(record), diverged)
        } else {
            debug!(round, malicious = malicious_in_round, "Round complete");
            (None, None, false)
        };

        Ok(RoundReport {
            round,
            selection,
            assumed_corrupted,
            aggregate,
            evaluation,
            record,
            diverged,
        })
    }

    /// Run every remaining round, stopping early on divergence.
    pub fn run(&mut self) -> Result<RunSummary, SiegeError> {
        info!(
            rule = self.config.aggregation.name(),
            attack = self.config.attack.name(),
            population = self.config.population,
            malicious = self.pool.malicious_count(),
            rounds = self.config.rounds,
            "Starting run"
        );
        let mut termination = Termination::Completed;
        while self.round < self.config.rounds {
            let report = self.run_round()?;
            if report.diverged {
                termination = Termination::Diverged {
                    round: report.round,
                    loss: report.evaluation.map_or(f32::NAN, |e| e.loss),
                };
                break;
            }
        }
        Ok(RunSummary {
            termination,
            rounds_run: self.round,
            metrics: self.metrics.clone(),
        })
    }

    /// Train `participants` from the current model on the worker pool.
    fn train(&self, round: usize, participants: &[usize]) -> Result<Vec<Update>, SiegeError> {
        let trainer = &self.trainer;
        let config = &self.config;
        let start = &self.model;
        let form = self.form;
        self.workers.install(|| {
            participants
                .par_iter()
                .map(|&participant| {
                    let spec = train_spec(config, round, participant);
                    let trained = trainer
                        .train(participant, start, &spec)
                        .map_err(|source| SiegeError::Trainer {
                            participant,
                            source,
                        })?;
                    Update::derive(form, &trained, start)
                })
                .collect()
        })
    }
}
