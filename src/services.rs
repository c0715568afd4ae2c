//! Interfaces of the external collaborators: local training and evaluation.
//!
//! The round protocol never looks inside a model's forward pass or
//! optimizer. It hands a starting model to a [`LocalTrainer`] and scores the
//! aggregated result with an [`Evaluator`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SiegeError;
use crate::model::GlobalModel;

/// Hyperparameters for one participant's local training.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainSpec {
    /// Local optimizer steps
    pub local_steps: usize,
    /// Learning rate for this round (after decay)
    pub learning_rate: f32,
    /// SGD momentum
    pub momentum: f32,
    /// L2 weight decay
    pub weight_decay: f32,
    /// Seed that makes the training run reproducible
    pub seed: u64,
}

/// Failure reported by a [`LocalTrainer`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TrainerError(pub String);

/// Trains a copy of the global model on one participant's local data.
///
/// Implementations must be deterministic for a given `spec.seed`. Calls for
/// different participants run concurrently on the round's worker pool.
pub trait LocalTrainer: Send + Sync {
    /// Train starting from `start` and return the trained model.
    fn train(
        &self,
        participant: usize,
        start: &GlobalModel,
        spec: &TrainSpec,
    ) -> Result<GlobalModel, TrainerError>;
}

/// Held-out score of a model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Test loss; NaN when the model is destroyed
    pub loss: f32,
    /// Test accuracy in `[0, 1]`
    pub accuracy: f32,
}

/// Scores the global model on held-out data.
pub trait Evaluator {
    /// Evaluate `model`.
    fn evaluate(&self, model: &GlobalModel) -> Result<Evaluation, SiegeError>;
}
