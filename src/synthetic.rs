//! Synthetic collaborators for simulations, tests and benches.
//!
//! [`QuadraticTask`] stands in for a real model and dataset: every
//! participant minimizes `0.5 * ||theta - target_i||^2` where the targets are
//! scattered around a shared optimum, and evaluation measures the distance of
//! the global model from that optimum. It implements both [`LocalTrainer`]
//! and [`Evaluator`], with the same SGD hyperparameters a real trainer takes.

use std::sync::Arc;

use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::SiegeError;
use crate::model::{GlobalModel, ParameterSchema};
use crate::services::{Evaluation, Evaluator, LocalTrainer, TrainSpec, TrainerError};

/// Per-participant quadratic objectives around a shared optimum.
#[derive(Clone, Debug)]
pub struct QuadraticTask {
    schema: Arc<ParameterSchema>,
    optimum: Array1<f32>,
    initial: Array1<f32>,
    targets: Vec<Array1<f32>>,
    gradient_noise: f32,
    tolerance: f32,
    failing: Option<usize>,
}

impl QuadraticTask {
    /// Build a task for `population` participants.
    ///
    /// # Arguments
    ///
    /// * `schema` - Model layout
    /// * `population` - Number of participants with local data
    /// * `heterogeneity` - Half-width of the uniform offset of each participant's target
    /// * `seed` - Seed for the optimum, the initial model and the targets
    pub fn new(
        schema: Arc<ParameterSchema>,
        population: usize,
        heterogeneity: f32,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dim = schema.total_len();
        let optimum = Array1::from_shape_fn(dim, |_| rng.gen_range(-1.0f32..=1.0));
        let initial = Array1::from_shape_fn(dim, |_| rng.gen_range(-1.0f32..=1.0));
        let spread = heterogeneity.abs();
        let targets = (0..population)
            .map(|_| {
                optimum.mapv(|o| {
                    if spread > 0.0 {
                        o + rng.gen_range(-spread..=spread)
                    } else {
                        o
                    }
                })
            })
            .collect();

        Self {
            schema,
            optimum,
            initial,
            targets,
            gradient_noise: 0.0,
            tolerance: 0.25,
            failing: None,
        }
    }

    /// Add seeded uniform noise of this half-width to every gradient.
    pub fn with_gradient_noise(mut self, noise: f32) -> Self {
        self.gradient_noise = noise.abs();
        self
    }

    /// Distance from the optimum under which a coordinate counts as correct.
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Make training fail for one participant.
    pub fn failing_for(mut self, participant: usize) -> Self {
        self.failing = Some(participant);
        self
    }

    /// Starting global model.
    pub fn initial_model(&self) -> GlobalModel {
        // lengths agree by construction
        GlobalModel::from_vector(self.schema.clone(), self.initial.clone())
            .unwrap_or_else(|_| GlobalModel::zeros(self.schema.clone()))
    }

    /// The shared optimum the evaluator measures against.
    pub fn optimum(&self) -> &Array1<f32> {
        &self.optimum
    }

    /// Local target of one participant.
    pub fn target(&self, participant: usize) -> Option<&Array1<f32>> {
        self.targets.get(participant)
    }
}

impl LocalTrainer for QuadraticTask {
    fn train(
        &self,
        participant: usize,
        start: &GlobalModel,
        spec: &TrainSpec,
    ) -> Result<GlobalModel, TrainerError> {
        if self.failing == Some(participant) {
            return Err(TrainerError(format!(
                "participant {} has no usable data",
                participant
            )));
        }
        let target = self
            .targets
            .get(participant)
            .ok_or_else(|| TrainerError(format!("unknown participant {}", participant)))?;
        if target.len() != start.dim() {
            return Err(TrainerError(format!(
                "model has {} parameters, task has {}",
                start.dim(),
                target.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
        let mut theta = start.params().clone();
        let mut velocity = Array1::<f32>::zeros(theta.len());

        for _ in 0..spec.local_steps {
            let mut grad = &theta - target;
            grad.scaled_add(spec.weight_decay, &theta);
            if self.gradient_noise > 0.0 {
                let noise = self.gradient_noise;
                grad.mapv_inplace(|g| g + rng.gen_range(-noise..=noise));
            }
            velocity *= spec.momentum;
            velocity += &grad;
            theta.scaled_add(-spec.learning_rate, &velocity);
        }

        GlobalModel::from_vector(start.schema().clone(), theta)
            .map_err(|e| TrainerError(e.to_string()))
    }
}

impl Evaluator for QuadraticTask {
    fn evaluate(&self, model: &GlobalModel) -> Result<Evaluation, SiegeError> {
        if model.dim() != self.optimum.len() {
            return Err(SiegeError::Evaluator(format!(
                "model has {} parameters, task has {}",
                model.dim(),
                self.optimum.len()
            )));
        }
        if model.dim() == 0 {
            return Ok(Evaluation {
                loss: 0.0,
                accuracy: 1.0,
            });
        }

        let diff = model.params() - &self.optimum;
        let loss = diff.mapv(|d| d * d).sum() / diff.len() as f32;
        let correct = diff.iter().filter(|d| d.abs() < self.tolerance).count();
        Ok(Evaluation {
            loss,
            accuracy: correct as f32 / diff.len() as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> QuadraticTask {
        let schema = Arc::new(ParameterSchema::builder().weight("w", &[8]).build().unwrap());
        QuadraticTask::new(schema, 4, 0.1, 7)
    }

    fn spec(seed: u64) -> TrainSpec {
        TrainSpec {
            local_steps: 20,
            learning_rate: 0.1,
            momentum: 0.5,
            weight_decay: 0.0,
            seed,
        }
    }

    #[test]
    fn test_training_reduces_loss() {
        let task = task();
        let start = task.initial_model();
        let before = task.evaluate(&start).unwrap();
        let trained = task.train(0, &start, &spec(1)).unwrap();
        let after = task.evaluate(&trained).unwrap();
        assert!(after.loss < before.loss);
    }

    #[test]
    fn test_training_is_deterministic() {
        let task = task().with_gradient_noise(0.05);
        let start = task.initial_model();
        let a = task.train(2, &start, &spec(9)).unwrap();
        let b = task.train(2, &start, &spec(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_failing_participant() {
        let task = task().failing_for(1);
        let start = task.initial_model();
        assert!(task.train(1, &start, &spec(0)).is_err());
        assert!(task.train(0, &start, &spec(0)).is_ok());
        assert!(task.train(99, &start, &spec(0)).is_err());
    }

    #[test]
    fn test_nan_model_has_nan_loss() {
        let task = task();
        let mut model = task.initial_model();
        model.params_mut()[0] = f32::NAN;
        let eval = task.evaluate(&model).unwrap();
        assert!(eval.loss.is_nan());
        assert!(eval.accuracy < 1.0);
    }

    #[test]
    fn test_optimum_scores_perfectly() {
        let task = task();
        let model =
            GlobalModel::from_vector(task.initial_model().schema().clone(), task.optimum().clone())
                .unwrap();
        let eval = task.evaluate(&model).unwrap();
        assert_eq!(eval.loss, 0.0);
        assert_eq!(eval.accuracy, 1.0);
    }
}
