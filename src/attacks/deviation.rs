//! Adaptive deviation search against robust delta aggregation.
//!
//! The attacker averages its own benign reference updates into `μ` and picks
//! a direction `d`. It then searches for the largest scale `λ` such that the
//! candidate `μ − λ·d`, submitted by every malicious participant, still
//! passes a local simulation of the target rule.
//!
//! The search is a bisection over `λ`: start at `threshold` with step
//! `threshold / 2`, move up after an accepted trial and down after a
//! rejected one, and halve the step every trial. It stops once the last
//! accepted scale and the current scale are within `tolerance`, or after
//! `max_iterations` trials.
//!
//! What "passes" means is configurable through [`Acceptance`]:
//!
//! | Test | Accepts when |
//! |------|--------------|
//! | [`Acceptance::AllSelected`] | Multi-Krum selects every crafted copy |
//! | [`Acceptance::DeviationGrows`] | trimmed mean moves further from `μ` than the previous trial |
//! | [`Acceptance::WithinSpread`] | `‖candidate − μ‖` stays within `bound` × the widest reference |

use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregators::krum::select_best;
use crate::aggregators::trimmed_mean::trim_columns;
use crate::aggregators::AggregationRule;
use crate::error::SiegeError;
use crate::verification::{krum_condition_met, trim_condition_met};
use crate::math::{coordinate_mean, coordinate_std, l2_norm};

/// Direction the candidate is pushed along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    /// Coordinate-wise sample standard deviation of the reference
    #[default]
    Std,
    /// Unit vector along the reference mean
    UnitVec,
    /// Sign of the reference mean
    Sign,
}

/// Test deciding whether a trial candidate would survive the target rule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum Acceptance {
    /// Every crafted copy is kept by Multi-Krum with `f = m`
    AllSelected,
    /// Trimmed mean with `k = m` deviates from `μ` more than the previous trial
    DeviationGrows,
    /// Candidate lies within `bound` times the largest reference distance to `μ`
    WithinSpread {
        /// Multiple of the reference spread
        bound: f32,
    },
}

impl Acceptance {
    /// The acceptance test matching a rule's selection criterion.
    pub fn for_rule(rule: AggregationRule) -> Self {
        match rule {
            AggregationRule::MultiKrum => Acceptance::AllSelected,
            _ => Acceptance::DeviationGrows,
        }
    }
}

fn default_threshold() -> f32 {
    5.0
}

fn default_tolerance() -> f32 {
    1e-5
}

fn default_max_iterations() -> usize {
    64
}

/// Deviation-search parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviationSearch {
    /// Direction of the deviation
    #[serde(default)]
    pub deviation: DeviationKind,
    /// Starting scale; the search never exceeds `2 × threshold`
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Stop once successive scales differ by no more than this
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    /// Hard cap on trials
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Acceptance test; defaults to [`Acceptance::for_rule`]
    #[serde(default)]
    pub acceptance: Option<Acceptance>,
}

impl Default for DeviationSearch {
    fn default() -> Self {
        Self {
            deviation: DeviationKind::default(),
            threshold: default_threshold(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            acceptance: None,
        }
    }
}

/// One evaluated scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchTrial {
    /// Scale tried
    pub lambda: f32,
    /// Whether the acceptance test passed
    pub accepted: bool,
}

/// Result of a deviation search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Crafted delta `μ − λ·d`
    pub update: Array1<f32>,
    /// Largest accepted scale (zero if no trial passed)
    pub lambda: f32,
    /// Every trial in order
    pub trials: Vec<SearchTrial>,
}

impl DeviationSearch {
    /// Acceptance test used against `rule`.
    pub fn acceptance_for(&self, rule: AggregationRule) -> Acceptance {
        self.acceptance.unwrap_or_else(|| Acceptance::for_rule(rule))
    }

    /// Deviation direction for a reference batch with mean `mu`.
    pub fn direction(&self, reference: &Array2<f32>, mu: &Array1<f32>) -> Array1<f32> {
        match self.deviation {
            DeviationKind::Std => coordinate_std(reference),
            DeviationKind::UnitVec => {
                let norm = l2_norm(mu.view());
                if norm > 0.0 && norm.is_finite() {
                    mu / norm
                } else {
                    Array1::zeros(mu.len())
                }
            }
            DeviationKind::Sign => mu.mapv(|x| {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }),
        }
    }

    /// Run the search.
    ///
    /// # Arguments
    ///
    /// * `reference` - Benign updates produced by the crafting participants
    /// * `malicious` - Malicious submissions in the round (at least one is
    ///   simulated)
    /// * `rule` - Rule the attack targets; picks the default acceptance test
    pub fn search(
        &self,
        reference: &Array2<f32>,
        malicious: usize,
        rule: AggregationRule,
    ) -> Result<SearchOutcome, SiegeError> {
        if reference.nrows() == 0 {
            return Err(SiegeError::EmptyUpdates);
        }
        let copies = malicious.max(1);
        let mu = coordinate_mean(reference);
        let direction = self.direction(reference, &mu);
        let acceptance = self.acceptance_for(rule);
        let spread = reference
            .rows()
            .into_iter()
            .map(|row| l2_norm((&row - &mu).view()))
            .fold(0.0f32, f32::max);

        let simulated = copies.saturating_add(reference.nrows());
        let degraded = match acceptance {
            Acceptance::AllSelected => !krum_condition_met(simulated, copies),
            Acceptance::DeviationGrows => !trim_condition_met(simulated, copies),
            Acceptance::WithinSpread { .. } => false,
        };
        if degraded {
            warn!(
                rule = rule.name(),
                copies,
                reference = reference.nrows(),
                "Too few reference updates for the simulated rule, search is best-effort"
            );
        }

        let mut lambda = self.threshold;
        let mut step = self.threshold / 2.0;
        let mut lambda_succ = 0.0f32;
        let mut prev_deviation = f32::NEG_INFINITY;
        let mut trials = Vec::new();

        while trials.len() < self.max_iterations && (lambda_succ - lambda).abs() > self.tolerance
        {
            let candidate = &mu - &(&direction * lambda);
            let accepted = match acceptance {
                Acceptance::AllSelected => {
                    let batch = stack_trial(&candidate, copies, reference)?;
                    let selection = select_best(&batch, copies)?;
                    selection.selected.iter().filter(|&&i| i < copies).count() == copies
                }
                Acceptance::DeviationGrows => {
                    let batch = stack_trial(&candidate, copies, reference)?;
                    let aggregate = trim_columns(&batch, copies)?;
                    let deviation = l2_norm((&aggregate - &mu).view());
                    let grew = deviation > prev_deviation;
                    prev_deviation = deviation;
                    grew
                }
                Acceptance::WithinSpread { bound } => {
                    l2_norm((&candidate - &mu).view()) <= bound * spread
                }
            };

            trials.push(SearchTrial { lambda, accepted });
            if accepted {
                lambda_succ = lambda;
                lambda += step;
            } else {
                lambda -= step;
            }
            step /= 2.0;
        }

        debug!(
            rule = rule.name(),
            ?acceptance,
            copies,
            trials = trials.len(),
            lambda = lambda_succ,
            "Deviation search finished"
        );

        Ok(SearchOutcome {
            update: &mu - &(&direction * lambda_succ),
            lambda: lambda_succ,
            trials,
        })
    }
}

/// `copies` rows of `candidate` followed by the reference rows.
pub(crate) fn stack_trial(
    candidate: &Array1<f32>,
    copies: usize,
    reference: &Array2<f32>,
) -> Result<Array2<f32>, SiegeError> {
    let crafted = candidate
        .view()
        .insert_axis(Axis(0))
        .broadcast((copies, candidate.len()))
        .ok_or(SiegeError::DimensionMismatch {
            expected: reference.ncols(),
            actual: candidate.len(),
        })?
        .to_owned();
    Ok(concatenate(Axis(0), &[crafted.view(), reference.view()])?)
}
