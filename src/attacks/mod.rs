//! Adversarial update crafting.
//!
//! Each strategy is paired with the rule it is designed to defeat:
//!
//! | Strategy | Form | Target |
//! |----------|------|--------|
//! | [`AttackStrategy::Scale`] | delta | Mean |
//! | [`AttackStrategy::DeviationSearch`] | delta | Trimmed-Mean, Multi-Krum |
//! | [`AttackStrategy::RankPermutation`] | rank | Rank-Vote |
//!
//! An attack is crafted once per round from an [`AttackContext`] and the
//! result is submitted by every malicious participant of that round. Nothing
//! is carried between rounds.

pub mod deviation;
pub mod rank;
pub mod scale;

pub use deviation::{Acceptance, DeviationKind, DeviationSearch, SearchOutcome, SearchTrial};
pub use rank::RankTransform;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::aggregators::rank_vote::add_positional_votes;
use crate::aggregators::AggregationRule;
use crate::error::SiegeError;
use crate::model::GlobalModel;
use crate::update::{Update, UpdateForm};

fn default_scale_factor() -> f32 {
    scale::DEFAULT_SCALE_FACTOR
}

/// Attack run by the malicious participants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttackStrategy {
    /// Malicious participants train honestly (benign baseline)
    #[default]
    None,
    /// Submit the global parameters times `factor`
    Scale {
        /// Multiplier, `100_000` by default
        #[serde(default = "default_scale_factor")]
        factor: f32,
    },
    /// Largest deviation the target rule still accepts
    DeviationSearch(DeviationSearch),
    /// Rearranged malicious consensus ranking
    RankPermutation {
        /// Rearrangement applied to the consensus
        transform: RankTransform,
    },
}

impl AttackStrategy {
    /// Stable name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            AttackStrategy::None => "none",
            AttackStrategy::Scale { .. } => "scale",
            AttackStrategy::DeviationSearch(_) => "deviation_search",
            AttackStrategy::RankPermutation { .. } => "rank_permutation",
        }
    }

    /// Update form the attack produces; `None` for the benign baseline,
    /// which follows the rule.
    pub fn form(&self) -> Option<UpdateForm> {
        match self {
            AttackStrategy::None => None,
            AttackStrategy::Scale { .. } | AttackStrategy::DeviationSearch(_) => {
                Some(UpdateForm::Delta)
            }
            AttackStrategy::RankPermutation { .. } => Some(UpdateForm::Rank),
        }
    }

    /// Whether the attack crafts anything.
    pub fn is_active(&self) -> bool {
        !matches!(self, AttackStrategy::None)
    }

    /// Whether crafting needs benign reference updates.
    pub fn needs_reference(&self) -> bool {
        matches!(
            self,
            AttackStrategy::DeviationSearch(_) | AttackStrategy::RankPermutation { .. }
        )
    }

    /// Craft the malicious update for one round.
    pub fn craft(&self, ctx: &AttackContext<'_>) -> Result<Update, SiegeError> {
        match (self, ctx.reference) {
            (AttackStrategy::None, _) => Err(SiegeError::InvalidConfig(
                "the benign strategy crafts no update".to_string(),
            )),
            (AttackStrategy::Scale { factor }, _) => {
                Ok(Update::Delta(scale::craft(ctx.global, *factor)))
            }
            (AttackStrategy::DeviationSearch(search), AttackReference::Deltas(reference)) => {
                let outcome = search.search(reference, ctx.malicious_in_round, ctx.rule)?;
                Ok(Update::Delta(outcome.update))
            }
            (AttackStrategy::RankPermutation { transform }, AttackReference::RankSignal(signal)) => {
                Ok(Update::Rank(rank::craft(signal, *transform)))
            }
            (strategy, reference) => Err(SiegeError::InvalidConfig(format!(
                "attack '{}' cannot use a {} reference",
                strategy.name(),
                reference.kind()
            ))),
        }
    }
}

/// Benign information the malicious side gathered this round.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AttackReference {
    /// No reference was gathered
    #[default]
    None,
    /// Reference delta updates, one per row
    Deltas(Array2<f32>),
    /// Summed positional votes per score layer
    RankSignal(Vec<Vec<u64>>),
}

impl AttackReference {
    /// Summarize the crafting participants' honest updates.
    ///
    /// Delta updates are stacked row-wise; rank updates are folded into one
    /// vote vector per layer.
    pub fn from_updates(updates: &[Update]) -> Result<Self, SiegeError> {
        let Some(first) = updates.first() else {
            return Ok(AttackReference::None);
        };
        match first {
            Update::Delta(d) => {
                let mut rows = Array2::zeros((updates.len(), d.len()));
                for (mut row, update) in rows.rows_mut().into_iter().zip(updates) {
                    match update {
                        Update::Delta(delta) if delta.len() == row.len() => row.assign(delta),
                        Update::Delta(delta) => {
                            return Err(SiegeError::DimensionMismatch {
                                expected: row.len(),
                                actual: delta.len(),
                            })
                        }
                        Update::Rank(_) => return Err(mixed_forms()),
                    }
                }
                Ok(AttackReference::Deltas(rows))
            }
            Update::Rank(r) => {
                let mut signal: Vec<Vec<u64>> =
                    r.layers().iter().map(|l| vec![0u64; l.len()]).collect();
                for update in updates {
                    let Update::Rank(rank) = update else {
                        return Err(mixed_forms());
                    };
                    if rank.layers().len() != signal.len() {
                        return Err(SiegeError::DimensionMismatch {
                            expected: signal.len(),
                            actual: rank.layers().len(),
                        });
                    }
                    for (votes, ranking) in signal.iter_mut().zip(rank.layers()) {
                        add_positional_votes(ranking, votes)?;
                    }
                }
                Ok(AttackReference::RankSignal(signal))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AttackReference::None => "missing",
            AttackReference::Deltas(_) => "delta",
            AttackReference::RankSignal(_) => "rank",
        }
    }
}

fn mixed_forms() -> SiegeError {
    SiegeError::InvalidConfig("reference updates mix delta and rank forms".to_string())
}

/// Everything an attack may look at when crafting.
#[derive(Clone, Copy, Debug)]
pub struct AttackContext<'a> {
    /// Global model at the start of the round
    pub global: &'a GlobalModel,
    /// Malicious participants selected this round
    pub malicious_in_round: usize,
    /// Rule the batch will be aggregated with
    pub rule: AggregationRule,
    /// Round-scoped benign reference
    pub reference: &'a AttackReference,
}
