//! Byzantine-tolerant aggregation rules for federated learning.
//!
//! Provides the aggregation rules a run can select:
//!
//! | Rule | Form | Byzantine Tolerance |
//! |------|------|---------------------|
//! | [`fedavg`] | delta | None (baseline) |
//! | [`trimmed_mean`] | delta | `k` outliers per coordinate |
//! | [`multi_krum`] | delta | n >= 2f+3 |
//! | [`rank_vote`] | rank | honest majority of votes |
//!
//! Rules only see the submitted batch and the assumed number of corrupted
//! submissions, never which submissions are malicious.

pub mod fedavg;
pub mod krum;
pub mod rank_vote;
pub mod trimmed_mean;

pub use fedavg::fedavg;
pub use krum::{multi_krum, KrumSelection};
pub use rank_vote::rank_vote;
pub use trimmed_mean::trimmed_mean;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::SiegeError;
use crate::model::{GlobalModel, InitialScores};
use crate::update::{UpdateBatch, UpdateForm};
use crate::verification::{AggregationAuditEntry, AuditLog};

/// Aggregation rule selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AggregationRule {
    /// Coordinate-wise mean (FedAvg, no Byzantine tolerance)
    #[default]
    Mean,
    /// Coordinate-wise trimmed mean, trimming `assumed_corrupted` per side
    TrimmedMean,
    /// Multi-Krum with `f = assumed_corrupted`
    MultiKrum,
    /// Positional majority vote over score rankings (FRL)
    RankVote,
}

impl AggregationRule {
    /// Stable name used in logs and audit entries.
    pub fn name(&self) -> &'static str {
        match self {
            AggregationRule::Mean => "mean",
            AggregationRule::TrimmedMean => "trimmed_mean",
            AggregationRule::MultiKrum => "multi_krum",
            AggregationRule::RankVote => "rank_vote",
        }
    }

    /// Update form this rule consumes.
    pub fn form(&self) -> UpdateForm {
        match self {
            AggregationRule::RankVote => UpdateForm::Rank,
            _ => UpdateForm::Delta,
        }
    }

    /// Aggregate one round's batch.
    ///
    /// # Arguments
    ///
    /// * `batch` - Every submission of the round
    /// * `assumed_corrupted` - Declared upper bound on malicious submissions
    pub fn aggregate(
        &self,
        batch: &UpdateBatch,
        assumed_corrupted: usize,
    ) -> Result<Aggregate, SiegeError> {
        match (self, batch) {
            (AggregationRule::RankVote, UpdateBatch::Rank(layers)) => Ok(Aggregate {
                update: AggregateUpdate::Rank(rank_vote(layers)?),
                selected: None,
            }),
            (AggregationRule::RankVote, UpdateBatch::Delta(_))
            | (_, UpdateBatch::Rank(_)) => Err(SiegeError::InvalidConfig(format!(
                "rule '{}' cannot aggregate {:?} updates",
                self.name(),
                batch.form()
            ))),
            (_, UpdateBatch::Delta(rows)) => self.aggregate_deltas(rows, assumed_corrupted),
        }
    }

    /// Aggregate a matrix of delta updates, one row per submission.
    pub fn aggregate_deltas(
        &self,
        rows: &Array2<f32>,
        assumed_corrupted: usize,
    ) -> Result<Aggregate, SiegeError> {
        let (delta, selected) = match self {
            AggregationRule::Mean => (fedavg(rows)?, None),
            AggregationRule::TrimmedMean => (trimmed_mean(rows, assumed_corrupted)?, None),
            AggregationRule::MultiKrum => {
                let selection = multi_krum(rows, assumed_corrupted)?;
                (selection.aggregate, Some(selection.selected))
            }
            AggregationRule::RankVote => {
                return Err(SiegeError::InvalidConfig(
                    "rule 'rank_vote' cannot aggregate delta updates".to_string(),
                ))
            }
        };
        Ok(Aggregate {
            update: AggregateUpdate::Delta(delta),
            selected,
        })
    }
}

/// The single update a rule produces per round.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateUpdate {
    /// Added to the global parameters
    Delta(Array1<f32>),
    /// Consensus ranking per score layer, substituted into the scores
    Rank(Vec<Vec<usize>>),
}

/// Aggregation output plus what the rule selected, for observability.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    /// The aggregate update
    pub update: AggregateUpdate,
    /// Indices Multi-Krum kept, best score first
    pub selected: Option<Vec<usize>>,
}

impl Aggregate {
    /// Apply this aggregate to the global model.
    ///
    /// Delta aggregates are added; rank aggregates rewrite each score layer
    /// from the run's initial sorted scores.
    pub fn apply_to(
        &self,
        model: &mut GlobalModel,
        initial: &InitialScores,
    ) -> Result<(), SiegeError> {
        match &self.update {
            AggregateUpdate::Delta(delta) => model.apply_delta(delta.view()),
            AggregateUpdate::Rank(consensus) => {
                if consensus.len() != initial.len() {
                    return Err(SiegeError::DimensionMismatch {
                        expected: initial.len(),
                        actual: consensus.len(),
                    });
                }
                for (layer, (ranking, sorted)) in
                    consensus.iter().zip(initial.layers()).enumerate()
                {
                    let scores = rank_vote::substitute_scores(ranking, sorted.view())?;
                    model.set_scores(layer, scores.view())?;
                }
                Ok(())
            }
        }
    }
}

/// Aggregation rule with an append-only audit trail.
///
/// # Example
///
/// ```rust
/// use siege_fl::aggregators::{AggregateUpdate, AggregationRule, RobustAggregator};
/// use siege_fl::update::UpdateBatch;
/// use ndarray::array;
///
/// let mut agg = RobustAggregator::new(AggregationRule::TrimmedMean);
///
/// let batch = UpdateBatch::Delta(array![
///     [1.0, 2.0],
///     [1.1, 2.1],
///     [1.0, 1.9],
///     [100.0, 200.0], // Byzantine
/// ]);
///
/// let result = agg.aggregate(0, &batch, 1).unwrap();
/// match result.update {
///     AggregateUpdate::Delta(delta) => assert!((delta[0] - 1.05).abs() < 0.1),
///     AggregateUpdate::Rank(_) => unreachable!(),
/// }
/// assert_eq!(agg.audit().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct RobustAggregator {
    rule: AggregationRule,
    audit: AuditLog,
}

impl RobustAggregator {
    /// Create an aggregator for `rule`.
    pub fn new(rule: AggregationRule) -> Self {
        Self {
            rule,
            audit: AuditLog::new(),
        }
    }

    /// The configured rule.
    pub fn rule(&self) -> AggregationRule {
        self.rule
    }

    /// Aggregate one round's batch and record an audit entry.
    pub fn aggregate(
        &mut self,
        round: usize,
        batch: &UpdateBatch,
        assumed_corrupted: usize,
    ) -> Result<Aggregate, SiegeError> {
        let result = self.rule.aggregate(batch, assumed_corrupted)?;
        self.audit.push(AggregationAuditEntry {
            round,
            rule: self.rule.name().to_string(),
            n_updates: batch.slots(),
            assumed_corrupted,
            selected: result.selected.clone(),
        });
        Ok(result)
    }

    /// Audit trail of every aggregation so far.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn delta(result: &Aggregate) -> &Array1<f32> {
        match &result.update {
            AggregateUpdate::Delta(d) => d,
            AggregateUpdate::Rank(_) => panic!("expected delta aggregate"),
        }
    }

    #[test]
    fn test_rule_forms_and_names() {
        assert_eq!(AggregationRule::Mean.form(), UpdateForm::Delta);
        assert_eq!(AggregationRule::RankVote.form(), UpdateForm::Rank);
        assert_eq!(AggregationRule::MultiKrum.name(), "multi_krum");
    }

    #[test]
    fn test_mean_rule() {
        let batch = UpdateBatch::Delta(array![[1.0], [3.0]]);
        let result = AggregationRule::Mean.aggregate(&batch, 0).unwrap();
        assert!((delta(&result)[0] - 2.0).abs() < 1e-6);
        assert!(result.selected.is_none());
    }

    #[test]
    fn test_multi_krum_rule_reports_selection() {
        let batch = UpdateBatch::Delta(array![[1.0], [1.1], [0.9], [1.0], [100.0]]);
        let result = AggregationRule::MultiKrum.aggregate(&batch, 1).unwrap();
        let selected = result.selected.as_ref().unwrap();
        assert_eq!(selected.len(), 4);
        assert!(!selected.contains(&4));
    }

    #[test]
    fn test_form_mismatch_is_rejected() {
        let delta_batch = UpdateBatch::Delta(array![[1.0]]);
        assert!(AggregationRule::RankVote.aggregate(&delta_batch, 0).is_err());

        let rank_batch = UpdateBatch::Rank(vec![array![[0u32, 1]]]);
        assert!(AggregationRule::TrimmedMean.aggregate(&rank_batch, 0).is_err());
    }

    #[test]
    fn test_rank_rule() {
        let batch = UpdateBatch::Rank(vec![array![[1u32, 0, 2], [1, 0, 2], [2, 1, 0]]]);
        let result = AggregationRule::RankVote.aggregate(&batch, 0).unwrap();
        assert_eq!(result.update, AggregateUpdate::Rank(vec![vec![1, 0, 2]]));
    }

    #[test]
    fn test_audit_trail() {
        let mut agg = RobustAggregator::new(AggregationRule::MultiKrum);
        let batch = UpdateBatch::Delta(array![[1.0], [1.0], [1.0], [1.0]]);
        agg.aggregate(0, &batch, 1).unwrap();
        agg.aggregate(1, &batch, 0).unwrap();

        let entries = agg.audit().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rule, "multi_krum");
        assert_eq!(entries[0].selected.as_ref().map(Vec::len), Some(3));
        assert_eq!(entries[1].assumed_corrupted, 0);
    }
}
