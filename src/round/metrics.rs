//! Append-only per-round metrics.

use serde::{Deserialize, Serialize};

use crate::services::Evaluation;

/// One evaluated round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round number (0-indexed)
    pub round: usize,
    /// Malicious participants selected in the round
    pub malicious_in_round: usize,
    /// Test loss after aggregation
    pub test_loss: f32,
    /// Test accuracy after aggregation
    pub test_accuracy: f32,
    /// Best test accuracy up to and including this round
    pub best_accuracy: f32,
}

/// Records of every evaluated round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    records: Vec<RoundRecord>,
    best_accuracy: f32,
}

impl RunMetrics {
    /// Empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for `round` and return it.
    ///
    /// The best-accuracy watermark only moves up; a NaN accuracy leaves it
    /// unchanged.
    pub fn record(
        &mut self,
        round: usize,
        malicious_in_round: usize,
        evaluation: Evaluation,
    ) -> RoundRecord {
        if evaluation.accuracy > self.best_accuracy {
            self.best_accuracy = evaluation.accuracy;
        }
        let record = RoundRecord {
            round,
            malicious_in_round,
            test_loss: evaluation.loss,
            test_accuracy: evaluation.accuracy,
            best_accuracy: self.best_accuracy,
        };
        self.records.push(record);
        record
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&RoundRecord> {
        self.records.last()
    }

    /// Best accuracy so far.
    pub fn best_accuracy(&self) -> f32 {
        self.best_accuracy
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the records to JSON. Non-finite losses become `null`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records)
    }
}
