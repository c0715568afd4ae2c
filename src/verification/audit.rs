//! Per-round aggregation trail.
//!
//! The rule sees only the batch and the corruption bound; this log keeps
//! exactly that, plus what a selecting rule kept, so a run can be replayed
//! and the defence's choices inspected after the fact.

use serde::{Deserialize, Serialize};

/// What one aggregation was given and what it kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationAuditEntry {
    /// Round the aggregation belongs to
    pub round: usize,
    /// Rule name, see [`crate::aggregators::AggregationRule::name`]
    pub rule: String,
    /// Submissions in the batch
    pub n_updates: usize,
    /// Corruption bound handed to the rule
    pub assumed_corrupted: usize,
    /// Batch slots a selecting rule kept, best first
    pub selected: Option<Vec<usize>>,
}

impl AggregationAuditEntry {
    /// Whether batch slot `slot` contributed to the aggregate.
    ///
    /// Non-selecting rules use every slot.
    pub fn kept(&self, slot: usize) -> bool {
        match &self.selected {
            Some(selected) => selected.contains(&slot),
            None => slot < self.n_updates,
        }
    }
}

/// Round-ordered aggregation trail.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog(Vec<AggregationAuditEntry>);

impl AuditLog {
    /// Start an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one aggregation.
    pub fn push(&mut self, entry: AggregationAuditEntry) {
        self.0.push(entry);
    }

    /// Every recorded aggregation, oldest first.
    pub fn entries(&self) -> &[AggregationAuditEntry] {
        &self.0
    }

    /// Entry for `round`, if it was aggregated.
    pub fn round(&self, round: usize) -> Option<&AggregationAuditEntry> {
        self.0.iter().find(|e| e.round == round)
    }

    /// Number of aggregations recorded.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True before the first aggregation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty JSON array of every entry.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.0)
    }
}
