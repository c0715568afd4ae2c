//! Error types for Siege-FL

use thiserror::Error;

use crate::services::TrainerError;

/// All possible errors in Siege-FL
#[derive(Error, Debug)]
pub enum SiegeError {
    /// No updates were provided for aggregation
    #[error("Empty updates provided")]
    EmptyUpdates,

    /// Updates have inconsistent dimensions
    #[error("Dimension mismatch in updates: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Width the batch or model expects
        expected: usize,
        /// Width actually supplied
        actual: usize,
    },

    /// Two models were built from different parameter schemas
    #[error("Parameter schema mismatch (fingerprint {expected:#018x} vs {actual:#018x})")]
    SchemaMismatch {
        /// Fingerprint of the reference schema
        expected: u64,
        /// Fingerprint of the offending schema
        actual: u64,
    },

    /// A tensor name is not part of the schema
    #[error("Unknown tensor: {0}")]
    UnknownTensor(String),

    /// A batch slot index is past the arena capacity
    #[error("Slot {slot} out of range for batch of {capacity}")]
    SlotOutOfRange {
        /// Requested slot
        slot: usize,
        /// Number of slots in the batch
        capacity: usize,
    },

    /// Run configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The attack produces a different update form than the rule consumes
    #[error("Update form mismatch: rule '{rule}' cannot accept updates from attack '{attack}'")]
    FormMismatch {
        /// Aggregation rule name
        rule: &'static str,
        /// Attack strategy name
        attack: &'static str,
    },

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No honest-majority draw was found
    #[error("No honest-majority selection after {attempts} draws (round size {round_size}, {malicious} malicious in pool)")]
    ResampleExhausted {
        /// Draws attempted
        attempts: usize,
        /// Participants per round
        round_size: usize,
        /// Malicious participants in the pool
        malicious: usize,
    },

    /// Local training failed for a participant
    #[error("Local training failed for participant {participant}: {source}")]
    Trainer {
        /// Participant whose training failed
        participant: usize,
        /// Underlying trainer failure
        #[source]
        source: TrainerError,
    },

    /// Evaluation of the global model failed
    #[error("Evaluation failed: {0}")]
    Evaluator(String),

    /// The worker pool could not be created
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Array shape mismatch
    #[error("Array shape error: {0}")]
    ShapeError(String),
}

impl From<ndarray::ShapeError> for SiegeError {
    fn from(e: ndarray::ShapeError) -> Self {
        SiegeError::ShapeError(e.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for SiegeError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        SiegeError::WorkerPool(e.to_string())
    }
}
