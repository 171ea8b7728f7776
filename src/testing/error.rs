use rand::distributions::WeightedError;
use std::time::Duration;
use thiserror::Error;

/// Why the event monitor rejected a run. Both variants are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Replaying the agreed order against the oracle produced a different
    /// answer than the concurrent structure gave.
    #[error(
        "validation failed after {processed} events: `{event}` is invalid, since the oracle returned {expected} (oracle state: {oracle_state})"
    )]
    Divergence {
        processed: usize,
        event: String,
        expected: String,
        oracle_state: String,
    },

    /// A reserved event was never completed, which points at a broken
    /// synchronization protocol in the structure under test.
    #[error("validation failed after {processed} events: `{event}` was never marked as completed within {waited:?}")]
    IncompleteEvent {
        processed: usize,
        event: String,
        waited: Duration,
    },
}

impl ValidationError {
    /// Number of events that replayed correctly before the failure.
    pub fn processed(&self) -> usize {
        match self {
            ValidationError::Divergence { processed, .. } => *processed,
            ValidationError::IncompleteEvent { processed, .. } => *processed,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("operator weights must be non-empty with a positive total")]
    InvalidWeights(#[from] WeightedError),

    #[error("argument modulo must be positive, got {0}")]
    InvalidModulo(i64),
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to build the worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("the monitor thread panicked")]
    MonitorPanicked,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
