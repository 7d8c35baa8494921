use thiserror::Error;

use crate::safety::ControlState;

/// Errors surfaced by the learning engine.
///
/// Insufficient replay data is deliberately *not* an error at the engine
/// boundary: `learn` absorbs it into a no-op outcome. It only appears here
/// because the replay store's `sample_indices` reports it to its caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("input has {actual} features but the network expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("requested a batch of {needed} but only {available} transitions are stored")]
    InsufficientData { needed: usize, available: usize },

    #[error("model persistence failed: {0}")]
    Persistence(String),

    #[error("operation blocked by safety controller in state {0}")]
    SafetyBlocked(ControlState),
}
