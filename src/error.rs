//! Error taxonomy for the selection, sizing and optimization engine.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Scoring and sizing degrade to neutral defaults wherever they can, so
/// these only appear for input that cannot be defaulted.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or out-of-range input (negative capital, NaN change, correlation outside [-1, 1]).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A strategy profile violates one of its declared ranges.
    #[error("Invalid profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    /// The catalog is empty, so no selection can be made.
    #[error("No eligible strategy: catalog is empty")]
    NoEligibleStrategy,

    /// No profile with this name exists in the catalog.
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Too few historical observations for a meaningful parameter search.
    #[error("Insufficient optimization data: {available} observations, need at least {required}")]
    InsufficientData { required: usize, available: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_profile(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProfile {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
