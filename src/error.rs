//! Error taxonomy for the arena core.
//!
//! Every failure surfaces to the caller as exactly one `ArenaError` variant.
//! Clients branch on [`ErrorKind`], which is stable across releases, and on
//! [`ArenaError::is_retryable`] to tell "try again" apart from "this request
//! is invalid".

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ArenaResult<T> = Result<T, ArenaError>;

#[derive(Debug, Clone, Error)]
pub enum ArenaError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("Persona already listed: {persona_id}")]
    AlreadyListed { persona_id: String },

    #[error("AI backend unavailable: {0}")]
    AiUnavailable(String),

    #[error("AI backend returned an invalid response: {0}")]
    AiInvalidResponse(String),

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    /// Exchange-rate source failure. The price cache absorbs it.
    #[error("Price feed unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Stable, serialisable discriminant of an [`ArenaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Forbidden,
    InsufficientBalance,
    AlreadyListed,
    AiUnavailable,
    AiInvalidResponse,
    SettlementFailed,
    PriceUnavailable,
    ConfigurationError,
    InvalidInput,
    StorageError,
}

impl ArenaError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArenaError::NotFound { .. } => ErrorKind::NotFound,
            ArenaError::InvalidState(_) => ErrorKind::InvalidState,
            ArenaError::Forbidden(_) => ErrorKind::Forbidden,
            ArenaError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            ArenaError::AlreadyListed { .. } => ErrorKind::AlreadyListed,
            ArenaError::AiUnavailable(_) => ErrorKind::AiUnavailable,
            ArenaError::AiInvalidResponse(_) => ErrorKind::AiInvalidResponse,
            ArenaError::SettlementFailed(_) => ErrorKind::SettlementFailed,
            ArenaError::PriceUnavailable(_) => ErrorKind::PriceUnavailable,
            ArenaError::Configuration(_) => ErrorKind::ConfigurationError,
            ArenaError::InvalidInput(_) => ErrorKind::InvalidInput,
            ArenaError::Storage(_) => ErrorKind::StorageError,
        }
    }

    /// True for failures of an external collaborator. The entity is left in
    /// its prior state, so the same request may simply be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArenaError::AiUnavailable(_)
                | ArenaError::AiInvalidResponse(_)
                | ArenaError::SettlementFailed(_)
                | ArenaError::PriceUnavailable(_)
                | ArenaError::Storage(_)
        )
    }
}

impl From<serde_json::Error> for ArenaError {
    fn from(err: serde_json::Error) -> Self {
        ArenaError::Storage(err.to_string())
    }
}
