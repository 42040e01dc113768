//! Error types for sqbridge core.

use thiserror::Error;

use crate::channel::PreampBus;
use crate::transport::TransportError;

/// Core error type for sqbridge operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("channel {channel_id}: {field} {reason}")]
    Validation { channel_id: i64, field: &'static str, reason: String },

    #[error("{bus} preamp {id} out of range")]
    InvalidPreamp { bus: PreampBus, id: i64 },

    #[error("Invalid gain value: {0} (must be 0-60 dB)")]
    InvalidGain(f64),

    #[error("console address not set")]
    ConsoleNotConfigured,

    #[error("sync already in progress")]
    SyncInProgress,

    #[error("Show not found: {0}")]
    ShowNotFound(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn validation(
        channel_id: i64,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation { channel_id, field, reason: reason.into() }
    }
}

/// Result type alias for sqbridge core operations.
pub type Result<T> = std::result::Result<T, Error>;
