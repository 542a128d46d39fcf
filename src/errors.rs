//! Typed error hierarchy for the journal server.
//!
//! - `StoreError`: entry store failures
//! - `DraftError`: server-hosted editing session failures
//! - `ConfigError`: invalid user settings

use journal_autosave::AutosaveError;
use thiserror::Error;

/// Errors from the entry store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entry {id} not found")]
    EntryNotFound { id: String },

    #[error("Content is required")]
    ContentRequired,

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from draft (editing session) operations.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Draft {id} not found")]
    DraftNotFound { id: String },

    #[error(transparent)]
    Save(#[from] AutosaveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from validating per-user settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Stored settings are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
