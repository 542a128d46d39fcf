use thiserror::Error;

/// Errors surfaced to callers of an explicit save.
///
/// Debounced saves never return this; their failures are reported through
/// the status machine and the notice channel only.
#[derive(Debug, Error)]
pub enum AutosaveError {
    #[error("Save rejected: {0}")]
    Rejected(#[source] anyhow::Error),
}
