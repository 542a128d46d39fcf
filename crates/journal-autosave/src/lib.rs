//! Autosave coordination for a single journal editing session.
//!
//! [`AutosaveCoordinator`] owns the content buffer, the last-saved snapshot,
//! one debounced save timer and the [`SaveStatus`] machine. Persistence is
//! delegated to a [`SaveHandler`].

pub mod coordinator;
pub mod error;
pub mod handler;
pub mod status;

pub use coordinator::{
    AutosaveCoordinator, AutosaveOptions, DEFAULT_DELAY, ERROR_DISPLAY, SAVED_DISPLAY, SaveNotice,
};
pub use error::AutosaveError;
pub use handler::SaveHandler;
pub use status::SaveStatus;
