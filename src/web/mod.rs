//! HTTP surface of the journal.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (Router, TraceLayer, ServerConfig)   │
//! │ (editor) │ <─────── │    └─ api.rs  (handlers, AppState, AuthUser)     │
//! └──────────┘ WebSocket│         │                                        │
//!                       │         │ EntryStore (owner-scoped)              │
//!                       │         v                                        │
//!                       │  store/  (JournalDb via DbHandle)                │
//!                       │         ^                                        │
//!                       │         │ EntrySaveHandler                       │
//!                       │  editor.rs  (drafts → AutosaveCoordinator)       │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! | Module   | Responsibility                                          |
//! |----------|---------------------------------------------------------|
//! | `api`    | Routes, bearer-token extraction, `ApiError` mapping     |
//! | `server` | Router assembly, state wiring, graceful shutdown        |
//! | `ws`     | `WsMessage` enum, per-owner fan-out, keepalive loop     |
//!
//! ## Typical Request Flow (editing a draft)
//!
//! 1. `POST /api/drafts` opens an `EditingSession` with the user's autosave
//!    interval.
//! 2. Each `PUT /api/drafts/{id}` replaces the document and restarts the
//!    debounce window.
//! 3. When the window elapses the coordinator calls `EntrySaveHandler`,
//!    which creates or updates the entry and broadcasts `EntryCreated` /
//!    `EntryUpdated`.
//! 4. Status transitions and save notices reach the owner's sockets as
//!    `DraftStatus`, `DraftSaved` and `SaveFailed`.

pub mod api;
pub mod server;
pub mod ws;
