//! The autosave coordinator.
//!
//! One coordinator serves one editing session. The host pushes every content
//! change into it with [`AutosaveCoordinator::set_content`]; the coordinator
//! debounces those changes into calls to a [`SaveHandler`] and drives the
//! [`SaveStatus`] machine the UI renders.
//!
//! ```text
//!            set_content (debounced)         handler Ok
//!   Idle ──────────────┬──────────> Saving ─────────────> Saved ──(2s)──> Idle
//!                      │ force_save   │
//!                      └──────────────┘ handler Err
//!                                     └─────────────────> Error ──(3s)──> Idle
//! ```
//!
//! All timers run as tokio tasks, so a coordinator must be driven from
//! inside a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AutosaveError;
use crate::handler::SaveHandler;
use crate::status::SaveStatus;

/// Debounce interval used when the host does not supply one.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(10_000);

/// How long a successful save keeps the `Saved` badge up.
pub const SAVED_DISPLAY: Duration = Duration::from_millis(2_000);

/// How long a failed save keeps the `Error` badge up.
pub const ERROR_DISPLAY: Duration = Duration::from_millis(3_000);

/// Host-supplied settings. Read-only to the coordinator between
/// [`AutosaveCoordinator::reconfigure`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveOptions {
    pub delay: Duration,
    pub enabled: bool,
}

impl Default for AutosaveOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            enabled: true,
        }
    }
}

impl AutosaveOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Side-channel events for toast-style notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveNotice {
    Saved { bytes: usize },
    Failed { message: String },
}

struct State {
    content: String,
    last_saved: String,
    options: AutosaveOptions,
    pending: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is cancelled or replaced. A timer
    /// only fires if its sequence number is still current.
    timer_seq: u64,
    /// Bumped on every status transition. Delayed resets to `Idle` only
    /// apply if nothing has moved the status since they were scheduled.
    status_epoch: u64,
    alive: bool,
}

impl State {
    fn cancel_pending(&mut self) {
        self.timer_seq += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    fn needs_save(&self) -> bool {
        self.content != self.last_saved
    }
}

struct Inner {
    handler: Arc<dyn SaveHandler>,
    state: Mutex<State>,
    status_tx: watch::Sender<SaveStatus>,
    notice_tx: broadcast::Sender<SaveNotice>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // State is plain data with no cross-field invariant a panic could
        // break halfway, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, state: &mut State, status: SaveStatus) -> u64 {
        state.status_epoch += 1;
        self.status_tx.send_replace(status);
        state.status_epoch
    }

    fn schedule(self: &Arc<Self>, state: &mut State) {
        if !state.options.enabled || state.content.is_empty() || !state.needs_save() {
            return;
        }

        state.timer_seq += 1;
        let seq = state.timer_seq;
        let delay = state.options.delay;
        let inner = Arc::clone(self);
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(content) = inner.take_due(seq) {
                // Debounced failures are reported via status and notices only.
                let _ = inner.run_save(content).await;
            }
        }));
        debug!(?delay, seq, "autosave scheduled");
    }

    /// Claim the content to save when timer `seq` fires. Returns `None` if
    /// the timer was superseded or there is nothing new to save.
    fn take_due(&self, seq: u64) -> Option<String> {
        let mut state = self.lock();
        if !state.alive || state.timer_seq != seq {
            return None;
        }
        // Detach our own handle so later cancellations cannot abort the save.
        state.pending = None;
        state.needs_save().then(|| state.content.clone())
    }

    async fn run_save(self: &Arc<Self>, content: String) -> anyhow::Result<()> {
        {
            let mut state = self.lock();
            if !state.alive {
                return Ok(());
            }
            self.transition(&mut state, SaveStatus::Saving);
        }

        let bytes = content.len();
        debug!(bytes, "autosave dispatching save");
        let result = self.handler.save(content.clone()).await;

        let mut state = self.lock();
        if !state.alive {
            debug!("save completed after dispose; status left untouched");
            return result;
        }

        match &result {
            Ok(()) => {
                state.last_saved = content;
                let epoch = self.transition(&mut state, SaveStatus::Saved);
                self.clear_after(epoch, SAVED_DISPLAY);
                info!(bytes, "autosave completed");
                let _ = self.notice_tx.send(SaveNotice::Saved { bytes });
            }
            Err(e) => {
                let epoch = self.transition(&mut state, SaveStatus::Error);
                self.clear_after(epoch, ERROR_DISPLAY);
                warn!(error = %format!("{:#}", e), "autosave failed");
                let _ = self.notice_tx.send(SaveNotice::Failed {
                    message: format!("{:#}", e),
                });
            }
        }
        result
    }

    fn clear_after(self: &Arc<Self>, epoch: u64, window: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut state = inner.lock();
            if state.alive && state.status_epoch == epoch {
                inner.transition(&mut state, SaveStatus::Idle);
            }
        });
    }
}

/// Cheap, cloneable handle to one editing session's autosave state.
#[derive(Clone)]
pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AutosaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("AutosaveCoordinator")
            .field("status", &*self.inner.status_tx.borrow())
            .field("dirty", &state.needs_save())
            .field("options", &state.options)
            .field("alive", &state.alive)
            .finish()
    }
}

impl AutosaveCoordinator {
    /// Start a session for a brand-new document (empty buffer and snapshot).
    pub fn new(handler: impl SaveHandler, options: AutosaveOptions) -> Self {
        Self::with_snapshot(handler, String::new(), options)
    }

    /// Start a session for a document already persisted as `snapshot`.
    /// Loading it into the buffer does not count as an edit.
    pub fn with_snapshot(
        handler: impl SaveHandler,
        snapshot: impl Into<String>,
        options: AutosaveOptions,
    ) -> Self {
        let snapshot = snapshot.into();
        let (status_tx, _) = watch::channel(SaveStatus::Idle);
        let (notice_tx, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(Inner {
                handler: Arc::new(handler),
                state: Mutex::new(State {
                    content: snapshot.clone(),
                    last_saved: snapshot,
                    options,
                    pending: None,
                    timer_seq: 0,
                    status_epoch: 0,
                    alive: true,
                }),
                status_tx,
                notice_tx,
            }),
        }
    }

    /// Edit notification: replace the buffer and restart the debounce window.
    ///
    /// The pending timer is always cancelled; a new one is scheduled only when
    /// autosave is enabled, the buffer is non-empty and differs from the last
    /// saved snapshot.
    pub fn set_content(&self, content: impl Into<String>) {
        let mut state = self.inner.lock();
        if !state.alive {
            return;
        }
        state.content = content.into();
        state.cancel_pending();
        self.inner.schedule(&mut state);
    }

    /// Apply new host settings and re-evaluate scheduling against the
    /// current buffer.
    pub fn reconfigure(&self, options: AutosaveOptions) {
        let mut state = self.inner.lock();
        if !state.alive {
            return;
        }
        state.options = options;
        state.cancel_pending();
        self.inner.schedule(&mut state);
    }

    /// Save now, bypassing the debounce. No-op when nothing changed since the
    /// last successful save. A rejected save is returned to the caller in
    /// addition to being reported through status and notices.
    pub async fn force_save(&self) -> Result<(), AutosaveError> {
        let content = {
            let mut state = self.inner.lock();
            state.cancel_pending();
            if !state.alive || !state.needs_save() {
                return Ok(());
            }
            state.content.clone()
        };
        self.inner
            .run_save(content)
            .await
            .map_err(AutosaveError::Rejected)
    }

    /// Clear a stale `Saved`/`Error` badge.
    pub fn reset_status(&self) {
        let mut state = self.inner.lock();
        self.inner.transition(&mut state, SaveStatus::Idle);
    }

    /// Tear the session down. The pending timer is cancelled and any save
    /// still in flight completes without touching status.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        if !state.alive {
            return;
        }
        state.alive = false;
        state.cancel_pending();
        debug!("autosave coordinator disposed");
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status_tx.borrow()
    }

    /// Watch channel that yields every status transition.
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<SaveNotice> {
        self.inner.notice_tx.subscribe()
    }

    pub fn content(&self) -> String {
        self.inner.lock().content.clone()
    }

    pub fn last_saved(&self) -> String {
        self.inner.lock().last_saved.clone()
    }

    /// True when the buffer holds changes that no save has persisted yet.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().needs_save()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    pub fn options(&self) -> AutosaveOptions {
        self.inner.lock().options
    }

    pub fn is_disposed(&self) -> bool {
        !self.inner.lock().alive
    }
}
