//! Server-hosted editing sessions ("drafts").
//!
//! Each draft owns one `AutosaveCoordinator` whose save handler writes to
//! the entry store: the first successful save of a new draft creates the
//! entry, later saves overwrite its content. Status changes and save
//! notices are forwarded to the owner's WebSocket stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use journal_autosave::{AutosaveCoordinator, AutosaveOptions, SaveHandler, SaveNotice, SaveStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::errors::DraftError;
use crate::settings::UserSettings;
use crate::store::{EntryPatch, EntryStore, NewEntry, summarize};
use crate::web::ws::{WsEvent, WsMessage, broadcast_message};

/// Drafts untouched for this long are flushed and closed.
pub const DRAFT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How often the registry looks for idle drafts.
pub const DRAFT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn autosave_options(settings: &UserSettings) -> AutosaveOptions {
    AutosaveOptions::default()
        .with_delay(settings.autosave_delay())
        .with_enabled(settings.autosave_enabled)
}

/// Persists a draft's document into the entry store.
pub struct EntrySaveHandler {
    store: Arc<dyn EntryStore>,
    owner_id: String,
    entry_id: Arc<Mutex<Option<String>>>,
    // Held across the store call so two overlapping first saves cannot
    // both create an entry.
    write_lock: tokio::sync::Mutex<()>,
    ws_tx: broadcast::Sender<WsEvent>,
}

impl EntrySaveHandler {
    pub fn new(
        store: Arc<dyn EntryStore>,
        owner_id: impl Into<String>,
        entry_id: Arc<Mutex<Option<String>>>,
        ws_tx: broadcast::Sender<WsEvent>,
    ) -> Self {
        Self {
            store,
            owner_id: owner_id.into(),
            entry_id,
            write_lock: tokio::sync::Mutex::new(()),
            ws_tx,
        }
    }

    fn current_entry_id(&self) -> Option<String> {
        self.entry_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SaveHandler for EntrySaveHandler {
    async fn save(&self, content: String) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        match self.current_entry_id() {
            Some(id) => {
                let entry = self
                    .store
                    .update(&self.owner_id, &id, EntryPatch::content(content))
                    .await?;
                debug!(entry_id = %entry.id, words = entry.word_count, "Draft saved to entry");
                broadcast_message(
                    &self.ws_tx,
                    &self.owner_id,
                    &WsMessage::EntryUpdated {
                        entry: summarize(&entry),
                    },
                );
            }
            None => {
                let entry = self
                    .store
                    .create(&self.owner_id, NewEntry::with_content(content))
                    .await?;
                info!(entry_id = %entry.id, "Draft created entry");
                *self.entry_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(entry.id.clone());
                broadcast_message(
                    &self.ws_tx,
                    &self.owner_id,
                    &WsMessage::EntryCreated {
                        entry: summarize(&entry),
                    },
                );
            }
        }
        Ok(())
    }
}

/// Snapshot of a draft returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct DraftView {
    pub id: String,
    pub entry_id: Option<String>,
    pub content: String,
    pub status: SaveStatus,
    pub status_label: &'static str,
    pub dirty: bool,
    pub save_pending: bool,
    pub autosave_enabled: bool,
    pub delay_secs: u64,
}

pub struct EditingSession {
    pub id: String,
    pub owner_id: String,
    coordinator: AutosaveCoordinator,
    entry_id: Arc<Mutex<Option<String>>>,
    forwarder: JoinHandle<()>,
    last_active: Mutex<Instant>,
}

impl EditingSession {
    /// Open a session. With an existing entry, its content becomes the
    /// last-saved snapshot so opening alone never triggers a save.
    pub fn open(
        store: Arc<dyn EntryStore>,
        owner_id: &str,
        existing: Option<(String, String)>,
        options: AutosaveOptions,
        ws_tx: broadcast::Sender<WsEvent>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let (entry_id, snapshot) = match existing {
            Some((entry_id, content)) => (Some(entry_id), content),
            None => (None, String::new()),
        };
        let entry_id = Arc::new(Mutex::new(entry_id));
        let handler = EntrySaveHandler::new(store, owner_id, entry_id.clone(), ws_tx.clone());
        let coordinator = AutosaveCoordinator::with_snapshot(handler, snapshot, options);
        let forwarder = spawn_forwarder(&coordinator, id.clone(), owner_id.to_string(), ws_tx);

        Self {
            id,
            owner_id: owner_id.to_string(),
            coordinator,
            entry_id,
            forwarder,
            last_active: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    /// Time since the client last read or edited this draft.
    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.coordinator.is_disposed()
    }

    pub fn entry_id(&self) -> Option<String> {
        self.entry_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The document currently held by the editing surface.
    pub fn document(&self) -> String {
        self.coordinator.content()
    }

    /// Editor change notification: replace the document and debounce a save.
    pub fn apply_change(&self, content: impl Into<String>) {
        self.touch();
        self.coordinator.set_content(content);
    }

    pub async fn force_save(&self) -> Result<(), DraftError> {
        self.touch();
        self.coordinator.force_save().await?;
        Ok(())
    }

    pub fn reset_status(&self) {
        self.touch();
        self.coordinator.reset_status();
    }

    pub fn reconfigure(&self, options: AutosaveOptions) {
        self.coordinator.reconfigure(options);
    }

    pub fn status(&self) -> SaveStatus {
        self.coordinator.status()
    }

    pub fn view(&self) -> DraftView {
        self.touch();
        let options = self.coordinator.options();
        let status = self.coordinator.status();
        DraftView {
            id: self.id.clone(),
            entry_id: self.entry_id(),
            content: self.document(),
            status,
            status_label: status.label(),
            dirty: self.coordinator.is_dirty(),
            save_pending: self.coordinator.has_pending_timer(),
            autosave_enabled: options.enabled,
            delay_secs: options.delay.as_secs(),
        }
    }

    /// Flush unsaved changes, then tear down. The session is disposed even
    /// when the final save fails.
    pub async fn close(&self) -> Result<(), DraftError> {
        let flushed = self.coordinator.force_save().await;
        self.dispose();
        flushed.map_err(DraftError::from)
    }

    pub fn dispose(&self) {
        self.coordinator.dispose();
        self.forwarder.abort();
    }
}

impl Drop for EditingSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn spawn_forwarder(
    coordinator: &AutosaveCoordinator,
    draft_id: String,
    owner_id: String,
    ws_tx: broadcast::Sender<WsEvent>,
) -> JoinHandle<()> {
    let mut status_rx = coordinator.subscribe();
    let mut notice_rx = coordinator.notices();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    broadcast_message(&ws_tx, &owner_id, &WsMessage::DraftStatus {
                        draft_id: draft_id.clone(),
                        status,
                        label: status.label().to_string(),
                    });
                }
                notice = notice_rx.recv() => {
                    let msg = match notice {
                        Ok(SaveNotice::Saved { bytes }) => WsMessage::DraftSaved {
                            draft_id: draft_id.clone(),
                            bytes,
                        },
                        Ok(SaveNotice::Failed { message }) => WsMessage::SaveFailed {
                            draft_id: draft_id.clone(),
                            message,
                        },
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    broadcast_message(&ws_tx, &owner_id, &msg);
                }
            }
        }
    })
}

/// Open drafts, keyed by draft id. Clones share the same map.
#[derive(Clone, Default)]
pub struct DraftRegistry {
    sessions: Arc<Mutex<HashMap<String, Arc<EditingSession>>>>,
}

impl DraftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<EditingSession>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, session: EditingSession) -> Arc<EditingSession> {
        let session = Arc::new(session);
        self.lock().insert(session.id.clone(), session.clone());
        session
    }

    /// Drafts of other owners are reported as missing.
    pub fn get(&self, owner_id: &str, id: &str) -> Result<Arc<EditingSession>, DraftError> {
        self.lock()
            .get(id)
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| DraftError::DraftNotFound { id: id.to_string() })
    }

    pub fn remove(&self, owner_id: &str, id: &str) -> Result<Arc<EditingSession>, DraftError> {
        let mut sessions = self.lock();
        match sessions.get(id) {
            Some(s) if s.owner_id == owner_id => {}
            _ => return Err(DraftError::DraftNotFound { id: id.to_string() }),
        }
        sessions
            .remove(id)
            .ok_or_else(|| DraftError::DraftNotFound { id: id.to_string() })
    }

    pub fn for_owner(&self, owner_id: &str) -> Vec<Arc<EditingSession>> {
        self.lock()
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove drafts idle for at least `max_idle`, flush them and dispose
    /// them. Returns how many were evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<_> = {
            let mut sessions = self.lock();
            let ids: Vec<String> = sessions
                .values()
                .filter(|s| s.idle_for() >= max_idle)
                .map(|s| s.id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for session in &expired {
            info!(draft_id = %session.id, user_id = %session.owner_id, "Closing idle draft");
            if let Err(e) = session.close().await {
                warn!(draft_id = %session.id, "Failed to flush idle draft: {}", e);
            }
        }
        expired.len()
    }

    /// Periodically evict drafts whose client went away without closing them.
    pub fn spawn_sweeper(&self, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    debug!(evicted, remaining = registry.len(), "Idle draft sweep");
                }
            }
        })
    }

    /// Flush and dispose every open draft.
    pub async fn close_all(&self) {
        let sessions: Vec<_> = self.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            if let Err(e) = session.close().await {
                warn!(draft_id = %session.id, "Failed to flush draft on shutdown: {}", e);
            }
        }
    }
}
