use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use super::models::*;
use crate::content;

/// Async-safe handle to the journal database.
///
/// Wraps `JournalDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<JournalDb>>,
}

impl DbHandle {
    pub fn new(db: JournalDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&JournalDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For startup, CLI commands
    /// and tests; never from a request handler.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, JournalDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

const ENTRY_COLUMNS: &str = "id, owner_id, title, content, word_count, reading_time, mood, \
     is_private, is_favorite, is_archived, created_at, updated_at";

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    let mood: Option<String> = row.get(6)?;
    let mood = mood
        .map(|m| Mood::from_str(&m))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, e.into())
        })?;
    Ok(Entry {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        word_count: row.get(4)?,
        reading_time: row.get(5)?,
        mood,
        is_private: row.get(7)?,
        is_favorite: row.get(8)?,
        is_archived: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub fn summarize(entry: &Entry) -> EntrySummary {
    EntrySummary {
        id: entry.id.clone(),
        title: entry.title.clone(),
        preview: content::extract_preview(&entry.content, content::PREVIEW_MAX_CHARS),
        word_count: entry.word_count,
        mood: entry.mood,
        is_private: entry.is_private,
        is_favorite: entry.is_favorite,
        created_at: entry.created_at.clone(),
        updated_at: entry.updated_at.clone(),
    }
}

pub struct JournalDb {
    conn: Connection,
}

impl JournalDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS entries (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    word_count INTEGER NOT NULL DEFAULT 0,
                    reading_time INTEGER NOT NULL DEFAULT 0,
                    mood TEXT,
                    is_private INTEGER NOT NULL DEFAULT 1,
                    is_favorite INTEGER NOT NULL DEFAULT 0,
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS settings (
                    owner_id TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (owner_id, key)
                );

                CREATE INDEX IF NOT EXISTS idx_entries_owner ON entries(owner_id, is_archived);
                CREATE INDEX IF NOT EXISTS idx_entries_listing
                    ON entries(owner_id, is_favorite, updated_at);
                ",
            )
            .context("Failed to create tables")?;

        // Additive migration: searchable text with markup removed.
        match self
            .conn
            .execute("ALTER TABLE entries ADD COLUMN content_text TEXT", [])
        {
            Ok(_) => {}
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(anyhow::anyhow!("Failed to add content_text column: {}", e)),
        }
        self.backfill_content_text()?;
        Ok(())
    }

    fn backfill_content_text(&self) -> Result<()> {
        let pending: Vec<(String, String)> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id, content FROM entries WHERE content_text IS NULL")
                .context("Failed to prepare content_text backfill")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .context("Failed to query entries for backfill")?;
            rows.collect::<rusqlite::Result<_>>()
                .context("Failed to read entry for backfill")?
        };
        for (id, body) in pending {
            self.conn
                .execute(
                    "UPDATE entries SET content_text = ?1 WHERE id = ?2",
                    params![content::plain_text(&body), id],
                )
                .context("Failed to backfill content_text")?;
        }
        Ok(())
    }

    // ── Entry CRUD ────────────────────────────────────────────────────

    pub fn create_entry(&self, owner_id: &str, new: &NewEntry) -> Result<Entry> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let title = match new.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => content::extract_title(&new.content),
        };
        let word_count = content::word_count(&new.content);
        self.conn
            .execute(
                "INSERT INTO entries (id, owner_id, title, content, content_text, word_count,
                                      reading_time, mood, is_private, is_favorite, is_archived,
                                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10, ?10)",
                params![
                    id,
                    owner_id,
                    title,
                    new.content,
                    content::plain_text(&new.content),
                    word_count,
                    content::reading_time(word_count),
                    new.mood.map(|m| m.as_str()),
                    new.is_private.unwrap_or(true),
                    now,
                ],
            )
            .context("Failed to insert entry")?;
        self.get_entry(owner_id, &id)?
            .context("Entry not found after insert")
    }

    /// Fetch one entry, archived or not. Entries of other owners are invisible.
    pub fn get_entry(&self, owner_id: &str, id: &str) -> Result<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM entries WHERE id = ?1 AND owner_id = ?2",
                ENTRY_COLUMNS
            ))
            .context("Failed to prepare get_entry")?;
        let mut rows = stmt
            .query_map(params![id, owner_id], row_to_entry)
            .context("Failed to query entry")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read entry row")?)),
            None => Ok(None),
        }
    }

    /// One page of live entries: favorites first, then most recently updated.
    pub fn list_entries(&self, owner_id: &str, query: &ListQuery) -> Result<EntryPage> {
        let mut sql = format!(
            "SELECT {} FROM entries WHERE owner_id = ? AND is_archived = 0",
            ENTRY_COLUMNS
        );
        let mut args: Vec<Value> = vec![Value::Text(owner_id.to_string())];

        if let Some(cursor_id) = query.cursor.as_deref() {
            let Some(cursor) = self.get_entry(owner_id, cursor_id)? else {
                return Ok(EntryPage {
                    entries: Vec::new(),
                    next_cursor: None,
                    has_more: false,
                });
            };
            sql.push_str(
                " AND (is_favorite < ? OR (is_favorite = ? AND \
                 (updated_at < ? OR (updated_at = ? AND id < ?))))",
            );
            let fav = Value::Integer(cursor.is_favorite as i64);
            args.push(fav.clone());
            args.push(fav);
            args.push(Value::Text(cursor.updated_at.clone()));
            args.push(Value::Text(cursor.updated_at));
            args.push(Value::Text(cursor.id));
        }

        if let Some(term) = query.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR content_text LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(term);
            args.push(Value::Text(pattern.clone()));
            args.push(Value::Text(pattern));
        }

        let page_size = query.page_size();
        sql.push_str(" ORDER BY is_favorite DESC, updated_at DESC, id DESC LIMIT ?");
        // One extra row tells us whether another page exists.
        args.push(Value::Integer(page_size as i64 + 1));

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_entries")?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_entry)
            .context("Failed to query entries")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read entry row")?);
        }

        let has_more = entries.len() > page_size as usize;
        entries.truncate(page_size as usize);
        let next_cursor = if has_more {
            entries.last().map(|e| e.id.clone())
        } else {
            None
        };
        Ok(EntryPage {
            entries: entries.iter().map(summarize).collect(),
            next_cursor,
            has_more,
        })
    }

    /// Every entry of an owner, oldest first. Used by export and the dashboard.
    pub fn all_entries(&self, owner_id: &str, include_archived: bool) -> Result<Vec<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM entries WHERE owner_id = ?1 AND (?2 OR is_archived = 0)
                 ORDER BY created_at, id",
                ENTRY_COLUMNS
            ))
            .context("Failed to prepare all_entries")?;
        let rows = stmt
            .query_map(params![owner_id, include_archived], row_to_entry)
            .context("Failed to query entries")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read entry row")?);
        }
        Ok(entries)
    }

    /// Apply a partial update. Returns `None` when the entry does not exist
    /// for this owner.
    pub fn update_entry(&self, owner_id: &str, id: &str, patch: &EntryPatch) -> Result<Option<Entry>> {
        let Some(mut entry) = self.get_entry(owner_id, id)? else {
            return Ok(None);
        };

        if let Some(title) = &patch.title {
            entry.title = title.clone();
        }
        if let Some(body) = &patch.content {
            entry.content = body.clone();
            entry.word_count = content::word_count(body);
            entry.reading_time = content::reading_time(entry.word_count);
        }
        if let Some(mood) = patch.mood {
            entry.mood = Some(mood);
        }
        if let Some(is_private) = patch.is_private {
            entry.is_private = is_private;
        }
        if let Some(is_favorite) = patch.is_favorite {
            entry.is_favorite = is_favorite;
        }

        self.conn
            .execute(
                "UPDATE entries
                 SET title = ?1, content = ?2, content_text = ?3, word_count = ?4,
                     reading_time = ?5, mood = ?6, is_private = ?7, is_favorite = ?8,
                     updated_at = ?9
                 WHERE id = ?10 AND owner_id = ?11",
                params![
                    entry.title,
                    entry.content,
                    content::plain_text(&entry.content),
                    entry.word_count,
                    entry.reading_time,
                    entry.mood.map(|m| m.as_str()),
                    entry.is_private,
                    entry.is_favorite,
                    now_timestamp(),
                    id,
                    owner_id,
                ],
            )
            .context("Failed to update entry")?;
        self.get_entry(owner_id, id)
    }

    /// Soft delete. Returns false when the entry does not exist for this owner.
    pub fn archive_entry(&self, owner_id: &str, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE entries SET is_archived = 1, updated_at = ?1 WHERE id = ?2 AND owner_id = ?3",
                params![now_timestamp(), id, owner_id],
            )
            .context("Failed to archive entry")?;
        Ok(changed > 0)
    }

    // ── Settings ──────────────────────────────────────────────────────

    pub fn get_setting(&self, owner_id: &str, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE owner_id = ?1 AND key = ?2")
            .context("Failed to prepare get_setting")?;
        let mut rows = stmt
            .query_map(params![owner_id, key], |row| row.get::<_, String>(0))
            .context("Failed to query setting")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read setting")?)),
            None => Ok(None),
        }
    }

    pub fn set_setting(&self, owner_id: &str, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (owner_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(owner_id, key) DO UPDATE SET value = excluded.value,
                                                          updated_at = excluded.updated_at",
                params![owner_id, key, value, now_timestamp()],
            )
            .context("Failed to upsert setting")?;
        Ok(())
    }
}
