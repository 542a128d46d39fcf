//! Entry persistence.
//!
//! `JournalDb` owns the SQLite connection; `DbHandle` moves access onto the
//! blocking pool. `EntryStore` is the owner-scoped async surface the HTTP API
//! and editing sessions use.

pub mod db;
pub mod models;

use async_trait::async_trait;

pub use db::{DbHandle, JournalDb, summarize};
pub use models::*;

use crate::errors::StoreError;

#[async_trait]
pub trait EntryStore: Send + Sync + 'static {
    async fn list(&self, owner_id: &str, query: ListQuery) -> Result<EntryPage, StoreError>;
    async fn get(&self, owner_id: &str, id: &str) -> Result<Entry, StoreError>;
    async fn create(&self, owner_id: &str, new: NewEntry) -> Result<Entry, StoreError>;
    async fn update(&self, owner_id: &str, id: &str, patch: EntryPatch)
    -> Result<Entry, StoreError>;
    async fn archive(&self, owner_id: &str, id: &str) -> Result<(), StoreError>;
    async fn all(&self, owner_id: &str, include_archived: bool) -> Result<Vec<Entry>, StoreError>;
}

fn require_content(body: &str) -> Result<(), StoreError> {
    if crate::content::plain_text(body).is_empty() {
        return Err(StoreError::ContentRequired);
    }
    Ok(())
}

#[async_trait]
impl EntryStore for DbHandle {
    async fn list(&self, owner_id: &str, query: ListQuery) -> Result<EntryPage, StoreError> {
        let owner = owner_id.to_string();
        self.call(move |db| db.list_entries(&owner, &query))
            .await
            .map_err(StoreError::Database)
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Entry, StoreError> {
        let (owner, entry_id) = (owner_id.to_string(), id.to_string());
        self.call(move |db| db.get_entry(&owner, &entry_id))
            .await
            .map_err(StoreError::Database)?
            .ok_or_else(|| StoreError::EntryNotFound { id: id.to_string() })
    }

    async fn create(&self, owner_id: &str, new: NewEntry) -> Result<Entry, StoreError> {
        require_content(&new.content)?;
        let owner = owner_id.to_string();
        self.call(move |db| db.create_entry(&owner, &new))
            .await
            .map_err(StoreError::Database)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: EntryPatch,
    ) -> Result<Entry, StoreError> {
        if let Some(body) = &patch.content {
            require_content(body)?;
        }
        let (owner, entry_id) = (owner_id.to_string(), id.to_string());
        self.call(move |db| db.update_entry(&owner, &entry_id, &patch))
            .await
            .map_err(StoreError::Database)?
            .ok_or_else(|| StoreError::EntryNotFound { id: id.to_string() })
    }

    async fn archive(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let (owner, entry_id) = (owner_id.to_string(), id.to_string());
        let archived = self
            .call(move |db| db.archive_entry(&owner, &entry_id))
            .await
            .map_err(StoreError::Database)?;
        if archived {
            Ok(())
        } else {
            Err(StoreError::EntryNotFound { id: id.to_string() })
        }
    }

    async fn all(&self, owner_id: &str, include_archived: bool) -> Result<Vec<Entry>, StoreError> {
        let owner = owner_id.to_string();
        self.call(move |db| db.all_entries(&owner, include_archived))
            .await
            .map_err(StoreError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> DbHandle {
        DbHandle::new(JournalDb::new_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_create_rejects_blank_content() {
        let store = handle();
        let err = store
            .create("u1", NewEntry::with_content("<p>  </p>"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ContentRequired));
    }

    #[tokio::test]
    async fn test_update_rejects_blank_content() {
        let store = handle();
        let entry = store
            .create("u1", NewEntry::with_content("<p>hello</p>"))
            .await
            .unwrap();
        let err = store
            .update("u1", &entry.id, EntryPatch::content(""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ContentRequired));
    }

    #[tokio::test]
    async fn test_missing_entry_maps_to_not_found() {
        let store = handle();
        for err in [
            store.get("u1", "missing").await.unwrap_err(),
            store
                .update("u1", "missing", EntryPatch::default())
                .await
                .unwrap_err(),
            store.archive("u1", "missing").await.unwrap_err(),
        ] {
            match err {
                StoreError::EntryNotFound { id } => assert_eq!(id, "missing"),
                other => panic!("Expected EntryNotFound, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_handle() {
        let store = handle();
        let entry = store
            .create("u1", NewEntry::with_content("<p>first draft</p>"))
            .await
            .unwrap();
        let updated = store
            .update("u1", &entry.id, EntryPatch::content("<p>second draft here</p>"))
            .await
            .unwrap();
        assert_eq!(updated.word_count, 3);

        let page = store.list("u1", ListQuery::default()).await.unwrap();
        assert_eq!(page.entries.len(), 1);

        store.archive("u1", &entry.id).await.unwrap();
        assert!(store.list("u1", ListQuery::default()).await.unwrap().entries.is_empty());
        assert!(store.get("u1", &entry.id).await.unwrap().is_archived);
        assert_eq!(store.all("u1", true).await.unwrap().len(), 1);
    }
}
