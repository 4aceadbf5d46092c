//! Storage seams the worker is written against, and their SQLite implementation.
use crate::db::{self, Pool, RecordRow};
use crate::model::{Cursor, RemoteItem, StoredRecord};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// Per-work-unit checkpoint storage.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Cursor>>;

    async fn set(&self, key: &str, cursor: &Cursor) -> Result<()>;
}

/// Durable storage for fetched items.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist an item and return its generated storage id. Storing the same
    /// remote item twice yields two records.
    async fn put(&self, timestamp: DateTime<Utc>, item: &RemoteItem, visible: bool)
        -> Result<String>;

    async fn set_visible(&self, id: &str, visible: bool) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<StoredRecord>>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CursorStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Cursor>> {
        Ok(db::get_cursor(&self.pool, key).await?.map(Cursor::new))
    }

    async fn set(&self, key: &str, cursor: &Cursor) -> Result<()> {
        db::upsert_cursor(&self.pool, key, &cursor.high_water_id).await
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn put(
        &self,
        timestamp: DateTime<Utc>,
        item: &RemoteItem,
        visible: bool,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        db::insert_record(&self.pool, &id, timestamp, item, visible).await?;
        debug!(record_id = %id, remote_id = %item.id, "stored record");
        Ok(id)
    }

    async fn set_visible(&self, id: &str, visible: bool) -> Result<()> {
        if db::set_record_visible(&self.pool, id, visible).await? {
            Ok(())
        } else {
            Err(anyhow!("record {} not found", id))
        }
    }

    async fn list_all(&self) -> Result<Vec<StoredRecord>> {
        let rows = db::list_records(&self.pool).await?;
        Ok(rows.into_iter().map(StoredRecord::from).collect())
    }
}

impl From<RecordRow> for StoredRecord {
    fn from(row: RecordRow) -> Self {
        StoredRecord {
            id: row.id,
            timestamp: row.timestamp,
            item: RemoteItem {
                id: row.remote_id,
                author: row.author,
                author_name: row.author_name,
                text: row.text,
                created_at: row.raw_created_at,
            },
            visible: row.visible,
            stored_at: row.stored_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_generates_distinct_ids() {
        let store = SqliteStore::new(db::memory_pool().await.unwrap());
        let item = RemoteItem {
            id: "42".into(),
            author: "bob".into(),
            author_name: Some("Bob".into()),
            text: "hi".into(),
            created_at: "Thu, 06 Dec 2012 17:10:42 +0000".into(),
        };
        let a = store.put(Utc::now(), &item, true).await.unwrap();
        let b = store.put(Utc::now(), &item, true).await.unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].item, item);
        assert!(all.iter().all(|r| r.visible));
    }

    #[tokio::test]
    async fn set_visible_unknown_id_fails() {
        let store = SqliteStore::new(db::memory_pool().await.unwrap());
        let err = store.set_visible("nope", true).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn cursor_roundtrip_through_trait() {
        let store = SqliteStore::new(db::memory_pool().await.unwrap());
        assert_eq!(CursorStore::get(&store, "T").await.unwrap(), None);
        store.set("T", &Cursor::new("999")).await.unwrap();
        assert_eq!(
            CursorStore::get(&store, "T").await.unwrap(),
            Some(Cursor::new("999"))
        );
    }
}
