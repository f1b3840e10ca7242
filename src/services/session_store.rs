//! Session persistence.
//!
//! Expiry is passive: `get` filters on `expires_at`, so an expired row is
//! indistinguishable from a deleted one to every caller. The rows themselves
//! linger until the sweep reaps them.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::models::session::{UploadSession, UploadedPart};

/// Persistence seam for upload sessions and their recorded parts.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Persist a freshly initiated session.
    async fn create(&self, session: &UploadSession) -> Result<(), sqlx::Error>;

    /// Fetch a live session. Expired sessions are filtered here, so callers
    /// never observe them.
    async fn get(&self, upload_id: &str) -> Result<Option<UploadSession>, sqlx::Error>;

    /// Record a part upload. Re-recording the same part number replaces the
    /// previous receipt rather than adding a duplicate.
    async fn record_part(
        &self,
        upload_id: &str,
        part_number: i32,
        etag: &str,
    ) -> Result<(), sqlx::Error>;

    /// All recorded parts for a session, ordered by part number.
    async fn parts(&self, upload_id: &str) -> Result<Vec<UploadedPart>, sqlx::Error>;

    /// Remove a session and its parts. Removing an absent session is not an
    /// error.
    async fn delete(&self, upload_id: &str) -> Result<(), sqlx::Error>;

    /// Sessions whose expiry has passed, oldest first, up to `limit`.
    async fn expired(&self, limit: i64) -> Result<Vec<UploadSession>, sqlx::Error>;
}

/// SQLite-backed [`SessionStore`].
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Arc<SqlitePool>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &UploadSession) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO upload_sessions (
                 upload_id, object_key, storage_class, owner_id, filename,
                 content_type, total_size, chunk_size, total_parts,
                 created_at, expires_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.upload_id)
        .bind(&session.object_key)
        .bind(session.storage_class)
        .bind(&session.owner_id)
        .bind(&session.filename)
        .bind(&session.content_type)
        .bind(session.total_size)
        .bind(session.chunk_size)
        .bind(session.total_parts)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn get(&self, upload_id: &str) -> Result<Option<UploadSession>, sqlx::Error> {
        sqlx::query_as::<_, UploadSession>(
            "SELECT upload_id, object_key, storage_class, owner_id, filename,
                    content_type, total_size, chunk_size, total_parts,
                    created_at, expires_at
             FROM upload_sessions WHERE upload_id = ? AND expires_at > ?",
        )
        .bind(upload_id)
        .bind(Utc::now())
        .fetch_optional(&*self.db)
        .await
    }

    async fn record_part(
        &self,
        upload_id: &str,
        part_number: i32,
        etag: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO upload_parts (upload_id, part_number, etag, uploaded_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(upload_id, part_number) DO UPDATE SET
                 etag = excluded.etag,
                 uploaded_at = excluded.uploaded_at",
        )
        .bind(upload_id)
        .bind(part_number)
        .bind(etag)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn parts(&self, upload_id: &str) -> Result<Vec<UploadedPart>, sqlx::Error> {
        sqlx::query_as::<_, UploadedPart>(
            "SELECT upload_id, part_number, etag, uploaded_at
             FROM upload_parts WHERE upload_id = ?
             ORDER BY part_number ASC",
        )
        .bind(upload_id)
        .fetch_all(&*self.db)
        .await
    }

    async fn delete(&self, upload_id: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM upload_parts WHERE upload_id = ?")
            .bind(upload_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM upload_sessions WHERE upload_id = ?")
            .bind(upload_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn expired(&self, limit: i64) -> Result<Vec<UploadSession>, sqlx::Error> {
        sqlx::query_as::<_, UploadSession>(
            "SELECT upload_id, object_key, storage_class, owner_id, filename,
                    content_type, total_size, chunk_size, total_parts,
                    created_at, expires_at
             FROM upload_sessions WHERE expires_at <= ?
             ORDER BY expires_at ASC LIMIT ?",
        )
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&*self.db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::storage_class::StorageClass;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteSessionStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::MIGRATOR.run(&pool).await.unwrap();
        SqliteSessionStore::new(Arc::new(pool))
    }

    fn sample(upload_id: &str, ttl: Duration) -> UploadSession {
        let now = Utc::now();
        UploadSession {
            upload_id: upload_id.to_string(),
            object_key: format!("uploads/u1/{}-clip.mp4", now.timestamp_millis()),
            storage_class: StorageClass::Media,
            owner_id: "u1".to_string(),
            filename: "clip.mp4".to_string(),
            content_type: "video/mp4".to_string(),
            total_size: 40_000_000,
            chunk_size: 10_485_760,
            total_parts: 4,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrips() {
        let store = store().await;
        store.create(&sample("up-1", Duration::hours(24))).await.unwrap();

        let got = store.get("up-1").await.unwrap().unwrap();
        assert_eq!(got.owner_id, "u1");
        assert_eq!(got.total_parts, 4);
        assert_eq!(got.storage_class, StorageClass::Media);
    }

    #[tokio::test]
    async fn expired_sessions_are_invisible_to_get() {
        let store = store().await;
        store
            .create(&sample("up-stale", Duration::hours(-1)))
            .await
            .unwrap();

        assert!(store.get("up-stale").await.unwrap().is_none());
        // But the sweep still sees the row.
        let stale = store.expired(10).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].upload_id, "up-stale");
    }

    #[tokio::test]
    async fn recording_the_same_part_twice_keeps_one_row() {
        let store = store().await;
        store.create(&sample("up-2", Duration::hours(24))).await.unwrap();

        store.record_part("up-2", 3, "aaa").await.unwrap();
        store.record_part("up-2", 1, "bbb").await.unwrap();
        store.record_part("up-2", 3, "ccc").await.unwrap();

        let parts = store.parts("up-2").await.unwrap();
        assert_eq!(
            parts.iter().map(|p| p.part_number).collect::<Vec<_>>(),
            vec![1, 3]
        );
        // The re-upload refreshed the receipt.
        assert_eq!(parts[1].etag, "ccc");
    }

    #[tokio::test]
    async fn delete_removes_session_and_parts() {
        let store = store().await;
        store.create(&sample("up-3", Duration::hours(24))).await.unwrap();
        store.record_part("up-3", 1, "aaa").await.unwrap();

        store.delete("up-3").await.unwrap();

        assert!(store.get("up-3").await.unwrap().is_none());
        assert!(store.parts("up-3").await.unwrap().is_empty());
        // Deleting again is a no-op.
        store.delete("up-3").await.unwrap();
    }
}
