//! SQLite transcript store.
//!
//! Implements `TranscriptSink` from `solace-core` plus read helpers used by
//! operators and tests.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use solace_core::transcript::TranscriptSink;
use solace_types::error::{PersistenceError, RepositoryError};
use solace_types::transcript::TranscriptRecord;

use super::pool::DatabasePool;

pub struct SqliteTranscriptStore {
    pool: DatabasePool,
}

impl SqliteTranscriptStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn insert(&self, record: &TranscriptRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO transcripts (id, request_id, session_id, model, content, truncated, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.request_id.to_string())
        .bind(record.session_id.map(|id| id.to_string()))
        .bind(&record.model)
        .bind(&record.content)
        .bind(record.truncated)
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    /// Transcripts for a session, oldest first.
    pub async fn list_for_session(
        &self,
        session_id: &Uuid,
    ) -> Result<Vec<TranscriptRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM transcripts WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                TranscriptRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_record()
            })
            .collect()
    }

    pub async fn get_by_request(
        &self,
        request_id: &Uuid,
    ) -> Result<TranscriptRecord, RepositoryError> {
        let row = sqlx::query("SELECT * FROM transcripts WHERE request_id = ?")
            .bind(request_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        TranscriptRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_record()
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transcripts")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count.max(0) as u64)
    }
}

impl TranscriptSink for SqliteTranscriptStore {
    async fn persist(&self, record: TranscriptRecord) -> Result<(), PersistenceError> {
        self.insert(&record).await.map_err(PersistenceError::from)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct TranscriptRow {
    id: String,
    request_id: String,
    session_id: Option<String>,
    model: String,
    content: String,
    truncated: bool,
    created_at: String,
}

impl TranscriptRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            request_id: row.try_get("request_id")?,
            session_id: row.try_get("session_id")?,
            model: row.try_get("model")?,
            content: row.try_get("content")?,
            truncated: row.try_get("truncated")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<TranscriptRecord, RepositoryError> {
        let session_id = self
            .session_id
            .as_deref()
            .map(|s| parse_uuid(s, "session_id"))
            .transpose()?;

        Ok(TranscriptRecord {
            id: parse_uuid(&self.id, "id")?,
            request_id: parse_uuid(&self.request_id, "request_id")?,
            session_id,
            model: self.model,
            content: self.content,
            truncated: self.truncated,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn parse_uuid(s: &str, field: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {field}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_types::transcript::TranscriptContext;

    async fn store(dir: &tempfile::TempDir) -> SqliteTranscriptStore {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("t.db").display());
        SqliteTranscriptStore::new(DatabasePool::new(&url).await.unwrap())
    }

    fn context(session_id: Option<Uuid>) -> TranscriptContext {
        TranscriptContext {
            request_id: Uuid::now_v7(),
            session_id,
            model: "gpt-4o-mini".to_string(),
        }
    }

    #[tokio::test]
    async fn persist_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let ctx = context(Some(Uuid::now_v7()));

        let record = TranscriptRecord::new(&ctx, "You showed up for yourself today.".into(), false);
        store.persist(record.clone()).await.unwrap();

        let loaded = store.get_by_request(&ctx.request_id).await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.content, record.content);
        assert_eq!(loaded.session_id, ctx.session_id);
        assert!(!loaded.truncated);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_for_session_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let session = Uuid::now_v7();

        for text in ["first", "second"] {
            let record = TranscriptRecord::new(&context(Some(session)), text.into(), false);
            store.persist(record).await.unwrap();
        }
        let other = TranscriptRecord::new(&context(None), "elsewhere".into(), true);
        store.persist(other).await.unwrap();

        let records = store.list_for_session(&session).await.unwrap();
        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn duplicate_request_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let ctx = context(None);

        store
            .persist(TranscriptRecord::new(&ctx, "once".into(), false))
            .await
            .unwrap();
        let err = store
            .persist(TranscriptRecord::new(&ctx, "twice".into(), false))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Storage(_)));
    }

    #[tokio::test]
    async fn missing_request_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let err = store.get_by_request(&Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
