//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait stores `(embedding, text, session tag, id)`
//! records and answers nearest-neighbour queries restricted to one session
//! tag. Two backends:
//!
//! | Backend | Persistence | Use |
//! |---------|-------------|-----|
//! | [`SqliteIndex`] | SQLite file (WAL) | `docchat ingest`, `chat`, `serve` |
//! | [`InMemoryIndex`] | none | tests, throwaway sessions |
//!
//! Both search by brute-force cosine distance over the records of the
//! requested tag. Records are append-only; nothing is evicted.

use std::sync::RwLock;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{DocChatError, Result};
use crate::models::{ChunkRecord, RetrievedChunk};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Stores a record. Fails with [`DocChatError::DuplicateId`] if the id exists.
    async fn insert(&self, record: &ChunkRecord) -> Result<()>;

    /// Returns up to `k` records tagged `session_tag`, nearest first.
    ///
    /// Fewer matches than `k` returns all of them; none returns an empty vector.
    async fn query(&self, embedding: &[f32], k: usize, session_tag: &str)
        -> Result<Vec<RetrievedChunk>>;

    /// Number of records stored under `session_tag`.
    async fn count(&self, session_tag: &str) -> Result<usize>;
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Nearest first; equal distances fall back to document order.
fn rank(mut hits: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    hits.truncate(k);
    hits
}

// ============ In-memory ============

/// In-memory index behind a `RwLock`, for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> DocChatError {
    DocChatError::Index("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, record: &ChunkRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(DocChatError::DuplicateId(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        session_tag: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let hits: Vec<RetrievedChunk> = records
            .iter()
            .filter(|r| r.session_tag == session_tag)
            .map(|r| RetrievedChunk {
                id: r.id.clone(),
                chunk_index: r.chunk_index,
                text: r.text.clone(),
                distance: cosine_distance(embedding, &r.embedding),
            })
            .collect();
        Ok(rank(hits, k))
    }

    async fn count(&self, session_tag: &str) -> Result<usize> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.iter().filter(|r| r.session_tag == session_tag).count())
    }
}

// ============ SQLite ============

/// Persistent index over the `chunks` table.
///
/// Records survive restarts. The session tag is regenerated on every run, so
/// chunks from earlier runs stay in the file but are never matched again.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Wraps a pool whose schema is already in place.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the configured database and creates the schema if needed.
    pub async fn open(config: &crate::config::Config) -> anyhow::Result<Self> {
        let pool = crate::db::connect(config).await?;
        crate::migrate::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn insert(&self, record: &ChunkRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let blob = vec_to_blob(&record.embedding);

        let result = sqlx::query(
            r#"
            INSERT INTO chunks (id, session_tag, chunk_index, text, embedding, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.session_tag)
        .bind(record.chunk_index)
        .bind(&record.text)
        .bind(&blob)
        .bind(record.embedding.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(DocChatError::DuplicateId(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        session_tag: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            "SELECT id, chunk_index, text, embedding FROM chunks WHERE session_tag = ?",
        )
        .bind(session_tag)
        .fetch_all(&self.pool)
        .await?;

        let hits: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                RetrievedChunk {
                    id: row.get("id"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    distance: cosine_distance(embedding, &vec),
                }
            })
            .collect();

        Ok(rank(hits, k))
    }

    async fn count(&self, session_tag: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE session_tag = ?")
            .bind(session_tag)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
