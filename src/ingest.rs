//! Bulk chunk insertion.
//!
//! Coordinates the upload-time flow for retrieval mode:
//! text → chunk → embed (batched) → insert, in chunk order, all under one
//! session tag. An embedding or insert failure aborts the step; chunks
//! already inserted stay in the index (there is no rollback).

use std::path::Path;

use anyhow::bail;
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{self, Embedder};
use crate::error::Result;
use crate::extract;
use crate::index::{SqliteIndex, VectorIndex};
use crate::models::ChunkRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub session_tag: String,
    pub chunks: usize,
    pub inserted: usize,
}

/// Index-wide unique id of a chunk.
pub fn chunk_id(session_tag: &str, index: usize) -> String {
    format!("{}:{}", session_tag, index)
}

pub async fn ingest_document(
    text: &str,
    session_tag: &str,
    chunking: &ChunkingConfig,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    batch_size: usize,
) -> Result<IngestStats> {
    let chunks = chunk_text(text, chunking);
    let mut inserted = 0usize;

    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        for (chunk, vector) in batch.iter().zip(vectors) {
            let record = ChunkRecord {
                id: chunk_id(session_tag, chunk.index),
                session_tag: session_tag.to_string(),
                chunk_index: chunk.index as i64,
                text: chunk.text.clone(),
                embedding: vector,
            };
            index.insert(&record).await?;
            inserted += 1;
        }
    }

    tracing::info!(
        session = session_tag,
        chunks = chunks.len(),
        inserted,
        model = embedder.model_name(),
        "document indexed"
    );

    Ok(IngestStats {
        session_tag: session_tag.to_string(),
        chunks: chunks.len(),
        inserted,
    })
}

/// `docchat ingest`: index a PDF into the persistent store under a tag.
pub async fn run_ingest(config: &Config, path: &Path, tag: Option<String>) -> anyhow::Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let text = extract::load_pdf_file(path)?;
    let embedder = embedding::create_embedder(&config.embedding)?;
    let index = SqliteIndex::open(config).await?;
    let tag = tag.unwrap_or_else(|| Uuid::new_v4().to_string());

    let stats = ingest_document(
        &text,
        &tag,
        &config.chunking,
        embedder.as_ref(),
        &index,
        config.embedding.batch_size,
    )
    .await;
    index.close().await;
    let stats = stats?;

    println!("ingest {}", path.display());
    println!("  session tag: {}", stats.session_tag);
    println!("  chunks: {}", stats.chunks);
    println!("  inserted: {}", stats.inserted);
    println!("ok");
    Ok(())
}
