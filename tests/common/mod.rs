#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docchat::embedding::Embedder;
use docchat::error::{DocChatError, Result};
use docchat::index::VectorIndex;
use docchat::llm::{ChatModel, ChatRequest};
use docchat::models::{ChunkRecord, RetrievedChunk};

/// Minimal PDF with one page per entry, each drawing its text in Helvetica.
/// Texts must not contain parentheses or backslashes.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let mut offsets = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            page_count
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        let page_obj = 4 + 2 * i;
        let content_obj = page_obj + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj, content_obj
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_obj,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    let size = offsets.len() + 1;
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", size).as_bytes(),
    );
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Records every request; answers `"answer N"` or fails while `failing` is set.
#[derive(Default)]
pub struct FakeModel {
    pub requests: Mutex<Vec<ChatRequest>>,
    pub failing: Mutex<bool>,
}

impl FakeModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn last_prompt(&self) -> String {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .map(|r| r.messages[0].content.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    fn model_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        if *self.failing.lock().unwrap() {
            return Err(DocChatError::LlmCall("503 Service Unavailable".into()));
        }
        Ok(format!("answer {}", requests.len()))
    }
}

const VOCAB: [&str; 6] = ["cat", "dog", "rust", "pdf", "sky", "sea"];

/// Bag-of-words over a tiny vocabulary, plus a constant bias dimension.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// [`KeywordEmbedder`] that fails on one numbered `embed_batch` call (1-based).
pub struct FlakyEmbedder {
    fail_on: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on: call,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }

    fn dims(&self) -> usize {
        KeywordEmbedder.dims()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(DocChatError::Embedding("connection reset".into()));
        }
        KeywordEmbedder.embed_batch(texts).await
    }
}

/// An index whose queries always fail; inserts succeed and are dropped.
pub struct BrokenIndex;

#[async_trait]
impl VectorIndex for BrokenIndex {
    async fn insert(&self, _record: &ChunkRecord) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _embedding: &[f32],
        _k: usize,
        _session_tag: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        Err(DocChatError::Index("database is locked".into()))
    }

    async fn count(&self, _session_tag: &str) -> Result<usize> {
        Ok(0)
    }
}
