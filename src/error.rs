//! Error kinds surfaced by the document chat pipeline.
//!
//! Every failure either halts the current operation visibly or is explicitly
//! defined to degrade (see [`IndexErrorPolicy`](crate::config::IndexErrorPolicy)).
//! The CLI and HTTP layers wrap these in `anyhow` or map them to status codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocChatError {
    /// The uploaded bytes are not a readable PDF.
    #[error("failed to parse document: {0}")]
    DocumentParse(String),

    /// The upload is not a PDF at all.
    #[error("unsupported content type: {0} (only application/pdf is accepted)")]
    UnsupportedContentType(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Vector store unavailable or a query/insert failed.
    #[error("vector index error: {0}")]
    Index(String),

    #[error("duplicate chunk id: {0}")]
    DuplicateId(String),

    #[error("language model call failed: {0}")]
    LlmCall(String),

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("no document loaded; upload a PDF first")]
    NoDocument,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("sentiment analysis failed: {0}")]
    Sentiment(String),
}

impl From<sqlx::Error> for DocChatError {
    fn from(e: sqlx::Error) -> Self {
        DocChatError::Index(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocChatError>;
