//! Chat orchestration.
//!
//! [`ChatEngine`] sequences one upload and one query at a time for a
//! [`Session`]: extract → (chunk → embed → index, in retrieval mode) on
//! upload; assemble prompt → call model → record turn on every query.
//! Front ends (the REPL and the HTTP server) own the sessions and hand them
//! in by `&mut`, so a session never runs two turns at once.

use std::sync::Arc;

use crate::config::{ChatMode, ChunkingConfig, Config, IndexErrorPolicy};
use crate::embedding::{self, Embedder};
use crate::error::{DocChatError, Result};
use crate::extract;
use crate::index::{SqliteIndex, VectorIndex};
use crate::ingest::ingest_document;
use crate::llm::{self, ChatModel, ChatRequest, Message};
use crate::models::Role;
use crate::prompt;
use crate::session::{ChatState, Session};

/// Everything a turn needs that comes from configuration.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub system_prompt: String,
    pub greeting: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: usize,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    pub on_index_error: IndexErrorPolicy,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_prompt: config.chat.system_prompt.clone(),
            greeting: config.chat.greeting.clone(),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            top_k: config.index.top_k,
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
            on_index_error: config.index.on_query_error,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Where the context section of each prompt comes from.
enum ContextSource {
    WholeDocument,
    Retrieval {
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    },
}

/// What an upload produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub session_id: String,
    pub chars: usize,
    /// Chunks indexed; zero in whole-document mode.
    pub chunks: usize,
}

pub struct ChatEngine {
    settings: ChatSettings,
    model: Arc<dyn ChatModel>,
    source: ContextSource,
}

impl ChatEngine {
    pub fn whole_document(settings: ChatSettings, model: Arc<dyn ChatModel>) -> Self {
        Self {
            settings,
            model,
            source: ContextSource::WholeDocument,
        }
    }

    pub fn retrieval(
        settings: ChatSettings,
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            settings,
            model,
            source: ContextSource::Retrieval { embedder, index },
        }
    }

    /// Builds the engine for the configured mode: chat model always, plus
    /// embedder and persistent index in retrieval mode.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = ChatSettings::from_config(config);
        let model: Arc<dyn ChatModel> = Arc::from(llm::create_chat_model(&config.llm)?);

        match config.chat.mode {
            ChatMode::WholeDocument => Ok(Self::whole_document(settings, model)),
            ChatMode::Retrieval => {
                let embedder: Arc<dyn Embedder> =
                    Arc::from(embedding::create_embedder(&config.embedding)?);
                let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::open(config).await?);
                Ok(Self::retrieval(settings, model, embedder, index))
            }
        }
    }

    pub fn mode(&self) -> ChatMode {
        match self.source {
            ContextSource::WholeDocument => ChatMode::WholeDocument,
            ContextSource::Retrieval { .. } => ChatMode::Retrieval,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn new_session(&self) -> Session {
        Session::new(&self.settings.greeting)
    }

    /// Loads an upload into `session`.
    ///
    /// A rejected upload (wrong content type, unreadable PDF) leaves the
    /// session untouched. Otherwise a session that already holds a document
    /// is reset first (new id, only the greeting left). A failed ingest
    /// leaves the session in [`ChatState::AwaitingUpload`] under a fresh tag;
    /// chunks indexed before the failure stay under the abandoned one.
    pub async fn load_document(
        &self,
        session: &mut Session,
        bytes: &[u8],
        content_type: Option<&str>,
        name: Option<&str>,
    ) -> Result<LoadSummary> {
        let text = extract::load_upload(bytes, content_type)?;
        let chars = text.chars().count();

        if session.state() != ChatState::AwaitingUpload {
            session.reset_for_upload();
        }

        let (document, chunks) = match &self.source {
            ContextSource::WholeDocument => (Some(text), 0),
            ContextSource::Retrieval { embedder, index } => {
                let ingested = ingest_document(
                    &text,
                    session.tag(),
                    &self.settings.chunking,
                    embedder.as_ref(),
                    index.as_ref(),
                    self.settings.batch_size,
                )
                .await;
                match ingested {
                    Ok(stats) => (None, stats.inserted),
                    Err(e) => {
                        tracing::warn!(session = session.id(), error = %e, "ingest failed");
                        session.reset_for_upload();
                        return Err(e);
                    }
                }
            }
        };

        session.mark_loaded(document, name.map(str::to_string));
        tracing::info!(
            session = session.id(),
            mode = self.mode().as_str(),
            chars,
            chunks,
            "document loaded"
        );

        Ok(LoadSummary {
            session_id: session.id().to_string(),
            chars,
            chunks,
        })
    }

    /// Answers `query` against the session's document.
    ///
    /// On success the query and answer are appended to the session turns.
    /// On any failure the turns are left as they were.
    pub async fn ask(&self, session: &mut Session, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(DocChatError::EmptyQuery);
        }
        if !session.state().accepts_query() {
            return Err(DocChatError::NoDocument);
        }

        session.begin_processing();
        match self.answer(session, query).await {
            Ok(answer) => {
                session.finish_turn(Some((query.to_string(), answer.clone())));
                Ok(answer)
            }
            Err(e) => {
                tracing::warn!(session = session.id(), error = %e, "turn failed");
                session.finish_turn(None);
                Err(e)
            }
        }
    }

    async fn answer(&self, session: &Session, query: &str) -> Result<String> {
        let user_prompt = self.build_prompt(session, query).await?;
        let request = ChatRequest {
            system: self.settings.system_prompt.clone(),
            messages: vec![Message::new(Role::User, user_prompt)],
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
        };
        self.model.complete(&request).await
    }

    /// The user message for this turn.
    pub async fn build_prompt(&self, session: &Session, query: &str) -> Result<String> {
        match &self.source {
            ContextSource::WholeDocument => {
                let document = session.document().ok_or(DocChatError::NoDocument)?;
                Ok(prompt::assemble_whole_document(
                    document,
                    session.turns(),
                    query,
                ))
            }
            ContextSource::Retrieval { embedder, index } => {
                let vector = embedder.embed(query).await?;
                let chunks = match index
                    .query(&vector, self.settings.top_k, session.tag())
                    .await
                {
                    Ok(chunks) => chunks,
                    Err(e) => match self.settings.on_index_error {
                        IndexErrorPolicy::Fail => return Err(e),
                        IndexErrorPolicy::Degrade => {
                            tracing::warn!(
                                session = session.id(),
                                error = %e,
                                "similarity query failed; answering with empty context"
                            );
                            Vec::new()
                        }
                    },
                };
                tracing::debug!(session = session.id(), retrieved = chunks.len(), "context");
                Ok(prompt::assemble_retrieval(&chunks, query))
            }
        }
    }
}
