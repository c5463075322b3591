//! Chat sessions and their state machine.
//!
//! A [`Session`] is one document-upload lifetime: a fresh id (also used as
//! the vector-index tag in retrieval mode), the extracted document text in
//! whole-document mode, and the append-only list of conversation turns,
//! which always starts with the assistant greeting.
//!
//! ```text
//! AwaitingUpload ──load──▶ AwaitingQuery ──ask──▶ Processing ──reply──▶ Displaying
//!                               ▲                                          │
//!                               └──────────────── displayed ───────────────┘
//! ```
//!
//! Sessions live in process memory only. A new upload resets the session
//! and assigns a new id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    AwaitingUpload,
    AwaitingQuery,
    Processing,
    Displaying,
}

impl ChatState {
    /// Whether a new query may start from this state. `Displaying` counts,
    /// since rendering the previous answer needs no further input.
    pub fn accepts_query(&self) -> bool {
        matches!(self, ChatState::AwaitingQuery | ChatState::Displaying)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    state: ChatState,
    greeting: String,
    document: Option<String>,
    document_name: Option<String>,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(greeting: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: ChatState::AwaitingUpload,
            greeting: greeting.to_string(),
            document: None,
            document_name: None,
            turns: vec![Turn::assistant(greeting)],
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tag under which this session's chunks are indexed.
    pub fn tag(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document_name.as_deref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Clears everything for a new upload: fresh id, no document, only the
    /// greeting turn.
    pub fn reset_for_upload(&mut self) {
        let greeting = std::mem::take(&mut self.greeting);
        *self = Session::new(&greeting);
    }

    /// Marks the upload as loaded. `document` is `None` in retrieval mode,
    /// where only the indexed chunks persist.
    pub(crate) fn mark_loaded(&mut self, document: Option<String>, name: Option<String>) {
        self.document = document;
        self.document_name = name;
        self.transition(ChatState::AwaitingQuery);
    }

    pub(crate) fn begin_processing(&mut self) {
        self.transition(ChatState::Processing);
    }

    /// Ends a turn. On success the query and answer are appended; on failure
    /// the turn list is left untouched.
    pub(crate) fn finish_turn(&mut self, exchange: Option<(String, String)>) {
        if let Some((query, answer)) = exchange {
            self.turns.push(Turn::user(query));
            self.turns.push(Turn::assistant(answer));
        }
        self.transition(ChatState::Displaying);
    }

    /// Called by the front end once the latest answer has been rendered.
    pub fn displayed(&mut self) {
        if self.state == ChatState::Displaying {
            self.transition(ChatState::AwaitingQuery);
        }
    }

    fn transition(&mut self, next: ChatState) {
        tracing::debug!(session = %self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}
