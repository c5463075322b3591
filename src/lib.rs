//! # DocChat
//!
//! Question answering over a single uploaded PDF.
//!
//! A user uploads a PDF, DocChat extracts its text, and each question is
//! answered by an OpenAI-compatible chat model with a prompt built from the
//! document and the conversation so far. Two modes:
//!
//! - **whole document**: the full extracted text goes into every prompt,
//!   with the rendered history from the second question on;
//! - **retrieval**: the text is chunked, embedded and indexed once per
//!   upload, and each question sends only the top-k nearest chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌────────────────┐
//! │  Upload  │──▶│  Extract    │──▶│ Chunk + Embed  │──▶ Vector index
//! │  (PDF)   │   │ (pdf text)  │   │ (retrieval)    │      (SQLite)
//! └──────────┘   └──────┬──────┘   └────────────────┘         │
//!                       │ whole document                      │ top-k
//!                       ▼                                     ▼
//!                 ┌───────────────────────────────────────────────┐
//!                 │      Prompt assembly  ──▶  Chat model         │
//!                 └───────────────┬───────────────────────────────┘
//!                        ┌────────┴────────┐
//!                        ▼                 ▼
//!                  ┌──────────┐      ┌──────────┐
//!                  │   REPL   │      │   HTTP   │
//!                  └──────────┘      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error kinds of the chat pipeline |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Sentence-aligned chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index (SQLite and in-memory) |
//! | [`ingest`] | Chunk → embed → insert |
//! | [`prompt`] | Prompt templates and assembly |
//! | [`llm`] | Chat model client |
//! | [`session`] | Session state machine |
//! | [`chat`] | Chat orchestration |
//! | [`repl`] | Terminal chat |
//! | [`server`] | HTTP API |
//! | [`sentiment`] | Sentiment analysis |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`logging`] | Tracing subscriber setup |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod repl;
pub mod sentiment;
pub mod server;
pub mod session;
