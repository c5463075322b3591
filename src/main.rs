//! # DocChat CLI (`docchat`)
//!
//! Chat with a PDF from the terminal or over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite vector index and its schema |
//! | `docchat extract <pdf>` | Print the text extracted from a PDF |
//! | `docchat chunks <pdf>` | Print the chunks a PDF would be indexed as |
//! | `docchat ingest <pdf>` | Chunk, embed and index a PDF under a session tag |
//! | `docchat chat <pdf>` | Interactive question answering in the terminal |
//! | `docchat serve` | Start the HTTP API |
//! | `docchat sentiment "<text>"` | Classify the sentiment of a text |
//!
//! ## Examples
//!
//! ```bash
//! # Ask questions about a paper, sending the whole document every turn
//! OPENAI_API_KEY=... docchat chat paper.pdf
//!
//! # Same, but only the top-3 nearest chunks are sent
//! docchat chat paper.pdf --mode retrieval
//!
//! # Inspect how a PDF is split before indexing
//! docchat chunks paper.pdf
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::config::{self, ChatMode, Config};
use docchat::{chunk, extract, ingest, logging, migrate, repl, sentiment, server};

/// DocChat: question answering over a single PDF.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "DocChat: ask questions about a PDF, answered by a language model",
    version,
    long_about = "DocChat extracts the text of a PDF and answers questions about it with an \
    OpenAI-compatible chat model, either sending the whole document with every question or \
    retrieving the nearest chunks from a local vector index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docchat.toml`. `extract` and `chunks` fall back
    /// to built-in defaults when the file is missing.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector index database.
    ///
    /// Creates the SQLite file and the `chunks` table. Idempotent.
    Init,

    /// Print the text extracted from a PDF, one page after another.
    Extract {
        /// Path to a `.pdf` file.
        path: PathBuf,
    },

    /// Print the chunks a PDF is split into.
    Chunks {
        /// Path to a `.pdf` file.
        path: PathBuf,
    },

    /// Chunk, embed and insert a PDF into the vector index.
    ///
    /// Requires an embedding provider. Prints the session tag the chunks
    /// were stored under.
    Ingest {
        /// Path to a `.pdf` file.
        path: PathBuf,

        /// Session tag to store chunks under (defaults to a fresh UUID).
        #[arg(long)]
        tag: Option<String>,
    },

    /// Chat with a PDF in the terminal.
    ///
    /// Type a question per line. `/history` prints the conversation,
    /// `/quit` exits.
    Chat {
        /// Path to a `.pdf` file.
        path: PathBuf,

        /// Override `[chat].mode`: `whole_document` or `retrieval`.
        #[arg(long)]
        mode: Option<ChatMode>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Classify the sentiment of a text.
    Sentiment {
        /// Text to analyze.
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(match &cli.command {
        Commands::Serve => "info",
        _ => "warn",
    });

    match cli.command {
        // Commands that run without a config file
        Commands::Extract { path } => {
            let text = extract::load_pdf_file(&path)?;
            print!("{}", text);
        }
        Commands::Chunks { path } => {
            let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
            let text = extract::load_pdf_file(&path)?;
            chunk::print_chunks(&text, &cfg.chunking);
        }
        command => {
            let cfg = config::load_config(&cli.config)?;
            run(command, &cfg).await?;
        }
    }

    Ok(())
}

async fn run(command: Commands, cfg: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            migrate::run_migrations(cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, tag } => {
            ingest::run_ingest(cfg, &path, tag).await?;
        }
        Commands::Chat { path, mode } => {
            repl::run_chat(cfg, &path, mode).await?;
        }
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
        Commands::Sentiment { text } => {
            sentiment::run_sentiment(cfg, &text).await?;
        }
        Commands::Extract { .. } | Commands::Chunks { .. } => {
            // Handled in main (before config loading)
            unreachable!()
        }
    }
    Ok(())
}
