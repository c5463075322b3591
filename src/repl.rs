//! Terminal chat (`docchat chat <file.pdf>`).
//!
//! Loads one PDF, prints the greeting, then answers one query per input
//! line. Failed turns print `error: ...` and leave the history untouched.
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/history` | print every turn as `role: content` |
//! | `/quit` or EOF | exit |
//! | blank line | ignored |
//! | anything else | ask |

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::chat::ChatEngine;
use crate::config::{ChatMode, Config};
use crate::extract::{self, MIME_PDF};
use crate::prompt::render_history;
use crate::session::Session;

pub async fn run_chat(config: &Config, path: &Path, mode: Option<ChatMode>) -> Result<()> {
    let mut config = config.clone();
    if let Some(mode) = mode {
        config.chat.mode = mode;
    }
    if config.chat.mode == ChatMode::Retrieval && !config.embedding.is_enabled() {
        bail!("Retrieval mode needs an embedding provider. Set [embedding] provider in config.");
    }

    let bytes = extract::read_pdf_file(path)?;
    let engine = ChatEngine::from_config(&config).await?;
    let mut session = engine.new_session();

    let name = path.file_name().map(|n| n.to_string_lossy().to_string());
    let summary = engine
        .load_document(&mut session, &bytes, Some(MIME_PDF), name.as_deref())
        .await?;
    eprintln!(
        "loaded {} ({} chars, mode {})",
        path.display(),
        summary.chars,
        engine.mode().as_str()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_repl(&engine, &mut session, stdin, &mut stdout).await
}

/// Drives the read-ask-print loop over `input` until `/quit` or EOF.
pub async fn run_repl<R, W>(
    engine: &ChatEngine,
    session: &mut Session,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if let Some(greeting) = session.turns().first() {
        writeln!(out, "{}: {}", greeting.role, greeting.content)?;
    }

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/history" => {
                write!(out, "{}", render_history(session.turns()))?;
            }
            _ => match engine.ask(session, &line).await {
                Ok(answer) => {
                    writeln!(out, "assistant: {}", answer)?;
                    session.displayed();
                }
                Err(e) => writeln!(out, "error: {}", e)?,
            },
        }
    }

    writeln!(out)?;
    Ok(())
}
