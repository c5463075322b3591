//! Prompt assembly.
//!
//! Builds the exact user message sent to the language model from the
//! context material (whole document text, or retrieved chunks), the
//! conversation so far, and the new query. Output is a pure function of the
//! inputs: no timestamps, no randomness.
//!
//! | Mode | First query | Later queries |
//! |------|-------------|---------------|
//! | whole document | [`INITIAL_USER_TEMPLATE`] | [`HISTORY_USER_TEMPLATE`] with the rendered history |
//! | retrieval | [`INITIAL_USER_TEMPLATE`] with the joined chunks | same; history is never injected |

use crate::models::{RetrievedChunk, Turn};

pub use crate::config::DEFAULT_SYSTEM_PROMPT as SYSTEM_PROMPT;

pub const INITIAL_USER_TEMPLATE: &str = "
Given the following context information:

{document_text}

Answer the following question using only information
from the previous context information.
Do not made up any information.

Question: {query}

Answer:
";

pub const HISTORY_USER_TEMPLATE: &str = "
Given the following context information:

{document_text}

The conversation so far:

{conversation_history}

Answer the following question using only information
from the previous context information, conversation history, and the new question.

Question: {query}

Answer:
";

/// Separator between retrieved chunks in the context section.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Substitutes `{name}` placeholders found in `template`.
///
/// Values are inserted verbatim and never re-scanned, so a document that
/// itself contains `{query}` is left intact. Unknown placeholders and lone
/// braces are copied through unchanged.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(
        template.len() + vars.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// One `role: content` line per turn, in chronological order.
pub fn render_history(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str(turn.role.as_str());
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out
}

/// Joins retrieved chunk texts, nearest first, with a blank line between.
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn initial_prompt(context: &str, query: &str) -> String {
    render_template(
        INITIAL_USER_TEMPLATE,
        &[("document_text", context), ("query", query)],
    )
}

pub fn history_prompt(context: &str, history: &str, query: &str) -> String {
    render_template(
        HISTORY_USER_TEMPLATE,
        &[
            ("document_text", context),
            ("conversation_history", history),
            ("query", query),
        ],
    )
}

/// Whole-document mode: a session holding only the greeting gets the
/// initial template; anything longer gets the history template, with the
/// greeting included in the rendered history.
pub fn assemble_whole_document(document: &str, turns: &[Turn], query: &str) -> String {
    if turns.len() <= 1 {
        initial_prompt(document, query)
    } else {
        history_prompt(document, &render_history(turns), query)
    }
}

/// Retrieval mode: only the retrieved context and the current query.
pub fn assemble_retrieval(chunks: &[RetrievedChunk], query: &str) -> String {
    initial_prompt(&join_context(chunks), query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, distance: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: format!("t:{}", text.len()),
            chunk_index: 0,
            text: text.to_string(),
            distance,
        }
    }

    #[test]
    fn history_lines_in_order() {
        let turns = vec![
            Turn::assistant("How can I help you?"),
            Turn::user("Q1"),
            Turn::assistant("A1"),
        ];
        assert_eq!(
            render_history(&turns),
            "assistant: How can I help you?\nuser: Q1\nassistant: A1\n"
        );
    }

    #[test]
    fn first_turn_uses_initial_template() {
        let turns = vec![Turn::assistant("How can I help you?")];
        let prompt = assemble_whole_document("DOC", &turns, "What?");
        assert_eq!(prompt, initial_prompt("DOC", "What?"));
        assert!(!prompt.contains("The conversation so far"));
        assert!(prompt.contains("\nDOC\n"));
        assert!(prompt.contains("Question: What?\n"));
    }

    #[test]
    fn later_turns_use_history_template() {
        let turns = vec![
            Turn::assistant("How can I help you?"),
            Turn::user("Q1"),
            Turn::assistant("A1"),
        ];
        let prompt = assemble_whole_document("DOC", &turns, "Q2");
        assert!(prompt.contains(
            "The conversation so far:\n\nassistant: How can I help you?\nuser: Q1\nassistant: A1\n\n"
        ));
        assert!(prompt.ends_with("Question: Q2\n\nAnswer:\n"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let turns = vec![Turn::assistant("hi"), Turn::user("a"), Turn::assistant("b")];
        let a = assemble_whole_document("doc body", &turns, "q");
        let b = assemble_whole_document("doc body", &turns, "q");
        assert_eq!(a, b);
    }

    #[test]
    fn placeholders_in_values_are_not_expanded() {
        let prompt = initial_prompt("literal {query} in doc", "real question");
        assert!(prompt.contains("literal {query} in doc"));
        assert!(prompt.contains("Question: real question"));
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        assert_eq!(render_template("a {b} {c", &[("x", "y")]), "a {b} {c");
        assert_eq!(render_template("{x}{x}", &[("x", "y")]), "yy");
    }

    #[test]
    fn empty_context_renders_empty_section() {
        let prompt = assemble_retrieval(&[], "q");
        assert!(prompt.starts_with("\nGiven the following context information:\n\n\n\nAnswer"));
    }

    #[test]
    fn retrieved_chunks_joined_nearest_first() {
        let chunks = vec![chunk("first", 0.1), chunk("second", 0.2)];
        assert_eq!(join_context(&chunks), "first\n\nsecond");
        let prompt = assemble_retrieval(&chunks, "q");
        assert!(prompt.contains("\nfirst\n\nsecond\n"));
    }
}
