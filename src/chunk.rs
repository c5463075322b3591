//! Sentence-boundary text chunker with overlap.
//!
//! Splits extracted document text into [`TextChunk`]s of at most
//! `max_tokens` (approximate) tokens. Chunks are assembled from whole
//! sentences, so a sentence is never cut in half; consecutive chunks share
//! up to `overlap_tokens` worth of trailing sentences so an answer-bearing
//! sentence near a boundary appears intact in at least one chunk.

use crate::config::ChunkingConfig;
use crate::models::TextChunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of a piece of text.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Split text into trimmed, non-empty sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace (or end of
/// text), or at a blank line.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        let end = match c {
            '.' | '!' | '?' => match iter.peek() {
                None => Some(i + c.len_utf8()),
                Some((_, next)) if next.is_whitespace() => Some(i + c.len_utf8()),
                _ => None,
            },
            '\n' => match iter.peek() {
                Some((_, '\n')) => Some(i),
                _ => None,
            },
            _ => None,
        };

        if let Some(end) = end {
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// Split text into overlapping, sentence-aligned chunks.
/// Returns chunks with contiguous indices starting at 0; empty text yields none.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<usize> = sentences.iter().map(|s| estimate_tokens(s)).collect();
    let min_sentences = config.min_sentences.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut size = 0usize;

    for i in 0..sentences.len() {
        let count = i - start;
        if count >= min_sentences && size + tokens[i] > config.max_tokens {
            chunks.push(make_chunk(chunks.len(), &sentences[start..i]));

            // Carry trailing sentences into the next chunk, but never the
            // whole previous chunk.
            let mut overlap_start = i;
            let mut overlap = 0usize;
            while overlap_start > start + 1
                && overlap + tokens[overlap_start - 1] <= config.overlap_tokens
            {
                overlap_start -= 1;
                overlap += tokens[overlap_start];
            }
            start = overlap_start;
            size = overlap;
        }
        size += tokens[i];
    }

    chunks.push(make_chunk(chunks.len(), &sentences[start..]));
    chunks
}

fn make_chunk(index: usize, sentences: &[&str]) -> TextChunk {
    TextChunk {
        index,
        text: sentences.join(" "),
    }
}

/// `docchat chunks`: one header line per chunk, then its text.
pub fn print_chunks(text: &str, config: &ChunkingConfig) {
    let chunks = chunk_text(text, config);
    for chunk in &chunks {
        println!(
            "--- chunk {} (~{} tokens) ---",
            chunk.index,
            estimate_tokens(&chunk.text)
        );
        println!("{}", chunk.text);
    }
    println!("{} chunks", chunks.len());
}
