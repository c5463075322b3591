//! PDF text extraction (the document loader).
//!
//! Uploads arrive as bytes plus an optional content type. Only PDFs are
//! accepted; the loader returns each page's text followed by a newline, in
//! page order. Layout (headings, tables, columns) is not preserved.

use std::path::Path;

use crate::error::{DocChatError, Result};

pub const MIME_PDF: &str = "application/pdf";

/// Magic bytes every PDF file starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Extracts the text of every page, each followed by `\n`, in page order.
///
/// Fails with [`DocChatError::DocumentParse`] when the bytes are not a valid
/// PDF; no partial extraction is attempted.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| DocChatError::DocumentParse(e.to_string()))?;

    let mut out = String::new();
    for page in pages {
        out.push_str(&page);
        out.push('\n');
    }
    Ok(out)
}

/// Boundary check for uploaded content, then extraction.
///
/// An explicit content type must be `application/pdf` (parameters such as
/// `; charset=` are ignored). Without one, the bytes must carry the PDF magic.
pub fn load_upload(bytes: &[u8], content_type: Option<&str>) -> Result<String> {
    match content_type {
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or("").trim();
            if !essence.eq_ignore_ascii_case(MIME_PDF) {
                return Err(DocChatError::UnsupportedContentType(essence.to_string()));
            }
        }
        None => {
            if !bytes.starts_with(PDF_MAGIC) {
                return Err(DocChatError::UnsupportedContentType(
                    "unknown (missing %PDF- header)".to_string(),
                ));
            }
        }
    }
    extract_pdf_text(bytes)
}

/// Reads a `.pdf` file from disk and extracts its text.
pub fn load_pdf_file(path: &Path) -> anyhow::Result<String> {
    let bytes = read_pdf_file(path)?;
    Ok(extract_pdf_text(&bytes)?)
}

/// Reads the raw bytes of a file with a `.pdf` extension.
pub fn read_pdf_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(DocChatError::UnsupportedContentType(format!(
            "{} is not a .pdf file",
            path.display()
        ))
        .into());
    }

    std::fs::read(path).map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
}
