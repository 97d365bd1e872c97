use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FinError, Result};

/// One page (PDF) or paragraph (text) of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedChunk {
    pub page: u32,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<ParsedChunk>> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase());

        match ext.as_deref() {
            Some("pdf") => self.parse_pdf(path),
            Some("txt") | Some("md") => self.parse_text(path),
            _ => Err(FinError::UnsupportedInput(path.to_path_buf())),
        }
    }

    fn parse_pdf(&self, path: &Path) -> Result<Vec<ParsedChunk>> {
        info!(path = %path.display(), "parsing pdf");
        let pages = pdf_extract::extract_text_by_pages(path)
            .map_err(|e| FinError::Pdf(e.to_string()))?;
        Ok(pages_to_chunks(pages))
    }

    fn parse_text(&self, path: &Path) -> Result<Vec<ParsedChunk>> {
        info!(path = %path.display(), "parsing text");
        let content = read_text_lossy(path)?;
        Ok(paragraphs_to_chunks(&content))
    }
}

fn pages_to_chunks(pages: Vec<String>) -> Vec<ParsedChunk> {
    pages
        .into_iter()
        .enumerate()
        .filter_map(|(idx, text)| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(ParsedChunk {
                    page: idx as u32 + 1,
                    content: trimmed.to_string(),
                })
            }
        })
        .collect()
}

/// Paragraphs are separated by a blank line. Numbering keeps the position of
/// skipped (blank) paragraphs so it stays stable against the source file.
fn paragraphs_to_chunks(text: &str) -> Vec<ParsedChunk> {
    text.split("\n\n")
        .enumerate()
        .filter_map(|(idx, chunk)| {
            let trimmed = chunk.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(ParsedChunk {
                    page: idx as u32 + 1,
                    content: trimmed.to_string(),
                })
            }
        })
        .collect()
}

fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
