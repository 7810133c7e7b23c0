//! Text extraction: walk pages in order and cut the running text into
//! chunks.
//!
//! Each page contributes its text followed by a newline. Whenever the
//! buffer reaches the chunk size, every full-size slice at its front is
//! emitted and the remainder carried over, so the emitted chunks are exactly
//! `chunk::split(full_text, chunk_size)`. A document whose text is blank
//! from start to end yields no chunks at all.

use crate::error::DigestError;
use crate::output::TextChunk;
use crate::pipeline::chunk;
use crate::pipeline::source::Document;
use tracing::debug;

/// Chunks of one document plus counters for the report.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    pub chunks: Vec<TextChunk>,
    pub page_count: usize,
    /// Total extracted length in characters.
    pub char_count: usize,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Extract and chunk the text of `doc`.
pub fn extract_chunks(
    doc: &dyn Document,
    document_id: &str,
    chunk_size: usize,
) -> Result<ExtractedText, DigestError> {
    let chunk_size = chunk_size.max(1);
    let page_count = doc.page_count();
    let mut chunks: Vec<TextChunk> = Vec::new();
    let mut buffer = String::new();
    let mut buffered_chars = 0usize;
    let mut char_count = 0usize;
    let mut has_text = false;

    let emit = |text: &str, chunks: &mut Vec<TextChunk>| {
        chunks.push(TextChunk {
            document_id: document_id.to_string(),
            index: chunks.len(),
            text: text.to_string(),
        });
    };

    for page in 0..page_count {
        let text = doc.page_text(page)?;
        has_text |= !text.trim().is_empty();

        let added = text.chars().count() + 1;
        buffer.push_str(&text);
        buffer.push('\n');
        buffered_chars += added;
        char_count += added;

        if buffered_chars >= chunk_size {
            let full = buffered_chars / chunk_size;
            let cut = chunk::byte_offset_of_char(&buffer, full * chunk_size);
            for piece in chunk::split(&buffer[..cut], chunk_size) {
                emit(piece, &mut chunks);
            }
            buffer.drain(..cut);
            buffered_chars -= full * chunk_size;
        }
    }

    if !buffer.is_empty() {
        emit(&buffer, &mut chunks);
    }

    if !has_text {
        debug!("{}: no extractable text in {} page(s)", document_id, page_count);
        chunks.clear();
    } else {
        debug!(
            "{}: {} chars in {} page(s) → {} chunk(s)",
            document_id,
            char_count,
            page_count,
            chunks.len()
        );
    }

    Ok(ExtractedText {
        chunks,
        page_count,
        char_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{InMemoryDocument, InMemoryPage};

    fn doc(pages: &[&str]) -> InMemoryDocument {
        InMemoryDocument::new("d", pages.iter().map(|t| InMemoryPage::text(*t)).collect())
    }

    fn full_text(pages: &[&str]) -> String {
        pages.iter().map(|p| format!("{p}\n")).collect()
    }

    #[test]
    fn seven_thousand_chars_make_three_chunks() {
        let page = "a".repeat(6999);
        let out = extract_chunks(&doc(&[page.as_str()]), "d", 3000).unwrap();
        let lens: Vec<_> = out.chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![3000, 3000, 1000]);
        assert_eq!(out.char_count, 7000);
    }

    #[test]
    fn chunks_match_planner_across_pages() {
        let (xs, ys) = ("x".repeat(45), "y".repeat(12));
        let pages: [&str; 5] = ["short page", &xs, "mid ünïcödé", &ys, ""];
        let text = full_text(&pages);
        for size in [1, 5, 16, 40, 1000] {
            let out = extract_chunks(&doc(&pages), "d", size).unwrap();
            let got: Vec<_> = out.chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(got, chunk::split(&text, size), "size {size}");
            assert!(out.chunks.iter().enumerate().all(|(i, c)| c.index == i));
        }
    }

    #[test]
    fn blank_document_has_no_chunks() {
        let out = extract_chunks(&doc(&["", "  ", "\n"]), "scan", 3000).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.page_count, 3);

        let none = extract_chunks(&doc(&[]), "zero", 3000).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn chunks_carry_document_id() {
        let out = extract_chunks(&doc(&["hello"]), "paper", 3000).unwrap();
        assert_eq!(out.chunks.len(), 1);
        assert_eq!(out.chunks[0].document_id, "paper");
        assert_eq!(out.chunks[0].text, "hello\n");
    }
}
