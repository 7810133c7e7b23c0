//! Result types produced by a digest run.
//!
//! Everything here is plain data: serialisable so the CLI can print it as
//! JSON, cloneable so callers can keep a copy after the run's storage is
//! gone.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A bounded slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub document_id: String,
    /// 0-based; defines the total order of a document's chunks.
    pub index: usize,
    pub text: String,
}

impl TextChunk {
    /// Length in characters, the unit the chunk planner splits on.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Where a figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FigureKind {
    /// An image embedded in the page, stored in its native encoding.
    Raster,
    /// A rasterised vector-drawing region, always PNG.
    VectorCrop,
}

/// Metadata for one extracted figure. The bytes live in the artifact store
/// under [`Figure::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub document_id: String,
    /// 1-based page number.
    pub page: usize,
    pub kind: FigureKind,
    /// 1-based position among figures of the same kind on the same page.
    pub index: usize,
    pub extension: String,
    pub filename: String,
    /// Storage key the bytes were written under.
    pub key: String,
    /// Caller-facing location of the stored bytes (path or URL).
    pub location: String,
    pub size_bytes: usize,
}

/// Outcome class of one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStatus {
    Ok,
    Timeout,
    TransportError,
    Malformed,
}

impl ChunkStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, ChunkStatus::Ok)
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkStatus::Ok => "ok",
            ChunkStatus::Timeout => "timeout",
            ChunkStatus::TransportError => "transport-error",
            ChunkStatus::Malformed => "malformed",
        };
        f.write_str(s)
    }
}

/// Summary (or failure marker) for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizationResult {
    pub index: usize,
    pub status: ChunkStatus,
    /// The backend's summary on `Ok`, an explicit marker string otherwise.
    pub text: String,
    pub duration_ms: u64,
}

/// The aggregated summary of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: String,
    /// Result texts in chunk order, separated by a blank line.
    pub text: String,
    pub results: Vec<SummarizationResult>,
}

impl DocumentSummary {
    pub fn failed_chunks(&self) -> usize {
        self.results.iter().filter(|r| !r.status.is_ok()).count()
    }
}

/// A rendered summary document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryArtifact {
    /// Stable identifier derived from the document name.
    pub id: String,
    pub key: String,
    pub location: String,
    pub pages: usize,
    pub size_bytes: usize,
}

/// Per-document timing and counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub page_count: usize,
    pub chunk_count: usize,
    pub failed_chunks: usize,
    pub extraction_ms: u64,
    pub summarization_ms: u64,
}

/// How a document's text path ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentOutcome {
    Summarized,
    EmptyDocument,
    Unreadable,
}

/// Everything the run produced for one input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub id: String,
    pub source: PathBuf,
    /// `None` when the text path stopped early (see [`Self::error`]).
    pub summary: Option<DocumentSummary>,
    pub error: Option<DocumentError>,
    pub figures: Vec<Figure>,
    pub artifact: Option<SummaryArtifact>,
    pub stats: DocumentStats,
}

impl DocumentReport {
    pub fn outcome(&self) -> DocumentOutcome {
        match self.error {
            Some(DocumentError::EmptyDocument { .. }) => DocumentOutcome::EmptyDocument,
            Some(DocumentError::Unreadable { .. }) => DocumentOutcome::Unreadable,
            None => DocumentOutcome::Summarized,
        }
    }

    /// Text shown to callers: the summary, or the document-level error.
    pub fn summary_text(&self) -> String {
        match (&self.summary, &self.error) {
            (Some(s), _) => s.text.clone(),
            (None, Some(e)) => format!("[Error: {e}]"),
            (None, None) => String::new(),
        }
    }
}

/// Run-level counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub documents: usize,
    pub empty_documents: usize,
    pub unreadable_documents: usize,
    pub total_chunks: usize,
    pub ok_chunks: usize,
    pub failed_chunks: usize,
    pub figures: usize,
    pub extraction_ms: u64,
    pub summarization_ms: u64,
    pub total_duration_ms: u64,
}

/// The result of one digest run, documents in processing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestOutput {
    pub documents: Vec<DocumentReport>,
    pub stats: RunStats,
}

/// The response structure handed back to callers, keyed by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestResponse {
    pub summaries: BTreeMap<String, String>,
    pub figures: BTreeMap<String, Vec<String>>,
    pub downloads: BTreeMap<String, Option<String>>,
}

impl DigestOutput {
    /// Project the run into the keyed response structure.
    pub fn response(&self) -> DigestResponse {
        let mut response = DigestResponse::default();
        for doc in &self.documents {
            response
                .summaries
                .insert(doc.id.clone(), doc.summary_text());
            response.figures.insert(
                doc.id.clone(),
                doc.figures.iter().map(|f| f.location.clone()).collect(),
            );
            response.downloads.insert(
                doc.id.clone(),
                doc.artifact.as_ref().map(|a| a.location.clone()),
            );
        }
        response
    }

    pub fn document(&self, id: &str) -> Option<&DocumentReport> {
        self.documents.iter().find(|d| d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, summary: Option<&str>) -> DocumentReport {
        DocumentReport {
            id: id.to_string(),
            source: PathBuf::from(format!("{id}.pdf")),
            summary: summary.map(|t| DocumentSummary {
                document_id: id.to_string(),
                text: t.to_string(),
                results: vec![],
            }),
            error: summary.is_none().then(|| DocumentError::EmptyDocument {
                document: id.to_string(),
            }),
            figures: vec![],
            artifact: None,
            stats: DocumentStats::default(),
        }
    }

    #[test]
    fn response_keys_match_documents() {
        let out = DigestOutput {
            documents: vec![report("a", Some("alpha")), report("b", None)],
            stats: RunStats::default(),
        };
        let resp = out.response();
        let keys: Vec<_> = resp.summaries.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(resp.figures.len(), 2);
        assert_eq!(resp.downloads.len(), 2);
        assert_eq!(resp.summaries["a"], "alpha");
        assert!(resp.summaries["b"].contains("no extractable text"));
        assert_eq!(resp.downloads["b"], None);
        assert_eq!(out.documents[0].outcome(), DocumentOutcome::Summarized);
        assert_eq!(out.documents[1].outcome(), DocumentOutcome::EmptyDocument);
    }

    #[test]
    fn chunk_status_serialises_kebab_case() {
        let json = serde_json::to_string(&ChunkStatus::TransportError).unwrap();
        assert_eq!(json, "\"transport-error\"");
        assert_eq!(ChunkStatus::Malformed.to_string(), "malformed");
    }

    #[test]
    fn text_chunk_len_counts_chars() {
        let chunk = TextChunk {
            document_id: "d".into(),
            index: 0,
            text: "héllo".into(),
        };
        assert_eq!(chunk.len(), 5);
    }
}
