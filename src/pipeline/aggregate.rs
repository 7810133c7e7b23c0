//! Result aggregation: ordered chunk results → one document summary.

use crate::output::{DocumentSummary, SummarizationResult};

/// Separator placed between consecutive chunk results.
pub const SECTION_SEPARATOR: &str = "\n\n";

/// Join `results` in chunk-index order, markers included.
///
/// Results may arrive in any order; they are sorted by index first.
pub fn aggregate(document_id: &str, mut results: Vec<SummarizationResult>) -> DocumentSummary {
    results.sort_by_key(|r| r.index);
    let text = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR);
    DocumentSummary {
        document_id: document_id.to_string(),
        text,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ChunkStatus;

    fn result(index: usize, status: ChunkStatus, text: &str) -> SummarizationResult {
        SummarizationResult {
            index,
            status,
            text: text.to_string(),
            duration_ms: 0,
        }
    }

    #[test]
    fn joins_in_index_order_with_blank_lines() {
        let summary = aggregate(
            "a",
            vec![
                result(2, ChunkStatus::Ok, "third"),
                result(0, ChunkStatus::Ok, "first"),
                result(1, ChunkStatus::Timeout, "[Error: summarization timed out on chunk 2]"),
            ],
        );
        assert_eq!(
            summary.text,
            "first\n\n[Error: summarization timed out on chunk 2]\n\nthird"
        );
        assert_eq!(summary.failed_chunks(), 1);
        assert_eq!(summary.text.split(SECTION_SEPARATOR).count(), 3);
    }

    #[test]
    fn single_result_has_no_separator() {
        let summary = aggregate("a", vec![result(0, ChunkStatus::Ok, "only")]);
        assert_eq!(summary.text, "only");
    }
}
