//! Summarisation orchestration: one bounded backend call per chunk.
//!
//! Every chunk produces exactly one [`SummarizationResult`]. Failures
//! become inline marker text and never abort the document. Up to
//! `concurrency` calls are in flight at once; results are sorted back into
//! chunk order before they are returned, so arrival order never shows.

use crate::error::BackendError;
use crate::output::{ChunkStatus, SummarizationResult, TextChunk};
use crate::pipeline::backend::SummaryBackend;
use crate::progress::ProgressCallback;
use crate::prompts;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-document dispatch settings.
#[derive(Clone)]
pub struct DispatchOptions {
    pub instruction: String,
    pub timeout: Duration,
    pub concurrency: usize,
    pub progress: Option<ProgressCallback>,
}

impl DispatchOptions {
    pub fn new(instruction: impl Into<String>, timeout: Duration) -> Self {
        Self {
            instruction: instruction.into(),
            timeout,
            concurrency: 1,
            progress: None,
        }
    }
}

/// Summarise a single chunk. Always returns a result.
pub async fn summarize_chunk(
    backend: &dyn SummaryBackend,
    chunk: &TextChunk,
    total: usize,
    opts: &DispatchOptions,
) -> SummarizationResult {
    let index = chunk.index;
    if let Some(ref cb) = opts.progress {
        cb.on_chunk_start(&chunk.document_id, index, total);
    }

    let prompt = prompts::build_prompt(&opts.instruction, &chunk.text);
    let start = Instant::now();
    let outcome = match tokio::time::timeout(opts.timeout, backend.summarize(&prompt)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            secs: opts.timeout.as_secs(),
        }),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let (status, text) = match outcome {
        Ok(summary) => {
            debug!(
                "{}: chunk {}/{} summarised in {}ms",
                chunk.document_id,
                index + 1,
                total,
                duration_ms
            );
            (ChunkStatus::Ok, summary)
        }
        Err(e) => {
            warn!("{}: chunk {}/{} failed: {}", chunk.document_id, index + 1, total, e);
            match e {
                BackendError::Timeout { .. } => (ChunkStatus::Timeout, prompts::timeout_marker(index)),
                BackendError::Transport(detail) => (
                    ChunkStatus::TransportError,
                    prompts::transport_marker(index, &detail),
                ),
                BackendError::Malformed(_) => {
                    (ChunkStatus::Malformed, prompts::no_response_marker(index))
                }
            }
        }
    };

    if let Some(ref cb) = opts.progress {
        if status.is_ok() {
            cb.on_chunk_complete(&chunk.document_id, index, total, text.len());
        } else {
            cb.on_chunk_error(&chunk.document_id, index, total, &text);
        }
    }

    SummarizationResult {
        index,
        status,
        text,
        duration_ms,
    }
}

/// Summarise all chunks of a document; results come back in chunk order.
pub async fn summarize_chunks(
    backend: &Arc<dyn SummaryBackend>,
    chunks: &[TextChunk],
    opts: &DispatchOptions,
) -> Vec<SummarizationResult> {
    let total = chunks.len();
    let mut results: Vec<SummarizationResult> = stream::iter(
        chunks
            .iter()
            .map(|chunk| summarize_chunk(backend.as_ref(), chunk, total, opts)),
    )
    .buffer_unordered(opts.concurrency.max(1))
    .collect()
    .await;

    results.sort_by_key(|r| r.index);
    results
}
