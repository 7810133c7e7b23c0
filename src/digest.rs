//! Run driver: resolve the input, then take every document through the
//! pipeline and collect the reports.
//!
//! Documents are processed one at a time in discovery order. Inside a
//! document, extraction (text, then figures) runs on the blocking pool
//! because pdfium is not async-safe; chunk summaries are the only awaited
//! network work.

use crate::config::DigestConfig;
use crate::error::{DigestError, DocumentError};
use crate::output::{
    DigestOutput, DocumentOutcome, DocumentReport, DocumentStats, Figure, RunStats,
};
use crate::pipeline::aggregate::aggregate;
use crate::pipeline::backend::{resolve_backend, SummaryBackend};
use crate::pipeline::bundle::{self, ArchiveUnpacker, DirectoryUnpacker, TarGzUnpacker};
use crate::pipeline::dispatch::{self, DispatchOptions};
use crate::pipeline::figures::{self, FigureOptions};
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::render;
use crate::pipeline::source::{self, Document, DocumentSource, PdfiumSource};
use crate::pipeline::text::{self, ExtractedText};
use crate::storage::{ArtifactStore, DirStore};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

static RE_UNSAFE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Turn a document name into a storage-safe identifier.
pub fn sanitize_id(name: &str) -> String {
    let replaced = RE_UNSAFE_ID.replace_all(name, "_");
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Hands out document ids that are unique within one run: `a`, `a-2`, ...
#[derive(Debug, Default)]
pub struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    pub fn allocate(&mut self, name: &str) -> String {
        let base = sanitize_id(name);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.used.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Owns the collaborators of a run.
pub struct Digester {
    config: DigestConfig,
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn ArtifactStore>,
    backend: Arc<dyn SummaryBackend>,
    tar_gz: Arc<dyn ArchiveUnpacker>,
    directory: Arc<dyn ArchiveUnpacker>,
}

impl std::fmt::Debug for Digester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Digester")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Digester {
    /// Build a digester with the production document source and the backend
    /// the config resolves to.
    pub fn new(config: DigestConfig, store: Arc<dyn ArtifactStore>) -> Result<Self, DigestError> {
        let backend = resolve_backend(&config)?;
        let source = Arc::new(PdfiumSource::new(config.pdfium_library.clone()));
        Ok(Self {
            config,
            source,
            store,
            backend,
            tar_gz: Arc::new(TarGzUnpacker),
            directory: Arc::new(DirectoryUnpacker),
        })
    }

    /// Replace the document source.
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = source;
        self
    }

    /// Replace the unpacker used for `.tar.gz` bundles.
    pub fn with_archive_unpacker(mut self, unpacker: Arc<dyn ArchiveUnpacker>) -> Self {
        self.tar_gz = unpacker;
        self
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Digest a file path, directory or URL.
    pub async fn digest(&self, input_str: &str) -> Result<DigestOutput, DigestError> {
        info!("Starting digest: {}", input_str);
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        if resolved.is_downloaded() {
            debug!("Working on downloaded copy {}", resolved.path().display());
        }
        self.digest_resolved(resolved.path(), resolved.kind()).await
    }

    /// Digest a local path, classifying it first.
    pub async fn digest_path(&self, path: &Path) -> Result<DigestOutput, DigestError> {
        let kind = input::classify(path)?;
        self.digest_resolved(path, kind).await
    }

    async fn digest_resolved(&self, path: &Path, kind: InputKind) -> Result<DigestOutput, DigestError> {
        if !kind.is_bundle() {
            return self.digest_documents(&[path.to_path_buf()]).await;
        }
        let unpacker = if kind == InputKind::TarGz {
            Arc::clone(&self.tar_gz)
        } else {
            Arc::clone(&self.directory)
        };
        let bundle_path = path.to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || {
            bundle::unpack_non_empty(unpacker.as_ref(), &bundle_path)
        })
        .await
        .map_err(|e| DigestError::Internal(format!("Unpack task panicked: {}", e)))??;
        info!("Bundle {} holds {} document(s)", path.display(), unpacked.len());
        // `unpacked` owns the scratch directory; keep it alive until done.
        self.digest_documents(&unpacked.documents).await
    }

    /// Digest an explicit list of documents, in order.
    pub async fn digest_documents(&self, paths: &[PathBuf]) -> Result<DigestOutput, DigestError> {
        if paths.is_empty() {
            return Err(DigestError::MissingInput);
        }
        let total_start = Instant::now();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(paths.len());
        }

        let mut ids = IdAllocator::default();
        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let id = ids.allocate(&source::document_name(path));
            documents.push(self.digest_document(path, &id).await?);
        }

        let total_chunks: usize = documents.iter().map(|d| d.stats.chunk_count).sum();
        let failed_chunks: usize = documents.iter().map(|d| d.stats.failed_chunks).sum();
        let stats = RunStats {
            documents: documents.len(),
            empty_documents: documents
                .iter()
                .filter(|d| d.outcome() == DocumentOutcome::EmptyDocument)
                .count(),
            unreadable_documents: documents
                .iter()
                .filter(|d| d.outcome() == DocumentOutcome::Unreadable)
                .count(),
            total_chunks,
            ok_chunks: total_chunks - failed_chunks,
            failed_chunks,
            figures: documents.iter().map(|d| d.figures.len()).sum(),
            extraction_ms: documents.iter().map(|d| d.stats.extraction_ms).sum(),
            summarization_ms: documents.iter().map(|d| d.stats.summarization_ms).sum(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };
        info!(
            "Digest complete: {} document(s) ({} unreadable), {} chunk(s) ({} failed), {} figure(s), {}ms",
            stats.documents, stats.unreadable_documents, stats.total_chunks, stats.failed_chunks, stats.figures, stats.total_duration_ms
        );
        Ok(DigestOutput { documents, stats })
    }

    /// Take one document through extraction, summarisation and rendering.
    pub async fn digest_document(&self, path: &Path, id: &str) -> Result<DocumentReport, DigestError> {
        let extraction_start = Instant::now();
        let (extracted, figures) = match self.extract(path, id).await {
            Ok(parts) => parts,
            Err(e) if is_document_level(&e) => {
                warn!("{}: unreadable, skipping: {}", id, e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_start(id, 0);
                    cb.on_document_complete(id, 0, 0);
                }
                return Ok(DocumentReport {
                    id: id.to_string(),
                    source: path.to_path_buf(),
                    summary: None,
                    error: Some(DocumentError::Unreadable {
                        document: id.to_string(),
                        detail: e.to_string(),
                    }),
                    figures: Vec::new(),
                    artifact: None,
                    stats: DocumentStats {
                        extraction_ms: extraction_start.elapsed().as_millis() as u64,
                        ..DocumentStats::default()
                    },
                });
            }
            Err(e) => return Err(e),
        };
        let extraction_ms = extraction_start.elapsed().as_millis() as u64;
        info!(
            "{}: {} page(s), {} chunk(s), {} figure(s)",
            id,
            extracted.page_count,
            extracted.chunks.len(),
            figures.len()
        );

        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_document_start(id, extracted.chunks.len());
        }

        let mut stats = DocumentStats {
            page_count: extracted.page_count,
            chunk_count: extracted.chunks.len(),
            extraction_ms,
            ..DocumentStats::default()
        };

        if extracted.is_empty() {
            warn!("{}: no extractable text, skipping summarisation", id);
            if let Some(cb) = cb {
                cb.on_document_complete(id, 0, 0);
            }
            return Ok(DocumentReport {
                id: id.to_string(),
                source: path.to_path_buf(),
                summary: None,
                error: Some(DocumentError::EmptyDocument {
                    document: id.to_string(),
                }),
                figures,
                artifact: None,
                stats,
            });
        }

        let opts = DispatchOptions {
            instruction: self.config.instruction().to_string(),
            timeout: self.config.request_timeout,
            concurrency: self.config.concurrency,
            progress: self.config.progress_callback.clone(),
        };
        let summarize_start = Instant::now();
        let results = dispatch::summarize_chunks(&self.backend, &extracted.chunks, &opts).await;
        stats.summarization_ms = summarize_start.elapsed().as_millis() as u64;

        let summary = aggregate(id, results);
        stats.failed_chunks = summary.failed_chunks();
        if let Some(cb) = cb {
            cb.on_document_complete(id, stats.chunk_count - stats.failed_chunks, stats.chunk_count);
        }

        let store = Arc::clone(&self.store);
        let render_opts = self.config.render.clone();
        let doc_id = id.to_string();
        let text = summary.text.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            render::render_summary(&doc_id, &text, &render_opts, store.as_ref())
        })
        .await
        .map_err(|e| DigestError::Internal(format!("Render task panicked: {}", e)))??;
        debug!("{}: summary stored at {}", id, artifact.location);

        Ok(DocumentReport {
            id: id.to_string(),
            source: path.to_path_buf(),
            summary: Some(summary),
            error: None,
            figures,
            artifact: Some(artifact),
            stats,
        })
    }

    /// Text and figures of one document, on the blocking pool.
    async fn extract(&self, path: &Path, id: &str) -> Result<(ExtractedText, Vec<Figure>), DigestError> {
        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let path = path.to_path_buf();
        let id = id.to_string();
        let chunk_size = self.config.chunk_size;
        let fig_opts = FigureOptions {
            min_size: self.config.min_figure_size,
            zoom: self.config.figure_zoom,
        };

        tokio::task::spawn_blocking(move || {
            let mut out = None;
            source.open(&path, &mut |doc: &dyn Document| {
                let extracted = text::extract_chunks(doc, &id, chunk_size)?;
                let figures = figures::extract_figures(doc, &id, store.as_ref(), &fig_opts)?;
                out = Some((extracted, figures));
                Ok(())
            })?;
            out.ok_or_else(|| DigestError::Internal(format!("{} was never opened", path.display())))
        })
        .await
        .map_err(|e| DigestError::Internal(format!("Extraction task panicked: {}", e)))?
    }
}

/// Failures that belong to one document of a batch rather than the run.
fn is_document_level(e: &DigestError) -> bool {
    matches!(
        e,
        DigestError::CorruptPdf { .. }
            | DigestError::FileNotFound { .. }
            | DigestError::PermissionDenied { .. }
            | DigestError::NotAPdf { .. }
    )
}

/// Digest `input` with artifacts written under `output_dir`.
///
/// # Example
/// ```rust,no_run
/// use pdf_digest::{digest, DigestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DigestConfig::default();
/// let output = digest("paper.pdf", "out", &config).await?;
/// for (id, summary) in output.response().summaries {
///     println!("{id}: {summary}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn digest(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let store = Arc::new(DirStore::new(output_dir.as_ref())?);
    Digester::new(config.clone(), store)?
        .digest(input_str.as_ref())
        .await
}

/// Synchronous wrapper around [`digest`].
///
/// Creates a temporary tokio runtime internally.
pub fn digest_sync(
    input_str: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(digest(input_str, output_dir, config))
}
