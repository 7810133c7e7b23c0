//! # pdf-digest
//!
//! Summarise PDF documents chunk by chunk with a language model, pull their
//! figures out, and render each summary as a downloadable PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / .tar.gz bundle / directory / URL
//!  │
//!  ├─ 1. Input      resolve a local path or download a URL
//!  ├─ 2. Bundle     unpack archives, list documents in order
//!  ├─ 3. Extract    page text → bounded chunks (spawn_blocking)
//!  ├─ 4. Figures    embedded images + rasterised vector regions
//!  ├─ 5. Summarise  one timed backend call per chunk
//!  ├─ 6. Aggregate  chunk summaries joined in order
//!  └─ 7. Render     paged summary PDF written to the artifact store
//! ```
//!
//! A chunk that times out or fails leaves an inline marker in the summary
//! instead of failing the document; a document with no text is reported and
//! the rest of the bundle carries on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_digest::{digest, DigestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Summaries go to a local generate endpoint on port 11434 by default.
//!     let config = DigestConfig::default();
//!     let output = digest("papers.tar.gz", "out", &config).await?;
//!     for doc in &output.documents {
//!         println!("== {} ==\n{}", doc.id, doc.summary_text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-digest` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DigestConfig, DigestConfigBuilder};
pub use digest::{digest, digest_sync, Digester};
pub use error::{BackendError, DigestError, DocumentError};
pub use output::{
    ChunkStatus, DigestOutput, DigestResponse, DocumentOutcome, DocumentReport, DocumentStats,
    DocumentSummary, Figure, FigureKind, RunStats, SummarizationResult, SummaryArtifact, TextChunk,
};
pub use pipeline::backend::SummaryBackend;
pub use pipeline::render::RenderOptions;
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::{ArtifactStore, DirStore, MemoryStore};
