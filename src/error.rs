//! Error types for the pdf-digest library.
//!
//! Three error types reflect three scopes of failure:
//!
//! * [`DigestError`] — **Fatal**: the run cannot proceed at all (no input,
//!   bundle without documents, unreadable single input, storage failure). Returned
//!   as `Err(DigestError)` from the top-level `digest*` functions.
//!
//! * [`DocumentError`] — **Per document**: one document of a batch has
//!   nothing to summarise, or could not be opened. Stored inside [`crate::output::DocumentReport`];
//!   sibling documents still process normally.
//!
//! * [`BackendError`] — **Per chunk**: the summarisation backend timed out,
//!   could not be reached, or answered without a response field. Caught at
//!   the chunk boundary and turned into an inline marker by
//!   [`crate::pipeline::dispatch`]; it never escapes a document's pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-digest library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No document was supplied to the run.
    #[error("No input supplied: pass a PDF file, a bundle, a directory or a URL")]
    MissingInput,

    /// The bundle was unpacked but contained no eligible documents.
    #[error("Bundle '{bundle}' contains no PDF documents")]
    NoDocuments { bundle: PathBuf },

    /// Input file was not found at the given path.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is neither a PDF nor a bundle.
    #[error("File is not a PDF or a .tar.gz bundle: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The input string is not a file path or a valid HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    UnsupportedInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF could not be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// The bundle could not be unpacked.
    #[error("Failed to unpack bundle '{bundle}': {detail}")]
    BundleFailed { bundle: PathBuf, detail: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The summarisation backend could not be constructed.
    #[error("Summarisation backend '{backend}' is not configured.\n{hint}")]
    BackendNotConfigured { backend: String, hint: String },

    // ── Storage / rendering errors ────────────────────────────────────────
    /// Reading or writing an artifact failed.
    #[error("Storage failure for '{key}': {source}")]
    StorageFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A storage key tried to escape the store root.
    #[error("Invalid storage key '{0}'")]
    InvalidStorageKey(String),

    /// The summary PDF could not be produced.
    #[error("Failed to render summary '{id}': {detail}")]
    RenderFailed { id: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A per-document condition that stops only that document's text path.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The document has no extractable text; nothing was summarised.
    #[error("Document '{document}' has no extractable text")]
    EmptyDocument { document: String },

    /// The document could not be opened or parsed.
    #[error("Document '{document}' could not be read: {detail}")]
    Unreadable { document: String, detail: String },
}

/// A non-fatal failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No answer within the configured bound.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection refused, reset, non-success HTTP status and the like.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered but the `response` field was missing.
    #[error("malformed response: {0}")]
    Malformed(String),
}
