//! Pipeline stages for document digestion.
//!
//! Each submodule implements one step. Collaborators with side effects
//! (document access, archive unpacking, the summarisation backend, artifact
//! storage) sit behind traits, so every stage can be driven by an in-memory
//! stand-in in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ bundle ──▶ source ──┬─▶ text ──▶ chunk ──▶ dispatch ──▶ aggregate ──▶ render
//! (URL/path) (tar.gz)  (pdfium) │   (pages)  (split)   (backend)    (join)        (PDF)
//!                               └─▶ figures ──▶ encode
//!                                   (raster + vector crops)
//! ```
//!
//! 1. [`input`]   — canonicalise a path or URL to a local file and classify it
//! 2. [`bundle`]  — unpack a `.tar.gz` bundle or walk a directory for PDFs
//! 3. [`source`]  — open a document; pdfium in production, in-memory in tests
//! 4. [`text`]    — accumulate page text and emit bounded chunks
//! 5. [`figures`] — store embedded images and rasterised vector regions
//! 6. [`dispatch`] — one timed backend call per chunk; the only network stage
//! 7. [`aggregate`] — join chunk results in order
//! 8. [`render`]  — lay the summary out as a paged PDF and store it

pub mod aggregate;
pub mod backend;
pub mod bundle;
pub mod chunk;
pub mod dispatch;
pub mod encode;
pub mod figures;
pub mod input;
pub mod render;
pub mod source;
pub mod text;
