//! Integration tests for pdf-digest.
//!
//! These drive the whole pipeline (input classification, bundle unpacking,
//! extraction, summarisation, aggregation, rendering) with in-memory
//! documents and a scripted backend, so they need neither pdfium nor a
//! running model.
//!
//! Run with:
//!   cargo test --test pipeline

use flate2::write::GzEncoder;
use flate2::Compression;
use pdf_digest::pipeline::backend::{Reply, ScriptedBackend};
use pdf_digest::pipeline::source::{BBox, InMemoryDocument, InMemoryPage, InMemorySource};
use pdf_digest::{
    prompts, ArtifactStore, BackendError, ChunkStatus, DigestConfig, DigestError,
    DigestProgressCallback, Digester, DirStore, DocumentError, DocumentOutcome, FigureKind,
    MemoryStore, SummaryBackend,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const JPEG_STUB: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

fn source_with(docs: &[(&str, InMemoryDocument)]) -> Arc<InMemorySource> {
    let mut source = InMemorySource::new();
    for (name, doc) in docs {
        source = source.with_document(*name, doc.clone());
    }
    Arc::new(source)
}

fn text_doc(name: &str, text: &str) -> InMemoryDocument {
    InMemoryDocument::new(name, vec![InMemoryPage::text(text)])
}

fn digester(
    backend: Arc<dyn SummaryBackend>,
    source: Arc<InMemorySource>,
    store: Arc<dyn ArtifactStore>,
    configure: impl FnOnce(pdf_digest::DigestConfigBuilder) -> pdf_digest::DigestConfigBuilder,
) -> Digester {
    let config = configure(DigestConfig::builder().backend(backend))
        .build()
        .unwrap();
    Digester::new(config, store).unwrap().with_source(source)
}

/// Write stand-in PDF files so input classification sees `%PDF` magic.
fn write_pdf_stubs(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"%PDF-1.7\n%stub\n").unwrap();
    }
}

fn write_tar_gz(path: &Path, members: &[&str]) {
    let file = std::fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for name in members {
        let data: &[u8] = b"%PDF-1.7\n%stub\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// A page text of exactly 19 chars; with its newline it fills a 20-char chunk.
fn tagged(tag: &str) -> String {
    format!("{tag:-<19}")
}

// ── Chunking and aggregation ─────────────────────────────────────────────────

#[tokio::test]
async fn seven_thousand_chars_yield_three_sections() {
    let backend = Arc::new(ScriptedBackend::new(Reply::Text("S".into())));
    let source = source_with(&[("paper.pdf", text_doc("paper", &"x".repeat(6999)))]);
    let store = Arc::new(MemoryStore::new());
    let d = digester(backend.clone(), source, store.clone(), |b| b);

    let out = d
        .digest_documents(&[PathBuf::from("paper.pdf")])
        .await
        .unwrap();
    let report = out.document("paper").unwrap();
    let summary = report.summary.as_ref().unwrap();

    assert_eq!(report.stats.chunk_count, 3);
    assert_eq!(summary.text, "S\n\nS\n\nS");
    assert_eq!(backend.calls(), 3);

    let lens: Vec<_> = backend
        .prompts()
        .iter()
        .map(|p| p.strip_prefix(prompts::DEFAULT_INSTRUCTION).unwrap().chars().count())
        .collect();
    let mut sorted = lens.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1000, 3000, 3000]);

    assert!(store.exists("summaries/paper_summary.pdf"));
    assert_eq!(
        report.artifact.as_ref().unwrap().key,
        "summaries/paper_summary.pdf"
    );
}

#[tokio::test]
async fn timeout_on_one_chunk_leaves_a_marker_in_place() {
    let pages = ["alpha", "BETA", "gamma"]
        .iter()
        .map(|t| InMemoryPage::text(tagged(t)))
        .collect();
    let source = source_with(&[("doc.pdf", InMemoryDocument::new("doc", pages))]);
    let backend = Arc::new(
        ScriptedBackend::new(Reply::Text("ok".into())).on_contains("BETA", Reply::Hang),
    );
    let d = digester(backend, source, Arc::new(MemoryStore::new()), |b| {
        b.chunk_size(20).request_timeout(Duration::from_millis(150))
    });

    let out = d.digest_documents(&[PathBuf::from("doc.pdf")]).await.unwrap();
    let summary = out.documents[0].summary.as_ref().unwrap();

    let statuses: Vec<_> = summary.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![ChunkStatus::Ok, ChunkStatus::Timeout, ChunkStatus::Ok]
    );
    assert_eq!(
        summary.text,
        format!("ok\n\n{}\n\nok", prompts::timeout_marker(1))
    );
    assert_eq!(out.stats.failed_chunks, 1);
    assert_eq!(out.stats.ok_chunks, 2);
    // A partially failed document still gets its summary rendered.
    assert!(out.documents[0].artifact.is_some());
}

#[tokio::test]
async fn concurrent_dispatch_preserves_chunk_order() {
    let pages = ["one", "two", "three", "four"]
        .iter()
        .map(|t| InMemoryPage::text(tagged(t)))
        .collect();
    let source = source_with(&[("doc.pdf", InMemoryDocument::new("doc", pages))]);
    let backend = Arc::new(
        ScriptedBackend::new(Reply::Text("S4".into()))
            .on_contains("one", Reply::Delayed(Duration::from_millis(60), "S1".into()))
            .on_contains("two", Reply::Delayed(Duration::from_millis(30), "S2".into()))
            .on_contains("three", Reply::Text("S3".into())),
    );
    let d = digester(backend, source, Arc::new(MemoryStore::new()), |b| {
        b.chunk_size(20).concurrency(4)
    });

    let out = d.digest_documents(&[PathBuf::from("doc.pdf")]).await.unwrap();
    assert_eq!(
        out.documents[0].summary_text(),
        "S1\n\nS2\n\nS3\n\nS4"
    );
}

#[tokio::test]
async fn backend_failures_become_markers() {
    let pages = ["up", "down"]
        .iter()
        .map(|t| InMemoryPage::text(tagged(t)))
        .collect();
    let source = source_with(&[("doc.pdf", InMemoryDocument::new("doc", pages))]);
    let backend = Arc::new(
        ScriptedBackend::new(Reply::Text("fine".into())).on_contains(
            "down",
            Reply::Fail(BackendError::Transport("connection refused".into())),
        ),
    );
    let d = digester(backend, source, Arc::new(MemoryStore::new()), |b| {
        b.chunk_size(20)
    });

    let out = d.digest_documents(&[PathBuf::from("doc.pdf")]).await.unwrap();
    let text = out.documents[0].summary_text();
    assert!(text.starts_with("fine\n\n"));
    assert!(text.ends_with(&prompts::transport_marker(1, "connection refused")));
}

// ── Bundles ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn directory_bundle_keys_every_output_by_document() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf_stubs(dir.path(), &["a.pdf", "b.pdf"]);
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let source = source_with(&[
        ("a.pdf", text_doc("a", "Alpha paper body.")),
        ("b.pdf", text_doc("b", "Beta paper body.")),
    ]);
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source,
        Arc::new(MemoryStore::new()),
        |b| b,
    );

    let out = d.digest_path(dir.path()).await.unwrap();
    let resp = out.response();
    let expected: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();

    assert_eq!(resp.summaries.keys().cloned().collect::<BTreeSet<_>>(), expected);
    assert_eq!(resp.figures.keys().cloned().collect::<BTreeSet<_>>(), expected);
    assert_eq!(resp.downloads.keys().cloned().collect::<BTreeSet<_>>(), expected);
    assert!(resp.summaries["a"].contains("Alpha paper body."));
    assert!(resp.downloads.values().all(|d| d.is_some()));
}

#[tokio::test]
async fn tar_gz_bundle_is_digested_in_archive_order() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("papers.tar.gz");
    write_tar_gz(&bundle, &["b.pdf", "readme.md", "a.pdf"]);

    let source = source_with(&[
        ("a.pdf", text_doc("a", "Alpha.")),
        ("b.pdf", text_doc("b", "Beta.")),
    ]);
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source,
        Arc::new(MemoryStore::new()),
        |b| b,
    );

    let out = d.digest(bundle.to_str().unwrap()).await.unwrap();
    let ids: Vec<_> = out.documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(out.stats.documents, 2);
}

#[tokio::test]
async fn bundle_without_documents_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("empty.tar.gz");
    write_tar_gz(&bundle, &["readme.md"]);

    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source_with(&[]),
        Arc::new(MemoryStore::new()),
        |b| b,
    );
    let err = d.digest_path(&bundle).await.unwrap_err();
    assert!(matches!(err, DigestError::NoDocuments { .. }));
}

#[tokio::test]
async fn duplicate_names_get_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("x")).unwrap();
    std::fs::create_dir(dir.path().join("y")).unwrap();
    let first = dir.path().join("x/report.pdf");
    let second = dir.path().join("y/report.pdf");

    let source = Arc::new(
        InMemorySource::new()
            .with_document(first.clone(), text_doc("report", "First."))
            .with_document(second.clone(), text_doc("report", "Second.")),
    );
    let store = Arc::new(MemoryStore::new());
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source,
        store.clone(),
        |b| b,
    );

    let out = d.digest_documents(&[first, second]).await.unwrap();
    let ids: Vec<_> = out.documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["report", "report-2"]);
    assert!(store.exists("summaries/report_summary.pdf"));
    assert!(store.exists("summaries/report-2_summary.pdf"));
}

// ── Empty documents and figures ──────────────────────────────────────────────

#[tokio::test]
async fn image_only_document_keeps_its_figure() {
    let doc = InMemoryDocument::new("scan", vec![InMemoryPage::text("  ").with_image(JPEG_STUB, "jpeg")]);
    let backend = Arc::new(ScriptedBackend::default());
    let store = Arc::new(MemoryStore::new());
    let d = digester(backend.clone(), source_with(&[("scan.pdf", doc)]), store.clone(), |b| b);

    let out = d.digest_documents(&[PathBuf::from("scan.pdf")]).await.unwrap();
    let report = &out.documents[0];

    assert!(matches!(
        report.error,
        Some(DocumentError::EmptyDocument { ref document }) if document == "scan"
    ));
    assert!(report.summary.is_none());
    assert!(report.artifact.is_none());
    assert_eq!(report.figures.len(), 1);
    assert_eq!(report.figures[0].filename, "scan_page1_img1.jpeg");
    assert_eq!(store.read("figures/scan/scan_page1_img1.jpeg").unwrap(), JPEG_STUB);
    assert_eq!(backend.calls(), 0);
    assert_eq!(out.stats.empty_documents, 1);
    assert_eq!(out.response().downloads["scan"], None);
}

#[tokio::test]
async fn empty_document_does_not_stop_its_siblings() {
    let source = source_with(&[
        ("blank.pdf", InMemoryDocument::new("blank", vec![InMemoryPage::default(); 2])),
        ("full.pdf", text_doc("full", "Some text.")),
    ]);
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source,
        Arc::new(MemoryStore::new()),
        |b| b,
    );

    let out = d
        .digest_documents(&[PathBuf::from("blank.pdf"), PathBuf::from("full.pdf")])
        .await
        .unwrap();
    assert!(out.documents[0].error.is_some());
    assert!(out.documents[1].error.is_none());
    assert!(out.documents[1].summary_text().contains("Some text."));
}

#[tokio::test]
async fn unreadable_document_is_reported_and_its_siblings_kept() {
    // `broken.pdf` is never registered, so opening it fails.
    let backend = Arc::new(ScriptedBackend::default());
    let store = Arc::new(MemoryStore::new());
    let d = digester(
        backend.clone(),
        source_with(&[("good.pdf", text_doc("good", "Readable body."))]),
        store.clone(),
        |b| b,
    );

    let out = d
        .digest_documents(&[PathBuf::from("good.pdf"), PathBuf::from("broken.pdf")])
        .await
        .unwrap();

    assert_eq!(backend.calls(), 1);
    assert_eq!(out.documents.len(), 2);
    assert_eq!(out.documents[0].outcome(), DocumentOutcome::Summarized);
    assert!(store.exists("summaries/good_summary.pdf"));

    let broken = out.document("broken").unwrap();
    assert_eq!(broken.outcome(), DocumentOutcome::Unreadable);
    assert!(matches!(
        broken.error,
        Some(DocumentError::Unreadable { ref document, .. }) if document == "broken"
    ));
    assert!(broken.artifact.is_none());
    assert_eq!(out.stats.unreadable_documents, 1);

    let resp = out.response();
    let keys: Vec<_> = resp.summaries.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["broken", "good"]);
    assert!(resp.summaries["broken"].contains("could not be read"));
    assert_eq!(resp.downloads["broken"], None);
}

#[tokio::test]
async fn small_and_large_vector_regions() {
    let page = InMemoryPage::text("Figure page.")
        .with_image(JPEG_STUB, "jpeg")
        .with_drawing(BBox::new(50.0, 50.0, 250.0, 220.0))
        .with_drawing(BBox::new(10.0, 10.0, 60.0, 400.0))
        .with_drawing(BBox::new(300.0, 400.0, 401.0, 501.0));
    let store = Arc::new(MemoryStore::new());
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source_with(&[("fig.pdf", InMemoryDocument::new("fig", vec![page]))]),
        store.clone(),
        |b| b,
    );

    let out = d.digest_documents(&[PathBuf::from("fig.pdf")]).await.unwrap();
    let figures = &out.documents[0].figures;
    let names: Vec<_> = figures.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(
        names,
        vec!["fig_page1_img1.jpeg", "vector_figure_1_2.png", "vector_figure_1_3.png"]
    );
    assert_eq!(figures[1].kind, FigureKind::VectorCrop);

    // Default zoom 2.0: a 200×170 region becomes a 400×340 PNG.
    let png = store.read("figures/fig/vector_figure_1_2.png").unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (400, 340));
}

#[tokio::test]
async fn re_extraction_is_byte_identical() {
    let page = InMemoryPage::text("Body.")
        .with_image(JPEG_STUB, "jpeg")
        .with_drawing(BBox::new(100.0, 100.0, 300.0, 300.0));
    let source = source_with(&[("same.pdf", InMemoryDocument::new("same", vec![page]))]);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(MemoryStore::new());
        let d = digester(
            Arc::new(ScriptedBackend::default()),
            source.clone(),
            store.clone(),
            |b| b,
        );
        d.digest_documents(&[PathBuf::from("same.pdf")]).await.unwrap();
        let keys = store.keys();
        let blobs: Vec<_> = keys.iter().map(|k| store.read(k).unwrap()).collect();
        runs.push((keys, blobs));
    }
    assert_eq!(runs[0], runs[1]);
}

// ── Storage ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dir_store_receives_figures_and_summary() {
    let out_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DirStore::new(out_dir.path()).unwrap());
    let doc = InMemoryDocument::new(
        "My Paper",
        vec![InMemoryPage::text("Results are promising.").with_image(JPEG_STUB, "jpeg")],
    );
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source_with(&[("My Paper.pdf", doc)]),
        store,
        |b| b.summary_title("Digest"),
    );

    let out = d
        .digest_documents(&[PathBuf::from("My Paper.pdf")])
        .await
        .unwrap();
    let report = &out.documents[0];
    assert_eq!(report.id, "My_Paper");

    let figure = out_dir.path().join("figures/My_Paper/My_Paper_page1_img1.jpeg");
    assert_eq!(std::fs::read(&figure).unwrap(), JPEG_STUB);
    assert_eq!(report.figures[0].location, figure.display().to_string());

    let pdf = std::fs::read(out_dir.path().join("summaries/My_Paper_summary.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    let parsed = lopdf::Document::load_mem(&pdf).unwrap();
    assert_eq!(parsed.get_pages().len(), 1);
}

// ── Input errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_and_unsupported_inputs() {
    let d = digester(
        Arc::new(ScriptedBackend::default()),
        source_with(&[]),
        Arc::new(MemoryStore::new()),
        |b| b,
    );
    assert!(matches!(
        d.digest("   ").await.unwrap_err(),
        DigestError::MissingInput
    ));

    let dir = tempfile::tempdir().unwrap();
    let txt = dir.path().join("notes.txt");
    std::fs::write(&txt, b"plain text").unwrap();
    assert!(matches!(
        d.digest(txt.to_str().unwrap()).await.unwrap_err(),
        DigestError::NotAPdf { .. }
    ));

    assert!(matches!(
        d.digest("/definitely/not/here.pdf").await.unwrap_err(),
        DigestError::FileNotFound { .. }
    ));
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl DigestProgressCallback for Recorder {
    fn on_run_start(&self, documents: usize) {
        self.events.lock().unwrap().push(format!("run {documents}"));
    }
    fn on_document_start(&self, document: &str, chunks: usize) {
        self.events.lock().unwrap().push(format!("start {document} {chunks}"));
    }
    fn on_chunk_complete(&self, document: &str, index: usize, _total: usize, _len: usize) {
        self.events.lock().unwrap().push(format!("ok {document} {index}"));
    }
    fn on_chunk_error(&self, document: &str, index: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("err {document} {index}"));
    }
    fn on_document_complete(&self, document: &str, ok_chunks: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {document} {ok_chunks}/{total}"));
    }
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let recorder = Arc::new(Recorder::default());
    let pages = ["good", "bad"]
        .iter()
        .map(|t| InMemoryPage::text(tagged(t)))
        .collect();
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_contains("bad", Reply::Fail(BackendError::Malformed("no field".into()))),
    );
    let cb = recorder.clone();
    let d = digester(
        backend,
        source_with(&[("p.pdf", InMemoryDocument::new("p", pages))]),
        Arc::new(MemoryStore::new()),
        move |b| b.chunk_size(20).progress_callback(cb),
    );

    d.digest_documents(&[PathBuf::from("p.pdf")]).await.unwrap();
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["run 1", "start p 2", "ok p 0", "err p 1", "done p 1/2"]
    );
}
