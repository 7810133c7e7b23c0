//! Summary document rendering: aggregated text → paginated PDF.
//!
//! Rendering is split in two. [`layout`] is a pure function from text to
//! lines-per-page, using Helvetica advance widths for word wrapping.
//! [`render_pdf`] serialises a layout with lopdf using the two standard
//! Helvetica faces, so no font files are embedded.

use crate::error::DigestError;
use crate::output::SummaryArtifact;
use crate::storage::ArtifactStore;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;
use tracing::debug;

/// Page geometry and typography of the summary document. Units are points.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub title: String,
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub title_size: f32,
    pub body_size: f32,
    /// Baseline-to-baseline distance of body lines.
    pub line_height: f32,
}

impl Default for RenderOptions {
    /// A4 with 15 mm margins.
    fn default() -> Self {
        Self {
            title: "Summary".to_string(),
            page_width: 595.0,
            page_height: 842.0,
            margin: 42.5,
            title_size: 16.0,
            body_size: 12.0,
            line_height: 16.0,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), DigestError> {
        let positive = [
            self.page_width,
            self.page_height,
            self.title_size,
            self.body_size,
            self.line_height,
        ];
        if positive.iter().any(|v| !v.is_finite() || *v <= 0.0) || self.margin < 0.0 {
            return Err(DigestError::InvalidConfig(
                "page size, font sizes and line height must be > 0".into(),
            ));
        }
        if self.text_width() <= 0.0 || self.lines_per_page(false) == 0 {
            return Err(DigestError::InvalidConfig(
                "margins leave no room for body text".into(),
            ));
        }
        Ok(())
    }

    fn text_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    /// Vertical space the title occupies on the first page.
    fn title_block(&self) -> f32 {
        self.title_size * 2.5
    }

    fn lines_per_page(&self, first: bool) -> usize {
        let mut available = self.page_height - 2.0 * self.margin;
        if first {
            available -= self.title_block();
        }
        if available <= 0.0 {
            return 0;
        }
        (available / self.line_height).floor() as usize
    }
}

// ── font metrics ─────────────────────────────────────────────────────────

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Helvetica-Bold advance widths for ASCII 32..=126.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, //
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, //
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, //
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, //
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

const FALLBACK_WIDTH: u16 = 556;

fn advance(table: &[u16; 95], c: char) -> u16 {
    match c as u32 {
        cp @ 32..=126 => table[(cp - 32) as usize],
        _ => FALLBACK_WIDTH,
    }
}

/// Width of `s` in points when set in Helvetica at `size`.
pub fn text_width(s: &str, size: f32) -> f32 {
    text_units(s) as f32 * size / 1000.0
}

/// Advance of `s` in glyph-space units (1/1000 em).
fn text_units(s: &str) -> u32 {
    s.chars().map(|c| u32::from(advance(&HELVETICA, c))).sum()
}

fn bold_text_width(s: &str, size: f32) -> f32 {
    s.chars().map(|c| advance(&HELVETICA_BOLD, c) as f32).sum::<f32>() * size / 1000.0
}

/// Encode `s` as WinAnsi bytes. Unmappable characters become `?`.
pub fn win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            0x09 => b' ',
            _ => match c {
                '€' => 0x80,
                '‚' => 0x82,
                'ƒ' => 0x83,
                '„' => 0x84,
                '…' => 0x85,
                '†' => 0x86,
                '‡' => 0x87,
                'ˆ' => 0x88,
                '‰' => 0x89,
                'Š' => 0x8a,
                '‹' => 0x8b,
                'Œ' => 0x8c,
                'Ž' => 0x8e,
                '\u{2018}' => 0x91,
                '\u{2019}' => 0x92,
                '\u{201c}' => 0x93,
                '\u{201d}' => 0x94,
                '•' => 0x95,
                '–' => 0x96,
                '—' => 0x97,
                '˜' => 0x98,
                '™' => 0x99,
                'š' => 0x9a,
                '›' => 0x9b,
                'œ' => 0x9c,
                'ž' => 0x9e,
                'Ÿ' => 0x9f,
                _ => b'?',
            },
        })
        .collect()
}

// ── layout ───────────────────────────────────────────────────────────────

/// Body lines per page; the title sits on the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLayout {
    pub pages: Vec<Vec<String>>,
}

impl SummaryLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Word-wrap one paragraph to `max_width`. Words wider than a line are
/// broken at character boundaries.
pub fn wrap_paragraph(paragraph: &str, max_width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in paragraph.split_whitespace() {
        if text_width(word, size) > max_width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let mut piece = String::new();
            for c in word.chars() {
                piece.push(c);
                if piece.chars().count() > 1 && text_width(&piece, size) > max_width {
                    piece.pop();
                    lines.push(std::mem::take(&mut piece));
                    piece.push(c);
                }
            }
            line = piece;
            continue;
        }

        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };
        // Measure the joined line once so rounding can't push an exact fit over.
        if text_width(&candidate, size) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }

    lines.push(line);
    lines
}

/// Lay out `text` into pages. Explicit newlines start new lines; blank
/// lines are kept.
pub fn layout(text: &str, opts: &RenderOptions) -> SummaryLayout {
    let width = opts.text_width();
    let lines: Vec<String> = text
        .replace("\r\n", "\n")
        .trim_end()
        .split('\n')
        .flat_map(|p| wrap_paragraph(p, width, opts.body_size))
        .collect();

    let mut pages: Vec<Vec<String>> = vec![Vec::new()];
    let mut capacity = opts.lines_per_page(true);
    for line in lines {
        while pages.last().map(|p| p.len()).unwrap_or(0) >= capacity {
            pages.push(Vec::new());
            capacity = opts.lines_per_page(false).max(1);
        }
        if let Some(page) = pages.last_mut() {
            page.push(line);
        }
    }
    if text.trim().is_empty() {
        pages.truncate(1);
        pages[0].clear();
    }
    SummaryLayout { pages }
}

// ── PDF serialisation ────────────────────────────────────────────────────

fn literal(s: &str) -> Object {
    Object::String(win_ansi(s), StringFormat::Literal)
}

fn page_content(
    lines: &[String],
    first: bool,
    opts: &RenderOptions,
) -> Result<Vec<u8>, std::io::Error> {
    let mut ops = Vec::new();
    let mut top = opts.page_height - opts.margin;

    if first {
        let title_width = bold_text_width(&opts.title, opts.title_size);
        let x = ((opts.page_width - title_width) / 2.0).max(opts.margin);
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec!["F2".into(), opts.title_size.into()]));
        ops.push(Operation::new("Td", vec![x.into(), (top - opts.title_size).into()]));
        ops.push(Operation::new("Tj", vec![literal(&opts.title)]));
        ops.push(Operation::new("ET", vec![]));
        top -= opts.title_block();
    }

    if !lines.is_empty() {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec!["F1".into(), opts.body_size.into()]));
        ops.push(Operation::new("TL", vec![opts.line_height.into()]));
        ops.push(Operation::new("Td", vec![opts.margin.into(), (top - opts.body_size).into()]));
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("T*", vec![]));
            }
            if !line.is_empty() {
                ops.push(Operation::new("Tj", vec![literal(line)]));
            }
        }
        ops.push(Operation::new("ET", vec![]));
    }

    let raw = Content { operations: ops }
        .encode()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    encoder.finish()
}

/// Serialise `layout` as a PDF. Returns the bytes.
pub fn render_pdf(layout: &SummaryLayout, opts: &RenderOptions) -> Result<Vec<u8>, DigestError> {
    let fail = |detail: String| DigestError::RenderFailed {
        id: opts.title.clone(),
        detail,
    };

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let title_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => body_font, "F2" => title_font },
    });

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(layout.pages.len());
    for (i, lines) in layout.pages.iter().enumerate() {
        let content = page_content(lines, i == 0, opts).map_err(|e| fail(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            content,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), opts.page_width.into(), opts.page_height.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::from(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|e| fail(e.to_string()))?;
    Ok(bytes)
}

/// Stable artifact id for a document's summary.
pub fn summary_id(document_id: &str) -> String {
    format!("{document_id}_summary")
}

pub fn summary_key(id: &str) -> String {
    format!("summaries/{id}.pdf")
}

/// Render `text` for `document_id` and store it. Re-rendering the same
/// document overwrites the previous artifact.
pub fn render_summary(
    document_id: &str,
    text: &str,
    opts: &RenderOptions,
    store: &dyn ArtifactStore,
) -> Result<SummaryArtifact, DigestError> {
    let id = summary_id(document_id);
    let layout = layout(text, opts);
    let bytes = render_pdf(&layout, opts).map_err(|e| match e {
        DigestError::RenderFailed { detail, .. } => DigestError::RenderFailed {
            id: id.clone(),
            detail,
        },
        other => other,
    })?;
    let key = summary_key(&id);
    let location = store.write(&key, &bytes)?;
    debug!("Rendered {} ({} page(s), {} bytes)", key, layout.page_count(), bytes.len());
    Ok(SummaryArtifact {
        id,
        key,
        location,
        pages: layout.page_count(),
        size_bytes: bytes.len(),
    })
}
