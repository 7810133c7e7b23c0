//! Figure extraction: embedded raster images plus rasterised vector regions.
//!
//! Pages are visited in order. On each page the raster pass runs before the
//! vector pass, and each pass keeps the source's enumeration order. One
//! counter runs across the whole document and across both kinds; vector
//! file names carry it.
//!
//! A region that fails to render is skipped with a warning. A failed
//! storage write aborts the document.

use crate::error::DigestError;
use crate::output::{Figure, FigureKind};
use crate::pipeline::encode;
use crate::pipeline::source::{BBox, Document};
use crate::storage::ArtifactStore;
use tracing::{debug, warn};

/// Knobs for the vector pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigureOptions {
    /// Regions must be strictly larger than this in both dimensions.
    pub min_size: f32,
    /// Rasterisation zoom (1.0 = 72 dpi).
    pub zoom: f32,
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            min_size: 100.0,
            zoom: 2.0,
        }
    }
}

impl FigureOptions {
    /// Whether a drawing is large enough to count as a figure.
    pub fn accepts(&self, bbox: &BBox) -> bool {
        bbox.width() > self.min_size && bbox.height() > self.min_size
    }
}

pub fn raster_filename(document_id: &str, page: usize, index: usize, ext: &str) -> String {
    format!("{document_id}_page{page}_img{index}.{ext}")
}

pub fn vector_filename(page: usize, counter: usize) -> String {
    format!("vector_figure_{page}_{counter}.png")
}

pub fn figure_key(document_id: &str, filename: &str) -> String {
    format!("figures/{document_id}/{filename}")
}

struct FigureWriter<'a> {
    document_id: &'a str,
    store: &'a dyn ArtifactStore,
    figures: Vec<Figure>,
}

impl FigureWriter<'_> {
    fn write(
        &mut self,
        page: usize,
        kind: FigureKind,
        index: usize,
        extension: &str,
        filename: String,
        bytes: &[u8],
    ) -> Result<(), DigestError> {
        let key = figure_key(self.document_id, &filename);
        let location = self.store.write(&key, bytes)?;
        debug!("Figure {} ({} bytes)", key, bytes.len());
        self.figures.push(Figure {
            document_id: self.document_id.to_string(),
            page,
            kind,
            index,
            extension: extension.to_string(),
            filename,
            key,
            location,
            size_bytes: bytes.len(),
        });
        Ok(())
    }
}

/// Extract every figure of `doc`, store it, and return the descriptors in
/// page / pass / enumeration order.
pub fn extract_figures(
    doc: &dyn Document,
    document_id: &str,
    store: &dyn ArtifactStore,
    opts: &FigureOptions,
) -> Result<Vec<Figure>, DigestError> {
    let mut writer = FigureWriter {
        document_id,
        store,
        figures: Vec::new(),
    };
    let mut counter = 0usize;

    for idx in 0..doc.page_count() {
        let page = idx + 1;

        match doc.page_images(idx) {
            Ok(images) => {
                for (i, image) in images.iter().enumerate() {
                    let filename = raster_filename(document_id, page, i + 1, &image.extension);
                    writer.write(
                        page,
                        FigureKind::Raster,
                        i + 1,
                        &image.extension,
                        filename,
                        &image.bytes,
                    )?;
                    counter += 1;
                }
            }
            Err(e) => warn!("{}: images of page {} unavailable: {}", document_id, page, e),
        }

        let drawings = match doc.page_drawings(idx) {
            Ok(d) => d,
            Err(e) => {
                warn!("{}: drawings of page {} unavailable: {}", document_id, page, e);
                continue;
            }
        };

        let mut vector_index = 0usize;
        for bbox in drawings.iter().filter(|b| opts.accepts(b)) {
            let png = match doc
                .render_clip(idx, *bbox, opts.zoom)
                .and_then(|img| {
                    encode::encode_png(&img).map_err(|e| DigestError::Internal(e.to_string()))
                }) {
                Ok(png) => png,
                Err(e) => {
                    warn!(
                        "{}: skipping vector region {:?} on page {}: {}",
                        document_id, bbox, page, e
                    );
                    continue;
                }
            };
            vector_index += 1;
            counter += 1;
            writer.write(
                page,
                FigureKind::VectorCrop,
                vector_index,
                "png",
                vector_filename(page, counter),
                &png,
            )?;
        }
    }

    debug!("{}: {} figure(s)", document_id, writer.figures.len());
    Ok(writer.figures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{InMemoryDocument, InMemoryPage};
    use crate::storage::MemoryStore;

    fn sample() -> InMemoryDocument {
        InMemoryDocument::new(
            "paper",
            vec![
                InMemoryPage::text("one")
                    .with_image(b"jpeg-1".to_vec(), "jpeg")
                    .with_drawing(BBox::new(0.0, 0.0, 300.0, 200.0))
                    .with_drawing(BBox::new(0.0, 0.0, 300.0, 100.0))
                    .with_image(b"png-2".to_vec(), "png"),
                InMemoryPage::text("two").with_drawing(BBox::new(10.0, 10.0, 150.0, 150.0)),
            ],
        )
    }

    #[test]
    fn order_names_and_counter() {
        let store = MemoryStore::new();
        let figs = extract_figures(&sample(), "paper", &store, &FigureOptions::default()).unwrap();
        let names: Vec<_> = figs.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "paper_page1_img1.jpeg",
                "paper_page1_img2.png",
                "vector_figure_1_3.png",
                "vector_figure_2_4.png",
            ]
        );
        assert_eq!(figs[2].kind, FigureKind::VectorCrop);
        assert_eq!(figs[3].index, 1);
        assert_eq!(figs[3].page, 2);
        assert_eq!(store.len(), 4);
        assert_eq!(store.read("figures/paper/paper_page1_img1.jpeg").unwrap(), b"jpeg-1");
    }

    #[test]
    fn threshold_is_strict_on_both_dimensions() {
        let opts = FigureOptions::default();
        assert!(opts.accepts(&BBox::new(0.0, 0.0, 101.0, 101.0)));
        assert!(!opts.accepts(&BBox::new(0.0, 0.0, 100.0, 500.0)));
        assert!(!opts.accepts(&BBox::new(0.0, 0.0, 500.0, 100.0)));
    }

    #[test]
    fn off_page_region_is_skipped() {
        let doc = InMemoryDocument::new(
            "d",
            vec![InMemoryPage::text("")
                .with_drawing(BBox::new(2000.0, 2000.0, 2200.0, 2200.0))
                .with_drawing(BBox::new(0.0, 0.0, 200.0, 200.0))],
        );
        let store = MemoryStore::new();
        let figs = extract_figures(&doc, "d", &store, &FigureOptions::default()).unwrap();
        assert_eq!(figs.len(), 1);
        assert_eq!(figs[0].filename, "vector_figure_1_1.png");
    }

    #[test]
    fn reextraction_is_byte_identical() {
        let (a, b) = (MemoryStore::new(), MemoryStore::new());
        let opts = FigureOptions::default();
        let fa = extract_figures(&sample(), "paper", &a, &opts).unwrap();
        let fb = extract_figures(&sample(), "paper", &b, &opts).unwrap();
        assert_eq!(fa.len(), fb.len());
        for f in &fa {
            assert_eq!(a.read(&f.key).unwrap(), b.read(&f.key).unwrap());
        }
    }
}
