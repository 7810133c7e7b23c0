//! Document Source: open a PDF and expose what the extractors need, page by
//! page.
//!
//! Production documents are read through pdfium (text, vector path bounds,
//! rasterisation) and lopdf (embedded image streams in their native
//! encoding). pdfium documents borrow the library binding, so a source hands
//! out documents through a visitor instead of returning them.
//!
//! All coordinates are page points with a top-left origin.

use crate::error::DigestError;
use crate::pipeline::encode;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::Object;
use pdfium_render::prelude::*;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Axis-aligned box in page points, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// An image embedded in a page, in its stored encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `jpeg` or `png`.
    pub extension: String,
}

/// An opened document. Page indices are 0-based.
pub trait Document {
    /// Display name, normally the file stem.
    fn name(&self) -> &str;

    fn page_count(&self) -> usize;

    fn page_text(&self, page: usize) -> Result<String, DigestError>;

    /// Embedded images in the page's enumeration order, including those
    /// drawn through Form XObjects. Images that cannot be decoded and
    /// inline images are left out.
    fn page_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, DigestError>;

    /// Bounding boxes of the page's vector drawings.
    fn page_drawings(&self, page: usize) -> Result<Vec<BBox>, DigestError>;

    /// Rasterise `clip` at `zoom` (1.0 = 72 dpi).
    fn render_clip(&self, page: usize, clip: BBox, zoom: f32) -> Result<DynamicImage, DigestError>;
}

/// Opens documents. Sources are shared across blocking tasks.
pub trait DocumentSource: Send + Sync {
    /// Open `path` and hand the document to `visit`.
    fn open(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn Document) -> Result<(), DigestError>,
    ) -> Result<(), DigestError>;
}

/// Document name used for ids and figure file names.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ── pdfium + lopdf ───────────────────────────────────────────────────────

/// Production source backed by pdfium and lopdf.
#[derive(Debug, Clone, Default)]
pub struct PdfiumSource {
    library_path: Option<PathBuf>,
}

impl PdfiumSource {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }
}

/// Bind pdfium from an explicit path, `PDFIUM_LIB_PATH`, the working
/// directory, then the system library.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, DigestError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from("./"));

    for candidate in candidates {
        let lib = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&candidate)
        } else {
            candidate
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => debug!("pdfium not usable at {}: {:?}", lib.display(), e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| DigestError::PdfiumBindingFailed(format!("{:?}", e)))
}

impl DocumentSource for PdfiumSource {
    fn open(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn Document) -> Result<(), DigestError>,
    ) -> Result<(), DigestError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => DigestError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DigestError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let document = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(|e| DigestError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

        let objects = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(
                    "Embedded images unavailable for {}: {}",
                    path.display(),
                    e
                );
                None
            }
        };

        let doc = PdfiumDocument {
            name: document_name(path),
            path: path.to_path_buf(),
            document,
            objects,
            renders: PageRenderCache::default(),
        };
        debug!("Opened {} ({} pages)", path.display(), doc.page_count());
        visit(&doc)
    }
}

struct PdfiumDocument<'a> {
    name: String,
    path: PathBuf,
    document: PdfDocument<'a>,
    objects: Option<lopdf::Document>,
    renders: PageRenderCache,
}

/// The last full-page raster, so several regions cropped from one page
/// share a single render.
#[derive(Default)]
struct PageRenderCache {
    slot: RefCell<Option<(usize, u32, DynamicImage)>>,
}

impl PageRenderCache {
    fn with_page<T, E>(
        &self,
        page: usize,
        zoom: f32,
        render: impl FnOnce() -> Result<DynamicImage, E>,
        use_render: impl FnOnce(&DynamicImage) -> T,
    ) -> Result<T, E> {
        let key = zoom.to_bits();
        let mut slot = self.slot.borrow_mut();
        let image = match slot.take() {
            Some((p, z, image)) if p == page && z == key => image,
            _ => render()?,
        };
        let out = use_render(&image);
        *slot = Some((page, key, image));
        Ok(out)
    }
}

impl PdfiumDocument<'_> {
    fn corrupt(&self, page: usize, e: impl std::fmt::Debug) -> DigestError {
        DigestError::CorruptPdf {
            path: self.path.clone(),
            detail: format!("page {}: {:?}", page + 1, e),
        }
    }

    fn page(&self, page: usize) -> Result<PdfPage<'_>, DigestError> {
        let idx = u16::try_from(page).map_err(|e| self.corrupt(page, e))?;
        self.document
            .pages()
            .get(idx)
            .map_err(|e| self.corrupt(page, e))
    }
}

impl Document for PdfiumDocument<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, page: usize) -> Result<String, DigestError> {
        let pdf_page = self.page(page)?;
        let text = pdf_page.text().map_err(|e| self.corrupt(page, e))?;
        Ok(text.all())
    }

    fn page_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, DigestError> {
        Ok(self
            .objects
            .as_ref()
            .map(|doc| lopdf_page_images(doc, page))
            .unwrap_or_default())
    }

    fn page_drawings(&self, page: usize) -> Result<Vec<BBox>, DigestError> {
        let pdf_page = self.page(page)?;
        let page_height = pdf_page.height().value;
        let mut boxes = Vec::new();
        for object in pdf_page.objects().iter() {
            if object.object_type() != PdfPageObjectType::Path {
                continue;
            }
            let rect = match object.bounds() {
                Ok(quad) => quad.to_rect(),
                Err(e) => {
                    debug!("Path object without bounds on page {}: {:?}", page + 1, e);
                    continue;
                }
            };
            boxes.push(BBox::new(
                rect.left().value,
                page_height - rect.top().value,
                rect.right().value,
                page_height - rect.bottom().value,
            ));
        }
        Ok(boxes)
    }

    fn render_clip(&self, page: usize, clip: BBox, zoom: f32) -> Result<DynamicImage, DigestError> {
        let pdf_page = self.page(page)?;
        let page_width = pdf_page.width().value;
        let page_height = pdf_page.height().value;

        let cropped = self.renders.with_page(
            page,
            zoom,
            || {
                let config = PdfRenderConfig::new().scale_page_by_factor(zoom);
                pdf_page
                    .render_with_config(&config)
                    .map(|bitmap| bitmap.as_image())
                    .map_err(|e| self.corrupt(page, e))
            },
            |rendered| crop_to_clip(rendered, page_width, page_height, clip),
        )?;
        cropped.ok_or_else(|| self.corrupt(page, format!("region {clip:?} is outside the page")))
    }
}

/// Crop a full-page raster to `clip` (top-left origin page points).
///
/// Edges are rounded outwards to whole pixels; `None` if the clip does not
/// overlap the page.
pub fn crop_to_clip(
    rendered: &DynamicImage,
    page_width: f32,
    page_height: f32,
    clip: BBox,
) -> Option<DynamicImage> {
    let (image_width, image_height) = (rendered.width(), rendered.height());
    if image_width == 0 || image_height == 0 || page_width <= 0.0 || page_height <= 0.0 {
        return None;
    }
    let scale_x = image_width as f32 / page_width;
    let scale_y = image_height as f32 / page_height;

    let x0 = clip.x0.min(clip.x1).clamp(0.0, page_width);
    let x1 = clip.x0.max(clip.x1).clamp(0.0, page_width);
    let y0 = clip.y0.min(clip.y1).clamp(0.0, page_height);
    let y1 = clip.y0.max(clip.y1).clamp(0.0, page_height);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let left = ((x0 * scale_x).floor().max(0.0) as u32).min(image_width);
    let right = ((x1 * scale_x).ceil().max(0.0) as u32).min(image_width);
    let top = ((y0 * scale_y).floor().max(0.0) as u32).min(image_height);
    let bottom = ((y1 * scale_y).ceil().max(0.0) as u32).min(image_height);
    if right <= left || bottom <= top {
        return None;
    }
    Some(rendered.crop_imm(left, top, right - left, bottom - top))
}

// ── lopdf embedded images ────────────────────────────────────────────────

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// The page's resource dictionary, following `Parent` inheritance.
fn page_resources(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Option<&lopdf::Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..32 {
        if let Ok(res) = node.get(b"Resources") {
            return resolve(doc, res)?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent)?.as_dict().ok()?;
    }
    None
}

/// Native file extension for an image stream's final filter.
pub fn native_extension(filter: &[u8]) -> Option<&'static str> {
    match filter {
        b"DCTDecode" => Some("jpeg"),
        b"JPXDecode" => Some("jpx"),
        b"JBIG2Decode" => Some("jb2"),
        _ => None,
    }
}

fn last_filter(dict: &lopdf::Dictionary) -> Option<Vec<u8>> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(items) => items.iter().rev().find_map(|o| match o {
            Object::Name(name) => Some(name.clone()),
            _ => None,
        }),
        _ => None,
    }
}

fn dict_u32(doc: &lopdf::Document, dict: &lopdf::Dictionary, key: &[u8]) -> Option<u32> {
    let v = resolve(doc, dict.get(key).ok()?)?.as_i64().ok()?;
    u32::try_from(v).ok()
}

/// Embedded images of one page (0-based), in resource-dictionary order.
///
/// Form XObjects are searched depth-first where they appear; an image
/// referenced more than once is listed once. Inline images (`BI`/`EI` in
/// the content stream) are not covered.
pub fn lopdf_page_images(doc: &lopdf::Document, page: usize) -> Vec<EmbeddedImage> {
    let Some(page_id) = doc.get_pages().values().nth(page).copied() else {
        return Vec::new();
    };
    let mut images = Vec::new();
    if let Some(resources) = page_resources(doc, page_id) {
        let mut seen = HashSet::new();
        collect_xobject_images(doc, resources, page, 0, &mut seen, &mut images);
    }
    images
}

const MAX_FORM_DEPTH: usize = 8;

fn collect_xobject_images(
    doc: &lopdf::Document,
    resources: &lopdf::Dictionary,
    page: usize,
    depth: usize,
    seen: &mut HashSet<lopdf::ObjectId>,
    images: &mut Vec<EmbeddedImage>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| resolve(doc, x))
        .and_then(|x| x.as_dict().ok())
    else {
        return;
    };

    for (name, value) in xobjects.iter() {
        if let Object::Reference(id) = value {
            if !seen.insert(*id) {
                continue;
            }
        }
        let label = String::from_utf8_lossy(name);
        let Some(stream) = resolve(doc, value).and_then(|o| o.as_stream().ok()) else {
            continue;
        };
        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(n)) if n == b"Image" => match decode_image_stream(doc, stream) {
                Ok(image) => images.push(image),
                Err(e) => warn!("Skipping image {} on page {}: {}", label, page + 1, e),
            },
            Ok(Object::Name(n)) if n == b"Form" => {
                if depth >= MAX_FORM_DEPTH {
                    debug!("Form {} on page {} nested too deep", label, page + 1);
                    continue;
                }
                if let Some(inner) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve(doc, r))
                    .and_then(|r| r.as_dict().ok())
                {
                    collect_xobject_images(doc, inner, page, depth + 1, seen, images);
                }
            }
            _ => {}
        }
    }
}

fn decode_image_stream(
    doc: &lopdf::Document,
    stream: &lopdf::Stream,
) -> Result<EmbeddedImage, String> {
    let filter = last_filter(&stream.dict);
    if let Some(ext) = filter.as_deref().and_then(native_extension) {
        return Ok(EmbeddedImage {
            bytes: stream.content.clone(),
            extension: ext.to_string(),
        });
    }

    let samples = if filter.is_some() {
        stream.decompressed_content().map_err(|e| e.to_string())?
    } else {
        stream.content.clone()
    };
    let width = dict_u32(doc, &stream.dict, b"Width").ok_or("missing Width")?;
    let height = dict_u32(doc, &stream.dict, b"Height").ok_or("missing Height")?;
    let bpc = dict_u32(doc, &stream.dict, b"BitsPerComponent").unwrap_or(8);
    let bpc = u8::try_from(bpc).map_err(|e| e.to_string())?;

    let image = encode::image_from_samples(width, height, bpc, &samples)?;
    let bytes = encode::encode_png(&image).map_err(|e| e.to_string())?;
    Ok(EmbeddedImage {
        bytes,
        extension: "png".to_string(),
    })
}

// ── in-memory ────────────────────────────────────────────────────────────

/// One page of an [`InMemoryDocument`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPage {
    pub text: String,
    pub images: Vec<EmbeddedImage>,
    pub drawings: Vec<BBox>,
    /// Page size in points; defaults to A4 when zero.
    pub width: f32,
    pub height: f32,
}

impl InMemoryPage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, bytes: impl Into<Vec<u8>>, extension: &str) -> Self {
        self.images.push(EmbeddedImage {
            bytes: bytes.into(),
            extension: extension.to_string(),
        });
        self
    }

    pub fn with_drawing(mut self, bbox: BBox) -> Self {
        self.drawings.push(bbox);
        self
    }

    fn size(&self) -> (f32, f32) {
        if self.width > 0.0 && self.height > 0.0 {
            (self.width, self.height)
        } else {
            (595.0, 842.0)
        }
    }
}

/// A document held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    pub name: String,
    pub pages: Vec<InMemoryPage>,
}

impl InMemoryDocument {
    pub fn new(name: impl Into<String>, pages: Vec<InMemoryPage>) -> Self {
        Self {
            name: name.into(),
            pages,
        }
    }

    fn page(&self, page: usize) -> Result<&InMemoryPage, DigestError> {
        self.pages.get(page).ok_or_else(|| DigestError::CorruptPdf {
            path: PathBuf::from(&self.name),
            detail: format!("page {} out of range", page + 1),
        })
    }
}

impl Document for InMemoryDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, DigestError> {
        Ok(self.page(page)?.text.clone())
    }

    fn page_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, DigestError> {
        Ok(self.page(page)?.images.clone())
    }

    fn page_drawings(&self, page: usize) -> Result<Vec<BBox>, DigestError> {
        Ok(self.page(page)?.drawings.clone())
    }

    /// Paints a deterministic page pattern, then crops it like a real render.
    fn render_clip(&self, page: usize, clip: BBox, zoom: f32) -> Result<DynamicImage, DigestError> {
        let p = self.page(page)?;
        let (w, h) = p.size();
        let (pw, ph) = ((w * zoom).round() as u32, (h * zoom).round() as u32);
        let seed = page as u32;
        let rendered = DynamicImage::ImageRgb8(RgbImage::from_fn(pw, ph, |x, y| {
            Rgb([(x / 8 + seed) as u8, (y / 8) as u8, ((x ^ y) & 0xff) as u8])
        }));
        crop_to_clip(&rendered, w, h, clip).ok_or_else(|| DigestError::CorruptPdf {
            path: PathBuf::from(&self.name),
            detail: format!("region {clip:?} is outside page {}", page + 1),
        })
    }
}

/// Source serving [`InMemoryDocument`]s keyed by path.
///
/// A path that is not registered verbatim falls back to a document
/// registered under its bare file name, so documents unpacked into a
/// temporary directory still resolve.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    documents: HashMap<PathBuf, InMemoryDocument>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `path`.
    pub fn with_document(mut self, path: impl Into<PathBuf>, document: InMemoryDocument) -> Self {
        self.documents.insert(path.into(), document);
        self
    }

    fn lookup(&self, path: &Path) -> Option<&InMemoryDocument> {
        self.documents.get(path).or_else(|| {
            let name = path.file_name()?;
            self.documents.get(Path::new(name))
        })
    }
}

impl DocumentSource for InMemorySource {
    fn open(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn Document) -> Result<(), DigestError>,
    ) -> Result<(), DigestError> {
        let doc = self.lookup(path).ok_or_else(|| DigestError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        visit(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn pdf_with_images() -> lopdf::Document {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let jpeg = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "BitsPerComponent" => 8,
                "ColorSpace" => "DeviceRGB",
                "Filter" => "DCTDecode",
            },
            b"\xff\xd8fake-jpeg\xff\xd9".to_vec(),
        ));
        let raw = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "BitsPerComponent" => 8,
                "ColorSpace" => "DeviceRGB",
            },
            vec![255, 0, 0, 0, 0, 255],
        ));
        let form = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            Vec::new(),
        ));

        let resources = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im1" => jpeg, "Fm1" => form, "Im2" => raw },
        });
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc
    }

    #[test]
    fn lopdf_images_native_and_reencoded() {
        let doc = pdf_with_images();
        let images = lopdf_page_images(&doc, 0);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].extension, "jpeg");
        assert_eq!(images[0].bytes, b"\xff\xd8fake-jpeg\xff\xd9");
        assert_eq!(images[1].extension, "png");
        assert_eq!(&images[1].bytes[..4], b"\x89PNG");
        assert!(lopdf_page_images(&doc, 3).is_empty());
    }

    #[test]
    fn images_inside_forms_are_found_once() {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let form_id = doc.new_object_id();

        let shared = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "Filter" => "DCTDecode",
            },
            b"\xff\xd8shared\xff\xd9".to_vec(),
        ));
        let nested = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "Filter" => "DCTDecode",
            },
            b"\xff\xd8nested\xff\xd9".to_vec(),
        ));
        // The form draws itself again; the walk must not loop.
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "Resources" => dictionary! {
                        "XObject" => dictionary! { "Im9" => nested, "Im1" => shared, "Fm1" => form_id },
                    },
                },
                Vec::new(),
            )),
        );
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im1" => shared, "Fm1" => form_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);

        let images = lopdf_page_images(&doc, 0);
        let bytes: Vec<&[u8]> = images.iter().map(|i| i.bytes.as_slice()).collect();
        assert_eq!(
            bytes,
            vec![&b"\xff\xd8shared\xff\xd9"[..], &b"\xff\xd8nested\xff\xd9"[..]]
        );
    }

    #[test]
    fn native_extensions() {
        assert_eq!(native_extension(b"DCTDecode"), Some("jpeg"));
        assert_eq!(native_extension(b"JPXDecode"), Some("jpx"));
        assert_eq!(native_extension(b"JBIG2Decode"), Some("jb2"));
        assert_eq!(native_extension(b"FlateDecode"), None);
    }

    #[test]
    fn crop_scales_and_rounds_outwards() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(200, 400));
        let cropped = crop_to_clip(&img, 100.0, 200.0, BBox::new(10.2, 20.0, 60.0, 70.5)).unwrap();
        // x: floor(20.4)=20 .. ceil(120)=120; y: floor(40)=40 .. ceil(141)=141
        assert_eq!((cropped.width(), cropped.height()), (100, 101));
        assert!(crop_to_clip(&img, 100.0, 200.0, BBox::new(150.0, 0.0, 180.0, 10.0)).is_none());
    }

    #[test]
    fn in_memory_render_is_deterministic() {
        let doc = InMemoryDocument::new("d", vec![InMemoryPage::text("x")]);
        let clip = BBox::new(50.0, 50.0, 250.0, 200.0);
        let a = doc.render_clip(0, clip, 2.0).unwrap();
        let b = doc.render_clip(0, clip, 2.0).unwrap();
        assert_eq!((a.width(), a.height()), (400, 300));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn in_memory_source_visits_registered_documents() {
        let source = InMemorySource::new().with_document(
            "a.pdf",
            InMemoryDocument::new("a", vec![InMemoryPage::text("hello")]),
        );
        let mut seen = String::new();
        source
            .open(Path::new("a.pdf"), &mut |doc| {
                seen = doc.page_text(0)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, "hello");
        assert!(matches!(
            source.open(Path::new("b.pdf"), &mut |_| Ok(())),
            Err(DigestError::FileNotFound { .. })
        ));
    }

    #[test]
    fn page_render_is_reused_until_the_page_changes() {
        let cache = PageRenderCache::default();
        let renders = std::cell::Cell::new(0);
        let render = || -> Result<DynamicImage, DigestError> {
            renders.set(renders.get() + 1);
            Ok(DynamicImage::ImageRgb8(RgbImage::new(8, 8)))
        };

        for _ in 0..3 {
            let w = cache.with_page(0, 2.0, render, |img| img.width()).unwrap();
            assert_eq!(w, 8);
        }
        assert_eq!(renders.get(), 1);

        cache.with_page(1, 2.0, render, |_| ()).unwrap();
        cache.with_page(1, 1.0, render, |_| ()).unwrap();
        assert_eq!(renders.get(), 3);
    }

    #[test]
    fn bbox_dimensions() {
        let b = BBox::new(10.0, 20.0, 130.0, 90.0);
        assert_eq!(b.width(), 120.0);
        assert_eq!(b.height(), 70.0);
    }
}
