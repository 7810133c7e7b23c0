//! Configuration types for a digest run.
//!
//! All pipeline behaviour is controlled through [`DigestConfig`], built via
//! its [`DigestConfigBuilder`]. Collaborators that carry state (the
//! summarisation backend, the progress callback) can be injected here too;
//! storage is passed separately because it is scoped to a single run.

use crate::error::DigestError;
use crate::pipeline::backend::SummaryBackend;
use crate::pipeline::render::RenderOptions;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default generate endpoint of a locally running summarisation service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default model requested from the generate endpoint.
pub const DEFAULT_MODEL: &str = "mistral";

/// Configuration for a digest run.
///
/// # Example
/// ```rust
/// use pdf_digest::DigestConfig;
///
/// let config = DigestConfig::builder()
///     .chunk_size(2000)
///     .concurrency(4)
///     .model("llama3.1")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Maximum chunk length in characters. Default: 3000.
    ///
    /// Also the buffer threshold at which the text extractor emits chunks.
    pub chunk_size: usize,

    /// Instruction placed ahead of every chunk. If None, uses
    /// [`crate::prompts::DEFAULT_INSTRUCTION`].
    pub instruction: Option<String>,

    /// Model requested from the generate endpoint (or the hosted provider).
    /// Default: "mistral".
    pub model: String,

    /// URL of the generate endpoint. Default: local service on port 11434.
    pub endpoint: String,

    /// Bearer token for a remote generate endpoint.
    pub api_key: Option<String>,

    /// Hosted provider name (e.g. "openai", "anthropic"). When set, chunks go
    /// through that provider instead of the generate endpoint.
    pub provider_name: Option<String>,

    /// Pre-constructed backend. Takes precedence over everything above.
    pub backend: Option<Arc<dyn SummaryBackend>>,

    /// Per-chunk backend timeout. Default: 120 s.
    pub request_timeout: Duration,

    /// Number of chunks in flight at once. Default: 1 (strictly sequential).
    ///
    /// Results are always returned in chunk order whatever this is set to.
    pub concurrency: usize,

    /// Vector regions must be strictly larger than this in both dimensions
    /// (page units) to become figures. Default: 100.
    pub min_figure_size: f32,

    /// Zoom factor for rasterising vector regions. Default: 2.0.
    pub figure_zoom: f32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Explicit path to a pdfium shared library.
    pub pdfium_library: Option<PathBuf>,

    /// Page layout of the rendered summary document.
    pub render: RenderOptions,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 3000,
            instruction: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            provider_name: None,
            backend: None,
            request_timeout: Duration::from_secs(120),
            concurrency: 1,
            min_figure_size: 100.0,
            figure_zoom: 2.0,
            download_timeout_secs: 120,
            pdfium_library: None,
            render: RenderOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("chunk_size", &self.chunk_size)
            .field("instruction", &self.instruction)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn SummaryBackend>"))
            .field("request_timeout", &self.request_timeout)
            .field("concurrency", &self.concurrency)
            .field("min_figure_size", &self.min_figure_size)
            .field("figure_zoom", &self.figure_zoom)
            .field("pdfium_library", &self.pdfium_library)
            .field("render", &self.render)
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction prefix in effect.
    pub fn instruction(&self) -> &str {
        self.instruction
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_INSTRUCTION)
    }
}

/// Builder for [`DigestConfig`].
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl fmt::Debug for DigestConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl DigestConfigBuilder {
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn SummaryBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn min_figure_size(mut self, size: f32) -> Self {
        self.config.min_figure_size = size;
        self
    }

    pub fn figure_zoom(mut self, zoom: f32) -> Self {
        self.config.figure_zoom = zoom;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn summary_title(mut self, title: impl Into<String>) -> Self {
        self.config.render.title = title.into();
        self
    }

    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.config.render = options;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(DigestError::InvalidConfig(
                "chunk size must be ≥ 1".into(),
            ));
        }
        if c.request_timeout.is_zero() {
            return Err(DigestError::InvalidConfig(
                "request timeout must be > 0".into(),
            ));
        }
        if !(c.figure_zoom.is_finite() && c.figure_zoom > 0.0) {
            return Err(DigestError::InvalidConfig(format!(
                "figure zoom must be > 0, got {}",
                c.figure_zoom
            )));
        }
        if !(c.min_figure_size.is_finite() && c.min_figure_size >= 0.0) {
            return Err(DigestError::InvalidConfig(format!(
                "minimum figure size must be ≥ 0, got {}",
                c.min_figure_size
            )));
        }
        if c.backend.is_none() && c.provider_name.is_none() && c.endpoint.trim().is_empty() {
            return Err(DigestError::InvalidConfig(
                "endpoint must not be empty".into(),
            ));
        }
        c.render.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DigestConfig::default();
        assert_eq!(c.chunk_size, 3000);
        assert_eq!(c.request_timeout, Duration::from_secs(120));
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.model, "mistral");
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.min_figure_size, 100.0);
        assert_eq!(c.figure_zoom, 2.0);
        assert_eq!(c.instruction(), crate::prompts::DEFAULT_INSTRUCTION);
    }

    #[test]
    fn builder_rejects_zero_chunk_size() {
        let err = DigestConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(DigestConfig::builder()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = DigestConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = DigestConfig::builder()
            .api_key("secret-token")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn custom_instruction_overrides_default() {
        let c = DigestConfig::builder()
            .instruction("TL;DR:\n")
            .build()
            .unwrap();
        assert_eq!(c.instruction(), "TL;DR:\n");
    }
}
