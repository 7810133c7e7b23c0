//! Input resolution: turn the user-supplied string into a local path and
//! decide whether it names a single document or a bundle.
//!
//! URLs are downloaded into a `TempDir` owned by the [`ResolvedInput`], so
//! the file stays alive for the whole run and is removed when the run ends.
//! Classification looks at content, not file names: `%PDF` is a document,
//! the gzip magic is a `.tar.gz` bundle, a directory is a directory bundle.

use crate::error::DigestError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What kind of input the run was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A single PDF document.
    Document,
    /// A gzip-compressed tar archive of documents.
    TarGz,
    /// A directory of documents.
    Directory,
}

impl InputKind {
    pub fn is_bundle(self) -> bool {
        !matches!(self, InputKind::Document)
    }
}

/// The resolved input: a local path plus its classification.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    kind: InputKind,
    /// Keeps a downloaded file alive until the run completes.
    _temp_dir: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn is_downloaded(&self) -> bool {
        self._temp_dir.is_some()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local, classified path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DigestError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DigestError::MissingInput);
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.contains("://") {
        Err(DigestError::UnsupportedInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(Path::new(input))
    }
}

/// Resolve a local path, validating existence and content type.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, DigestError> {
    let kind = classify(path)?;
    debug!("Resolved local input {} as {:?}", path.display(), kind);
    Ok(ResolvedInput {
        path: path.to_path_buf(),
        kind,
        _temp_dir: None,
    })
}

/// Classify a local path by its content.
pub fn classify(path: &Path) -> Result<InputKind, DigestError> {
    if !path.exists() {
        return Err(DigestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if path.is_dir() {
        return Ok(InputKind::Directory);
    }

    let mut magic = [0u8; 4];
    let read = match std::fs::File::open(path) {
        Ok(mut f) => read_prefix(&mut f, &mut magic),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DigestError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(DigestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };
    classify_magic(&magic[..read]).ok_or_else(|| DigestError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

fn read_prefix(f: &mut std::fs::File, buf: &mut [u8; 4]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match f.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}

/// Classify the leading bytes of a file.
pub fn classify_magic(prefix: &[u8]) -> Option<InputKind> {
    if prefix.starts_with(PDF_MAGIC) {
        Some(InputKind::Document)
    } else if prefix.starts_with(&GZIP_MAGIC) {
        Some(InputKind::TarGz)
    } else {
        None
    }
}

/// Download a URL to a temporary directory and classify it.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DigestError> {
    info!("Downloading input from: {}", url);

    let failed = |reason: String| DigestError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            DigestError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    let Some(kind) = classify_magic(&bytes) else {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(DigestError::NotAPdf {
            path: PathBuf::from(url),
            magic,
        });
    };

    let temp_dir = TempDir::new().map_err(|e| DigestError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url, kind));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DigestError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput {
        path: file_path,
        kind,
        _temp_dir: Some(temp_dir),
    })
}

/// Pick a local file name for a download from the last URL path segment.
fn filename_from_url(url: &str, kind: InputKind) -> String {
    let fallback = match kind {
        InputKind::TarGz => "downloaded.tar.gz",
        _ => "downloaded.pdf",
    };
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.') && !last.starts_with('.'))
        .unwrap_or_else(|| fallback.to_string())
}
