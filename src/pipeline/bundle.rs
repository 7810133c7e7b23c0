//! Bundle unpacking: turn a `.tar.gz` archive or a directory into the
//! ordered list of document paths the run will process.
//!
//! Only `.pdf` files (any case) are eligible. macOS resource forks
//! (`__MACOSX/` trees and `._*` files) are skipped. Archive members are
//! unpacked with [`tar::Entry::unpack_in`], which refuses members whose
//! path would land outside the destination.

use crate::error::DigestError;
use flate2::read::GzDecoder;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Documents found in a bundle, in processing order.
#[derive(Debug)]
pub struct UnpackedBundle {
    pub documents: Vec<PathBuf>,
    /// Scratch directory holding unpacked archive members, if any.
    _temp_dir: Option<TempDir>,
}

impl UnpackedBundle {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Archive Unpacker: `unpack(bundle) -> ordered list of document paths`.
pub trait ArchiveUnpacker: Send + Sync {
    fn unpack(&self, bundle: &Path) -> Result<UnpackedBundle, DigestError>;
}

/// Whether a path inside a bundle names a document the run should process.
pub fn is_eligible(path: &Path) -> bool {
    let forked = path.components().any(|c| match c {
        Component::Normal(s) => s == "__MACOSX",
        _ => false,
    });
    if forked {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("._") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Unpack `bundle` and fail with [`DigestError::NoDocuments`] if nothing
/// eligible was found.
pub fn unpack_non_empty(
    unpacker: &dyn ArchiveUnpacker,
    bundle: &Path,
) -> Result<UnpackedBundle, DigestError> {
    let unpacked = unpacker.unpack(bundle)?;
    if unpacked.is_empty() {
        return Err(DigestError::NoDocuments {
            bundle: bundle.to_path_buf(),
        });
    }
    Ok(unpacked)
}

// ── tar.gz ───────────────────────────────────────────────────────────────

/// Unpacks gzip-compressed tar archives into a run-scoped temp directory.
/// Documents keep their archive order.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzUnpacker;

impl ArchiveUnpacker for TarGzUnpacker {
    fn unpack(&self, bundle: &Path) -> Result<UnpackedBundle, DigestError> {
        let failed = |detail: String| DigestError::BundleFailed {
            bundle: bundle.to_path_buf(),
            detail,
        };

        let file = std::fs::File::open(bundle).map_err(|e| failed(e.to_string()))?;
        let temp_dir = TempDir::new().map_err(|e| DigestError::Internal(e.to_string()))?;
        let mut archive = Archive::new(GzDecoder::new(file));
        let mut documents: Vec<PathBuf> = Vec::new();

        for entry in archive.entries().map_err(|e| failed(e.to_string()))? {
            let mut entry = entry.map_err(|e| failed(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let member = entry.path().map_err(|e| failed(e.to_string()))?.into_owned();
            if !is_eligible(&member) {
                debug!("Skipping bundle member {}", member.display());
                continue;
            }
            let unpacked = entry
                .unpack_in(temp_dir.path())
                .map_err(|e| failed(format!("Unpack failed for {}: {e}", member.display())))?;
            if !unpacked {
                warn!("Refusing bundle member outside archive root: {}", member.display());
                continue;
            }
            let dest = contained_path(temp_dir.path(), &member);
            if !documents.contains(&dest) {
                documents.push(dest);
            }
        }

        debug!("Unpacked {} document(s) from {}", documents.len(), bundle.display());
        Ok(UnpackedBundle {
            documents,
            _temp_dir: Some(temp_dir),
        })
    }
}

/// Where `unpack_in` put `member`: only its normal components, under `root`.
fn contained_path(root: &Path, member: &Path) -> PathBuf {
    let mut dest = root.to_path_buf();
    for part in member.components() {
        if let Component::Normal(part) = part {
            dest.push(part);
        }
    }
    dest
}

// ── directory ────────────────────────────────────────────────────────────

/// Treats a directory tree as a bundle. Entries are visited sorted by file
/// name, so the order is stable across platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryUnpacker;

impl ArchiveUnpacker for DirectoryUnpacker {
    fn unpack(&self, bundle: &Path) -> Result<UnpackedBundle, DigestError> {
        let mut documents = Vec::new();
        collect_dir(bundle, bundle, &mut documents).map_err(|e| DigestError::BundleFailed {
            bundle: bundle.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(UnpackedBundle {
            documents,
            _temp_dir: None,
        })
    }
}

fn collect_dir(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if relative.file_name().is_some_and(|n| n == "__MACOSX") {
                continue;
            }
            collect_dir(root, &path, out)?;
        } else if file_type.is_file() && is_eligible(relative) {
            out.push(path);
        }
    }
    Ok(())
}
