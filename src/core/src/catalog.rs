//! Catalog builder.
//!
//! Reconciles the archives and sidecars found in a backup directory into
//! listing entries. Archives without a usable sidecar are still listed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::metadata::{ArchiveMetadata, SIDECAR_SUFFIX};

/// Archive suffixes recognized when scanning a directory.
pub const ARCHIVE_SUFFIXES: &[&str] = &[".tar", ".tar.gz", ".tgz"];

/// One listable archive.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Archive file name (also the sidecar base name)
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Sidecar contents, when present and valid
    pub metadata: Option<ArchiveMetadata>,
}

/// Whether a file name looks like an archive.
pub fn is_archive_name(name: &str) -> bool {
    ARCHIVE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

struct ArchiveAttrs {
    path: PathBuf,
    size_bytes: u64,
    modified: Option<DateTime<Utc>>,
}

/// Scan `dir` and return its archives sorted by file name.
///
/// A directory that does not exist yields an empty catalog.
pub fn build_catalog(dir: &Path) -> Result<Vec<CatalogEntry>> {
    if !dir.exists() {
        tracing::warn!("Backup directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut archives: BTreeMap<String, ArchiveAttrs> = BTreeMap::new();
    let mut sidecars: HashMap<String, ArchiveMetadata> = HashMap::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        if is_archive_name(&name) {
            let attrs = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            archives.insert(
                name,
                ArchiveAttrs {
                    path,
                    size_bytes: attrs.len(),
                    modified: attrs.modified().ok().map(DateTime::<Utc>::from),
                },
            );
        } else if let Some(base) = name.strip_suffix(SIDECAR_SUFFIX) {
            match ArchiveMetadata::read_from(&path) {
                Ok(meta) => {
                    sidecars.insert(base.to_string(), meta);
                }
                Err(e) => tracing::warn!("Skipping malformed sidecar: {}", e),
            }
        }
    }

    let entries = archives
        .into_iter()
        .map(|(file_name, attrs)| {
            let metadata = sidecars.remove(&file_name);
            CatalogEntry {
                file_name,
                path: attrs.path,
                size_bytes: attrs.size_bytes,
                modified: attrs.modified,
                metadata,
            }
        })
        .collect();

    Ok(entries)
}
