//! Sidecar metadata records.
//!
//! Every archive `X` may have a JSON sidecar `X.json` describing the image it
//! holds. Sidecars are written once, right after a successful save, and are
//! only ever read afterwards.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::compression::CompressionKind;
use crate::error::{Result, VaultError};

/// Suffix appended to an archive path to form its sidecar path.
pub const SIDECAR_SUFFIX: &str = ".json";

/// Metadata about one archived image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// The work item the archive was produced from
    pub image_name: String,
    /// Engine-assigned content identifier
    pub image_id: String,
    /// Repository tags at backup time
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    /// Image size reported by the engine
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// When the backup completed
    #[serde(rename = "backup_date")]
    pub backup_timestamp: DateTime<Utc>,
    /// Encoding of the sibling archive
    #[serde(rename = "compress_type")]
    pub compression_kind: CompressionKind,
}

impl ArchiveMetadata {
    /// Serialize to `path` as indented JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut data = serde_json::to_string_pretty(self).map_err(|e| {
            VaultError::ItemMetadata {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        data.push('\n');
        std::fs::write(path, data).map_err(|e| VaultError::ItemMetadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse a sidecar file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| VaultError::ItemMetadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|e| VaultError::ItemMetadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Sidecars written by older tools carry `"tags": null` for untagged images.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Sidecar path for an archive: the archive path with `.json` appended.
pub fn sidecar_path(archive: &Path) -> PathBuf {
    let mut os = archive.as_os_str().to_os_string();
    os.push(SIDECAR_SUFFIX);
    PathBuf::from(os)
}

/// Read the sidecar of `archive` if one exists and parses.
///
/// A missing sidecar is silent; a malformed one is logged and ignored.
pub fn try_read_sidecar(archive: &Path) -> Option<ArchiveMetadata> {
    let path = sidecar_path(archive);
    if !path.is_file() {
        return None;
    }
    match ArchiveMetadata::read_from(&path) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!("Ignoring unreadable sidecar: {}", e);
            None
        }
    }
}
