//! Archive encodings.
//!
//! A [`CompressionKind`] decides both the archive file suffix written on
//! backup and the decode path taken on restore.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Gzip member header magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encoding applied to an image tarball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    /// Raw `docker save` output
    None,
    /// Gzip-compressed tarball
    #[default]
    Gzip,
}

impl CompressionKind {
    /// File suffix for archives of this kind.
    pub fn archive_suffix(&self) -> &'static str {
        match self {
            CompressionKind::None => ".tar",
            CompressionKind::Gzip => ".tar.gz",
        }
    }

    /// Infer the kind from a recognized compressed suffix (`.tar.gz`, `.tgz`).
    ///
    /// Returns `None` when the suffix says nothing; a plain `.tar` is not
    /// proof of an uncompressed archive, so callers fall through to the sidecar.
    pub fn from_path_suffix(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(CompressionKind::Gzip)
        } else {
            None
        }
    }

    /// Report the encoding actually found in the first bytes of a file.
    pub fn sniff(path: &Path) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut magic = [0u8; 2];
        let mut read = 0;
        while read < magic.len() {
            let n = file.read(&mut magic[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        if read == magic.len() && magic == GZIP_MAGIC {
            Ok(CompressionKind::Gzip)
        } else {
            Ok(CompressionKind::None)
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionKind::None => write!(f, "none"),
            CompressionKind::Gzip => write!(f, "gzip"),
        }
    }
}

impl FromStr for CompressionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CompressionKind::None),
            "gzip" => Ok(CompressionKind::Gzip),
            other => Err(format!(
                "unknown compression type: {other} (expected gzip or none)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_archive_suffix() {
        assert_eq!(CompressionKind::None.archive_suffix(), ".tar");
        assert_eq!(CompressionKind::Gzip.archive_suffix(), ".tar.gz");
    }

    #[test]
    fn test_from_path_suffix() {
        assert_eq!(
            CompressionKind::from_path_suffix(&PathBuf::from("/b/img.tar.gz")),
            Some(CompressionKind::Gzip)
        );
        assert_eq!(
            CompressionKind::from_path_suffix(&PathBuf::from("img.tgz")),
            Some(CompressionKind::Gzip)
        );
        assert_eq!(
            CompressionKind::from_path_suffix(&PathBuf::from("img.tar")),
            None
        );
        assert_eq!(
            CompressionKind::from_path_suffix(&PathBuf::from("img.gz.tar")),
            None
        );
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("gzip".parse::<CompressionKind>().unwrap(), CompressionKind::Gzip);
        assert_eq!(" NONE ".parse::<CompressionKind>().unwrap(), CompressionKind::None);
        assert!("zstd".parse::<CompressionKind>().is_err());
        assert_eq!(CompressionKind::Gzip.to_string(), "gzip");
        assert_eq!(CompressionKind::None.to_string(), "none");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&CompressionKind::Gzip).unwrap(),
            "\"gzip\""
        );
        let kind: CompressionKind = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(kind, CompressionKind::None);
    }

    #[test]
    fn test_default_is_gzip() {
        assert_eq!(CompressionKind::default(), CompressionKind::Gzip);
    }

    #[test]
    fn test_sniff() {
        let tmp = TempDir::new().unwrap();

        let gz = tmp.path().join("a.bin");
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        std::io::Write::write_all(&mut encoder, b"tar bytes").unwrap();
        std::fs::write(&gz, encoder.finish().unwrap()).unwrap();
        assert_eq!(CompressionKind::sniff(&gz).unwrap(), CompressionKind::Gzip);

        let plain = tmp.path().join("b.bin");
        std::fs::write(&plain, b"plain tar").unwrap();
        assert_eq!(CompressionKind::sniff(&plain).unwrap(), CompressionKind::None);

        let empty = tmp.path().join("c.bin");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(CompressionKind::sniff(&empty).unwrap(), CompressionKind::None);

        assert!(CompressionKind::sniff(&tmp.path().join("missing")).is_err());
    }
}
