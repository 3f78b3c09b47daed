//! Restore pipeline: detect compression → decode + load → report.
//!
//! Detection priority:
//! 1. a compressed suffix (`.tar.gz`, `.tgz`) means gzip, whatever the sidecar says;
//! 2. otherwise a parseable sidecar's `compress_type`;
//! 3. otherwise uncompressed.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;

use crate::compression::CompressionKind;
use crate::config::VaultConfig;
use crate::engine::ImageEngine;
use crate::error::{Result, VaultError};
use crate::metadata::try_read_sidecar;
use crate::orchestrator::{run_bounded, BatchReport};

/// Result of loading one archive.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    pub archive: PathBuf,
    pub compression: CompressionKind,
    /// Combined output of the engine's load operation
    pub output: String,
}

/// Decide how an archive is encoded.
pub fn detect_compression(path: &Path) -> CompressionKind {
    if let Some(kind) = CompressionKind::from_path_suffix(path) {
        return kind;
    }
    try_read_sidecar(path)
        .map(|meta| meta.compression_kind)
        .unwrap_or(CompressionKind::None)
}

/// Per-item restore task.
#[derive(Clone)]
pub struct RestorePipeline {
    config: Arc<VaultConfig>,
    engine: Arc<dyn ImageEngine>,
}

impl RestorePipeline {
    pub fn new(config: Arc<VaultConfig>, engine: Arc<dyn ImageEngine>) -> Self {
        Self { config, engine }
    }

    /// Load one archive. Errors are logged here and returned to the caller.
    pub fn run(&self, archive: &Path) -> Result<RestoreOutcome> {
        let result = self.restore(archive);
        if let Err(ref e) = result {
            tracing::error!("Failed to load image from {}: {}", archive.display(), e);
        }
        result
    }

    fn restore(&self, archive: &Path) -> Result<RestoreOutcome> {
        let label = archive.display().to_string();
        tracing::debug!("Starting restore of image from: {}", label);

        let kind = detect_compression(archive);
        warn_on_encoding_mismatch(archive, kind);

        let file = File::open(archive).map_err(|e| VaultError::ItemExternalTool {
            item: label.clone(),
            tool: "open archive".to_string(),
            message: e.to_string(),
        })?;
        let reader = BufReader::new(file);

        let output = match kind {
            CompressionKind::Gzip => {
                tracing::info!("Loading compressed image from {}...", label);
                // Concatenated members (pigz, bgzip) decode as one stream
                let mut decoder = MultiGzDecoder::new(reader);
                self.engine.load(&label, &mut decoder)?
            }
            CompressionKind::None => {
                tracing::info!("Loading image from {}...", label);
                let mut reader = reader;
                self.engine.load(&label, &mut reader)?
            }
        };

        tracing::info!("Successfully restored image from {}", label);
        tracing::debug!("Engine output: {}", output.trim_end());

        Ok(RestoreOutcome {
            archive: archive.to_path_buf(),
            compression: kind,
            output,
        })
    }

    /// Restore every archive with at most `max_workers` in flight.
    pub async fn restore_all(&self, archives: Vec<PathBuf>) -> BatchReport<PathBuf, RestoreOutcome> {
        let pipeline = self.clone();
        let report = run_bounded(archives, self.config.max_workers, move |archive: PathBuf| {
            pipeline.run(&archive)
        })
        .await;

        tracing::info!(
            "All restore operations completed ({} succeeded, {} failed)",
            report.succeeded().count(),
            report.failed().count()
        );
        report
    }
}

/// Sidecars are not cross-checked against archive contents; say so when they
/// disagree instead of silently changing the decision.
fn warn_on_encoding_mismatch(archive: &Path, detected: CompressionKind) {
    if let Ok(actual) = CompressionKind::sniff(archive) {
        if actual != detected {
            tracing::warn!(
                "{} looks {}-encoded but will be loaded as {}",
                archive.display(),
                actual,
                detected
            );
        }
    }
}
