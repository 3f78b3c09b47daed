//! Backup pipeline: inspect → name → save (+compress) → write sidecar.
//!
//! Each step is sequential within one item. A failure stops that item only.
//! Files are not cleaned up on failure: a failed save can leave a partial
//! archive, and a failed sidecar write leaves an archive without metadata.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::compression::CompressionKind;
use crate::config::VaultConfig;
use crate::engine::ImageEngine;
use crate::error::{Result, VaultError};
use crate::metadata::{sidecar_path, ArchiveMetadata};
use crate::naming;
use crate::orchestrator::{run_bounded, BatchReport};

/// Files produced by one successful backup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupOutcome {
    pub item: String,
    pub archive: PathBuf,
    pub sidecar: PathBuf,
    pub compression: CompressionKind,
    /// Size of the archive on disk
    pub archive_size: u64,
}

/// Per-item backup task.
#[derive(Clone)]
pub struct BackupPipeline {
    config: Arc<VaultConfig>,
    engine: Arc<dyn ImageEngine>,
}

impl BackupPipeline {
    pub fn new(config: Arc<VaultConfig>, engine: Arc<dyn ImageEngine>) -> Self {
        Self { config, engine }
    }

    /// Back up one image. Errors are logged here and returned to the caller.
    pub fn run(&self, item: &str) -> Result<BackupOutcome> {
        let result = self.run_at(item, Utc::now());
        if let Err(ref e) = result {
            tracing::error!("Backup of {} failed: {}", item, e);
        }
        result
    }

    fn run_at(&self, item: &str, now: DateTime<Utc>) -> Result<BackupOutcome> {
        tracing::debug!("Starting backup of image: {}", item);

        let details = self.engine.inspect(item)?;

        let kind = self.config.compression;
        let archive = naming::archive_path(&self.config.backup_dir, item, kind, &now);
        let sidecar = sidecar_path(&archive);

        match kind {
            CompressionKind::Gzip => tracing::info!(
                "Saving image {} to {} (gzip compressed)...",
                item,
                archive.display()
            ),
            CompressionKind::None => {
                tracing::info!("Saving image {} to {}...", item, archive.display())
            }
        }
        self.save_archive(item, &archive, kind)?;

        let archive_size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);

        let metadata = ArchiveMetadata {
            image_name: item.to_string(),
            image_id: details.id,
            tags: details.repo_tags,
            size_bytes: details.size,
            backup_timestamp: Utc::now(),
            compression_kind: kind,
        };
        if let Err(e) = metadata.write_to(&sidecar) {
            tracing::warn!(
                "Archive {} was written but has no metadata",
                archive.display()
            );
            return Err(e);
        }

        tracing::info!(
            "Successfully backed up image {} to {}",
            item,
            archive.display()
        );

        Ok(BackupOutcome {
            item: item.to_string(),
            archive,
            sidecar,
            compression: kind,
            archive_size,
        })
    }

    /// Stream the engine's raw save output into `archive`, compressing if asked.
    fn save_archive(&self, item: &str, archive: &Path, kind: CompressionKind) -> Result<()> {
        let file = File::create(archive).map_err(|e| VaultError::ItemExternalTool {
            item: item.to_string(),
            tool: "create archive".to_string(),
            message: format!("{}: {e}", archive.display()),
        })?;
        let writer = BufWriter::new(file);

        match kind {
            CompressionKind::None => {
                let mut writer = writer;
                self.engine.save(item, &mut writer)?;
                writer.flush().map_err(|e| VaultError::ItemExternalTool {
                    item: item.to_string(),
                    tool: "write archive".to_string(),
                    message: e.to_string(),
                })
            }
            CompressionKind::Gzip => {
                let level = Compression::new(self.config.compression_level);
                let mut encoder = GzEncoder::new(writer, level);
                self.engine.save(item, &mut encoder)?;
                encoder
                    .finish()
                    .and_then(|mut w| w.flush())
                    .map_err(|e| VaultError::ItemExternalTool {
                        item: item.to_string(),
                        tool: "gzip".to_string(),
                        message: e.to_string(),
                    })
            }
        }
    }

    /// Back up every item with at most `max_workers` in flight.
    pub async fn backup_all(&self, items: Vec<String>) -> BatchReport<String, BackupOutcome> {
        let pipeline = self.clone();
        let report = run_bounded(items, self.config.max_workers, move |item: String| {
            pipeline.run(&item)
        })
        .await;

        tracing::info!(
            "All backup operations completed ({} succeeded, {} failed)",
            report.succeeded().count(),
            report.failed().count()
        );
        report
    }
}

/// Make sure the backup directory exists before any worker starts.
pub fn prepare_backup_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        VaultError::FatalInput(format!(
            "Failed to create backup directory {}: {}",
            dir.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImageDetails;
    use crate::memory::MemoryEngine;
    use chrono::TimeZone;
    use std::io::Read;
    use tempfile::TempDir;

    fn engine_with(images: &[(&str, &str)]) -> Arc<MemoryEngine> {
        let engine = Arc::new(MemoryEngine::new());
        for &(reference, tarball) in images {
            engine.add_image(
                reference,
                ImageDetails {
                    id: format!("sha256:{}", reference.len()),
                    repo_tags: vec![reference.to_string()],
                    size: tarball.len() as u64,
                },
                tarball.as_bytes().to_vec(),
            );
        }
        engine
    }

    fn pipeline(dir: &Path, kind: CompressionKind, engine: Arc<MemoryEngine>) -> BackupPipeline {
        let config = VaultConfig {
            backup_dir: dir.to_path_buf(),
            compression: kind,
            max_workers: 2,
            ..Default::default()
        };
        BackupPipeline::new(Arc::new(config), engine)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_backup_gzip_writes_archive_and_sidecar() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with(&[("demo:1.0", "raw image tarball")]);
        let p = pipeline(tmp.path(), CompressionKind::Gzip, engine);

        let outcome = p.run_at("demo:1.0", fixed_now()).unwrap();
        assert_eq!(
            outcome.archive,
            tmp.path().join("demo_1.0-20240309-140507.tar.gz")
        );
        assert_eq!(
            outcome.sidecar,
            tmp.path().join("demo_1.0-20240309-140507.tar.gz.json")
        );
        assert!(outcome.archive_size > 0);

        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(File::open(&outcome.archive).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, b"raw image tarball");

        let meta = ArchiveMetadata::read_from(&outcome.sidecar).unwrap();
        assert_eq!(meta.image_name, "demo:1.0");
        assert_eq!(meta.image_id, "sha256:8");
        assert_eq!(meta.tags, vec!["demo:1.0"]);
        assert_eq!(meta.compression_kind, CompressionKind::Gzip);
    }

    #[test]
    fn test_backup_none_writes_raw_tar() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with(&[("library/redis:7", "redis tar")]);
        let p = pipeline(tmp.path(), CompressionKind::None, engine);

        let outcome = p.run_at("library/redis:7", fixed_now()).unwrap();
        assert_eq!(
            outcome.archive.file_name().unwrap(),
            "library_redis_7-20240309-140507.tar"
        );
        assert_eq!(std::fs::read(&outcome.archive).unwrap(), b"redis tar");
        let meta = ArchiveMetadata::read_from(&outcome.sidecar).unwrap();
        assert_eq!(meta.compression_kind, CompressionKind::None);
    }

    #[test]
    fn test_inspect_failure_creates_nothing() {
        let tmp = TempDir::new().unwrap();
        let p = pipeline(tmp.path(), CompressionKind::Gzip, engine_with(&[]));

        let err = p.run("ghost:latest").unwrap_err();
        assert!(matches!(err, VaultError::ItemInspection { .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_failure_leaves_partial_archive_without_sidecar() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with(&[("demo:1.0", "x")]);
        engine.break_save("demo:1.0");
        let p = pipeline(tmp.path(), CompressionKind::None, engine);

        let err = p.run_at("demo:1.0", fixed_now()).unwrap_err();
        assert!(matches!(err, VaultError::ItemExternalTool { .. }));

        let archive = tmp.path().join("demo_1.0-20240309-140507.tar");
        assert!(archive.exists());
        assert!(!sidecar_path(&archive).exists());
    }

    #[test]
    fn test_sidecar_failure_keeps_orphan_archive() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with(&[("demo:1.0", "payload")]);
        let p = pipeline(tmp.path(), CompressionKind::None, engine);

        // A directory squatting on the sidecar name makes the write fail.
        let archive = tmp.path().join("demo_1.0-20240309-140507.tar");
        std::fs::create_dir(sidecar_path(&archive)).unwrap();

        let err = p.run_at("demo:1.0", fixed_now()).unwrap_err();
        assert!(matches!(err, VaultError::ItemMetadata { .. }));
        assert_eq!(std::fs::read(&archive).unwrap(), b"payload");
    }

    #[test]
    fn test_missing_backup_dir_is_item_failure() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with(&[("demo:1.0", "x")]);
        let p = pipeline(&tmp.path().join("absent"), CompressionKind::Gzip, engine);

        let err = p.run("demo:1.0").unwrap_err();
        assert!(matches!(err, VaultError::ItemExternalTool { .. }));
    }

    #[test]
    fn test_prepare_backup_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b");
        prepare_backup_dir(&dir).unwrap();
        assert!(dir.is_dir());

        let file = tmp.path().join("file");
        std::fs::write(&file, "x").unwrap();
        let err = prepare_backup_dir(&file.join("sub")).unwrap_err();
        assert!(matches!(err, VaultError::FatalInput(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_backup_all_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_with(&[("a:1", "aaa"), ("b:1", "bbb"), ("c:1", "ccc")]);
        let p = pipeline(tmp.path(), CompressionKind::Gzip, engine);

        let items = vec![
            "a:1".to_string(),
            "missing:1".to_string(),
            "b:1".to_string(),
            "c:1".to_string(),
        ];
        let report = p.backup_all(items).await;

        assert_eq!(report.len(), 4);
        assert_eq!(report.succeeded().count(), 3);
        let failed: Vec<_> = report.failed().map(|o| o.item.as_str()).collect();
        assert_eq!(failed, vec!["missing:1"]);

        let archives = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tar.gz"))
            .count();
        assert_eq!(archives, 3);
    }
}
