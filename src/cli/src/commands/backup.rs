//! `image-vault backup` command: save images as tarballs with metadata sidecars.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use image_vault_core::{prepare_backup_dir, BackupPipeline, CompressionKind};

use crate::inputs::{resolve_items, ItemSource};
use crate::output;

#[derive(Args)]
pub struct BackupArgs {
    /// Image references to back up (e.g., "nginx:latest")
    pub images: Vec<String>,

    /// Directory to store backups
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Maximum number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Compression type (gzip, none)
    #[arg(short, long)]
    pub compress: Option<CompressionKind>,

    /// Read image names from file (one per line)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Read image names from stdin (one per line)
    #[arg(short, long)]
    pub stdin: bool,
}

pub async fn execute(
    args: BackupArgs,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let items = resolve_items(
        ItemSource {
            positional: &args.images,
            file: args.file.as_deref(),
            stdin: args.stdin,
        },
        "image names",
    )?;

    let config = super::build_config(
        config_path,
        super::Overrides {
            backup_dir: args.dir,
            max_workers: args.workers,
            verbose: args.verbose,
            compression: args.compress,
        },
    )?;

    prepare_backup_dir(&config.backup_dir)?;

    let engine = super::open_engine(&config);
    let pipeline = BackupPipeline::new(Arc::new(config), engine);
    let report = pipeline.backup_all(items).await;

    let mut table = output::new_table(&["STATUS", "IMAGE", "ARCHIVE", "SIZE"]);
    for outcome in report.outcomes() {
        match &outcome.result {
            Ok(done) => {
                table.add_row([
                    "ok".to_string(),
                    outcome.item.clone(),
                    done.archive.display().to_string(),
                    output::format_bytes(done.archive_size),
                ]);
            }
            Err(e) => {
                table.add_row([
                    "failed".to_string(),
                    outcome.item.clone(),
                    output::one_line(&e.to_string()),
                    "-".to_string(),
                ]);
            }
        }
    }
    println!("{table}");
    println!("All backup operations completed");

    let failed = report.failed().count();
    if failed > 0 {
        return Err(format!("{failed} of {} backups failed", report.len()).into());
    }
    Ok(())
}
