//! `image-vault restore` command: load images back from tarballs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use image_vault_core::RestorePipeline;

use crate::inputs::{resolve_items, ItemSource};
use crate::output;

#[derive(Args)]
pub struct RestoreArgs {
    /// Tarball paths to restore
    pub paths: Vec<String>,

    /// Maximum number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Read tarball paths from file (one per line)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Read tarball paths from stdin (one per line)
    #[arg(short, long)]
    pub stdin: bool,
}

pub async fn execute(
    args: RestoreArgs,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let paths: Vec<PathBuf> = resolve_items(
        ItemSource {
            positional: &args.paths,
            file: args.file.as_deref(),
            stdin: args.stdin,
        },
        "tarball paths",
    )?
    .into_iter()
    .map(PathBuf::from)
    .collect();

    let config = super::build_config(
        config_path,
        super::Overrides {
            max_workers: args.workers,
            verbose: args.verbose,
            ..Default::default()
        },
    )?;

    let engine = super::open_engine(&config);
    let pipeline = RestorePipeline::new(Arc::new(config), engine);
    let report = pipeline.restore_all(paths).await;

    let mut table = output::new_table(&["STATUS", "ARCHIVE", "COMPRESSION", "OUTPUT"]);
    for outcome in report.outcomes() {
        let archive = outcome.item.display().to_string();
        match &outcome.result {
            Ok(done) => {
                table.add_row([
                    "ok".to_string(),
                    archive,
                    done.compression.to_string(),
                    output::one_line(&done.output),
                ]);
            }
            Err(e) => {
                table.add_row([
                    "failed".to_string(),
                    archive,
                    "-".to_string(),
                    output::one_line(&e.to_string()),
                ]);
            }
        }
    }
    println!("{table}");
    println!("All restore operations completed");

    let failed = report.failed().count();
    if failed > 0 {
        return Err(format!("{failed} of {} restores failed", report.len()).into());
    }
    Ok(())
}
