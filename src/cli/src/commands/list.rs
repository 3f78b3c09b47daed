//! `image-vault list` command.

use std::path::{Path, PathBuf};

use clap::Args;
use comfy_table::Table;
use image_vault_core::{build_catalog, CatalogEntry};

use crate::output;

#[derive(Args)]
pub struct ListArgs {
    /// Backup directory to list
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Show detailed information
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn execute(
    args: ListArgs,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(
        config_path,
        super::Overrides {
            backup_dir: args.dir,
            verbose: args.verbose,
            ..Default::default()
        },
    )?;

    if !config.backup_dir.exists() {
        println!(
            "Backup directory {} does not exist",
            config.backup_dir.display()
        );
        return Ok(());
    }

    let entries = build_catalog(&config.backup_dir)?;
    if entries.is_empty() {
        println!("No backups found");
        return Ok(());
    }

    println!("{}", render(&entries, config.verbose));
    Ok(())
}

/// Build the listing table.
fn render(entries: &[CatalogEntry], verbose: bool) -> Table {
    let mut headers = vec!["FILE", "SIZE", "MODIFIED", "IMAGE", "TAGS"];
    if verbose {
        headers.extend(["ID", "COMPRESSION", "DATE"]);
    }

    let mut table = output::new_table(&headers);
    for entry in entries {
        let created = entry
            .modified
            .as_ref()
            .map(output::format_ago)
            .unwrap_or_else(|| "-".to_string());

        let (image, tags) = match &entry.metadata {
            Some(meta) => (meta.image_name.clone(), meta.tags.join(", ")),
            None => ("-".to_string(), "-".to_string()),
        };

        let mut row = vec![
            entry.file_name.clone(),
            output::format_bytes(entry.size_bytes),
            created,
            image,
            tags,
        ];

        if verbose {
            match &entry.metadata {
                Some(meta) => row.extend([
                    output::short_id(&meta.image_id),
                    meta.compression_kind.to_string(),
                    output::format_timestamp(&meta.backup_timestamp),
                ]),
                None => row.extend([
                    "-".to_string(),
                    "-".to_string(),
                    entry
                        .modified
                        .as_ref()
                        .map(output::format_timestamp)
                        .unwrap_or_else(|| "-".to_string()),
                ]),
            }
        }

        table.add_row(row);
    }
    table
}
