//! CLI command definitions and dispatch.

mod backup;
mod list;
mod restore;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use image_vault_core::{CliEngine, CompressionKind, ImageEngine, VaultConfig};

/// Image Vault: back up container images as tarballs and restore them.
#[derive(Parser)]
#[command(name = "image-vault", version, about)]
pub struct Cli {
    /// Config file (default: ~/.image-vault/config.yaml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Whether the selected subcommand asked for verbose output.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Command::Backup(args) => args.verbose,
            Command::Restore(args) => args.verbose,
            Command::List(args) => args.verbose,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Back up images as tarballs
    Backup(backup::BackupArgs),
    /// Restore images from tarballs
    Restore(restore::RestoreArgs),
    /// List available backups
    List(list::ListArgs),
}

/// Command-line values that override the config file.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub backup_dir: Option<PathBuf>,
    pub max_workers: Option<usize>,
    pub verbose: bool,
    pub compression: Option<CompressionKind>,
}

/// Load the config file, apply command-line overrides and validate the
/// settings the backup and restore pipelines rely on.
pub(crate) fn build_config(
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<VaultConfig, Box<dyn std::error::Error>> {
    let config = load_config(config_path, overrides)?;
    config.validate()?;
    Ok(config)
}

/// Load the config file and apply command-line overrides without validation.
/// Used by read-only commands that ignore worker and engine settings.
pub(crate) fn load_config(
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<VaultConfig, Box<dyn std::error::Error>> {
    let mut config = VaultConfig::load(config_path)?;

    if let Some(dir) = overrides.backup_dir {
        config.backup_dir = dir;
    }
    if let Some(workers) = overrides.max_workers {
        config.max_workers = workers;
    }
    if overrides.verbose {
        config.verbose = true;
    }
    if let Some(compression) = overrides.compression {
        config.compression = compression;
    }
    Ok(config)
}

/// Create the engine the pipelines talk to.
pub(crate) fn open_engine(config: &VaultConfig) -> Arc<dyn ImageEngine> {
    Arc::new(CliEngine::new(config.engine.clone()))
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Backup(args) => backup::execute(args, config_path).await,
        Command::Restore(args) => restore::execute(args, config_path).await,
        Command::List(args) => list::execute(args, config_path).await,
    }
}
