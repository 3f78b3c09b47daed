//! Image Vault CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use image_vault_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG overrides the --verbose default
    let default_filter = if cli.verbose() {
        "warn,image_vault_core=debug,image_vault_cli=debug"
    } else {
        "warn,image_vault_core=info,image_vault_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
