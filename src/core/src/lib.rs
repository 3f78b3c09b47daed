//! Image Vault Core - archive and restore container images as portable files.
//!
//! Provides the data model (sidecar metadata, naming, compression kinds), the
//! engine boundary, the bounded batch orchestrator, the backup and restore
//! pipelines, and the catalog builder used for listing.

pub mod backup;
pub mod catalog;
pub mod compression;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod metadata;
pub mod naming;
pub mod orchestrator;
pub mod restore;

// Re-export commonly used types
pub use backup::{prepare_backup_dir, BackupOutcome, BackupPipeline};
pub use catalog::{build_catalog, CatalogEntry};
pub use compression::CompressionKind;
pub use config::VaultConfig;
pub use engine::{CliEngine, ImageDetails, ImageEngine};
pub use error::{Result, VaultError};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryEngine;
pub use metadata::ArchiveMetadata;
pub use orchestrator::{run_bounded, BatchReport, ItemOutcome};
pub use restore::{detect_compression, RestoreOutcome, RestorePipeline};
