use std::path::PathBuf;

use thiserror::Error;

/// Image vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    /// Nothing to do, or the batch cannot start at all
    #[error("Fatal input error: {0}")]
    FatalInput(String),

    /// The engine could not describe the source image
    #[error("Inspect failed for {item}: {message}")]
    ItemInspection { item: String, message: String },

    /// A save/load/compress/decompress stage failed
    #[error("{tool} failed for {item}: {message}")]
    ItemExternalTool {
        item: String,
        tool: String,
        message: String,
    },

    /// Sidecar write or parse failure
    #[error("Metadata error at {}: {message}", path.display())]
    ItemMetadata { path: PathBuf, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl VaultError {
    /// Whether this error aborts the whole invocation rather than one item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VaultError::FatalInput(_) | VaultError::ConfigError(_))
    }
}

/// Result type alias for image vault operations
pub type Result<T> = std::result::Result<T, VaultError>;
