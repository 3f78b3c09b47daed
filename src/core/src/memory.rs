//! In-memory [`ImageEngine`] for tests.
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `test-util` feature.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::Mutex;

use crate::engine::{ImageDetails, ImageEngine};
use crate::error::{Result, VaultError};

#[derive(Debug, Clone)]
struct StoredImage {
    details: ImageDetails,
    tarball: Vec<u8>,
}

/// Engine holding image tarballs in memory. Thread-safe via Mutex.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    images: Mutex<HashMap<String, StoredImage>>,
    broken_saves: Mutex<HashSet<String>>,
    loaded: Mutex<Vec<Vec<u8>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image whose `save` output is `tarball`.
    pub fn add_image(&self, reference: &str, details: ImageDetails, tarball: Vec<u8>) {
        if let Ok(mut images) = self.images.lock() {
            images.insert(reference.to_string(), StoredImage { details, tarball });
        }
    }

    /// Make `save` fail for `reference` after inspect succeeds.
    pub fn break_save(&self, reference: &str) {
        if let Ok(mut broken) = self.broken_saves.lock() {
            broken.insert(reference.to_string());
        }
    }

    /// Raw tarballs received by `load`, in call order.
    pub fn loaded(&self) -> Vec<Vec<u8>> {
        self.loaded.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn find(&self, reference: &str) -> Option<StoredImage> {
        self.images
            .lock()
            .ok()
            .and_then(|images| images.get(reference).cloned())
    }

    fn find_by_tarball(&self, tarball: &[u8]) -> Option<(String, StoredImage)> {
        let images = self.images.lock().ok()?;
        images
            .iter()
            .find(|(_, img)| img.tarball == tarball)
            .map(|(r, img)| (r.clone(), img.clone()))
    }
}

fn poisoned(item: &str, tool: &str) -> VaultError {
    VaultError::ItemExternalTool {
        item: item.to_string(),
        tool: tool.to_string(),
        message: "engine state poisoned".to_string(),
    }
}

impl ImageEngine for MemoryEngine {
    fn inspect(&self, reference: &str) -> Result<ImageDetails> {
        self.find(reference)
            .map(|img| img.details)
            .ok_or_else(|| VaultError::ItemInspection {
                item: reference.to_string(),
                message: format!("No such image: {reference}"),
            })
    }

    fn save(&self, reference: &str, sink: &mut dyn Write) -> Result<()> {
        let broken = self
            .broken_saves
            .lock()
            .map_err(|_| poisoned(reference, "memory save"))?
            .contains(reference);
        if broken {
            return Err(VaultError::ItemExternalTool {
                item: reference.to_string(),
                tool: "memory save".to_string(),
                message: "simulated save failure".to_string(),
            });
        }

        let image = self.find(reference).ok_or_else(|| VaultError::ItemExternalTool {
            item: reference.to_string(),
            tool: "memory save".to_string(),
            message: format!("No such image: {reference}"),
        })?;

        sink.write_all(&image.tarball)
            .map_err(|e| VaultError::ItemExternalTool {
                item: reference.to_string(),
                tool: "memory save".to_string(),
                message: e.to_string(),
            })
    }

    fn load(&self, item: &str, source: &mut (dyn Read + Send)) -> Result<String> {
        let mut tarball = Vec::new();
        source
            .read_to_end(&mut tarball)
            .map_err(|e| VaultError::ItemExternalTool {
                item: item.to_string(),
                tool: "memory load".to_string(),
                message: format!("Failed to read archive: {e}"),
            })?;

        if tarball.is_empty() {
            return Err(VaultError::ItemExternalTool {
                item: item.to_string(),
                tool: "memory load".to_string(),
                message: "unexpected EOF".to_string(),
            });
        }

        let output = match self.find_by_tarball(&tarball) {
            Some((reference, _)) => format!("Loaded image: {reference}\n"),
            None => format!("Loaded image ID: unknown ({} bytes)\n", tarball.len()),
        };

        self.loaded
            .lock()
            .map_err(|_| poisoned(item, "memory load"))?
            .push(tarball);

        Ok(output)
    }
}
