//! Container engine boundary.
//!
//! The pipelines only need three things from an engine: describe an image,
//! stream it out as a tarball, and stream a tarball back in. [`CliEngine`]
//! drives any docker-CLI-compatible binary over explicit pipes; tests use an
//! in-memory implementation.
//!
//! All methods block. They are called from orchestrator worker threads.

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::error::{Result, VaultError};

/// What the engine reports about an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    /// Content identifier (e.g., "sha256:...")
    pub id: String,
    /// Repository tags, possibly empty
    pub repo_tags: Vec<String>,
    /// Image size in bytes
    pub size: u64,
}

/// Operations a container engine must provide.
pub trait ImageEngine: Send + Sync {
    /// Describe an image by reference.
    fn inspect(&self, reference: &str) -> Result<ImageDetails>;

    /// Write the raw (uncompressed) image tarball into `sink`.
    fn save(&self, reference: &str, sink: &mut dyn Write) -> Result<()>;

    /// Load a raw image tarball read from `source`.
    ///
    /// `item` only labels errors. Returns the engine's combined output.
    fn load(&self, item: &str, source: &mut (dyn Read + Send)) -> Result<String>;
}

/// Raw `image inspect` record; only the fields the sidecar needs.
#[derive(Debug, Deserialize)]
struct InspectRecord {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "RepoTags", default)]
    repo_tags: Option<Vec<String>>,
    #[serde(rename = "Size", default)]
    size: i64,
}

/// Engine backed by a docker-compatible command line.
#[derive(Debug, Clone)]
pub struct CliEngine {
    binary: String,
}

impl CliEngine {
    /// Create an engine that invokes `binary` (e.g., "docker", "podman").
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn tool(&self, verb: &str) -> String {
        format!("{} {}", self.binary, verb)
    }
}

impl ImageEngine for CliEngine {
    fn inspect(&self, reference: &str) -> Result<ImageDetails> {
        tracing::debug!("{} image inspect {}", self.binary, reference);

        let output = Command::new(&self.binary)
            .args(["image", "inspect", "--format", "{{json .}}", reference])
            .output()
            .map_err(|e| VaultError::ItemInspection {
                item: reference.to_string(),
                message: format!("Failed to run {}: {e}", self.binary),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VaultError::ItemInspection {
                item: reference.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        parse_inspect_output(&output.stdout).map_err(|message| VaultError::ItemInspection {
            item: reference.to_string(),
            message,
        })
    }

    fn save(&self, reference: &str, sink: &mut dyn Write) -> Result<()> {
        let tool = self.tool("save");
        tracing::debug!("{} {}", tool, reference);

        let mut child = Command::new(&self.binary)
            .args(["save", reference])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VaultError::ItemExternalTool {
                item: reference.to_string(),
                tool: tool.clone(),
                message: format!("Failed to spawn: {e}"),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stderr on its own thread so a chatty engine cannot stall the
        // stdout copy.
        let (copied, stderr_text) = std::thread::scope(|s| {
            let stderr_reader = s.spawn(move || read_all_lossy(stderr));
            let copied = match stdout {
                Some(mut out) => std::io::copy(&mut out, sink),
                None => Err(std::io::Error::other("engine stdout not captured")),
            };
            let text = stderr_reader.join().unwrap_or_default();
            (copied, text)
        });

        if copied.is_err() {
            let _ = child.kill();
        }
        let status = child.wait().map_err(|e| VaultError::ItemExternalTool {
            item: reference.to_string(),
            tool: tool.clone(),
            message: format!("Failed to wait: {e}"),
        })?;

        if !status.success() {
            return Err(VaultError::ItemExternalTool {
                item: reference.to_string(),
                tool,
                message: format!("{status}: {}", stderr_text.trim()),
            });
        }

        match copied {
            Ok(bytes) => {
                tracing::debug!("{} streamed {} bytes", tool, bytes);
                Ok(())
            }
            Err(e) => Err(VaultError::ItemExternalTool {
                item: reference.to_string(),
                tool,
                message: format!("Failed to write archive: {e}"),
            }),
        }
    }

    fn load(&self, item: &str, source: &mut (dyn Read + Send)) -> Result<String> {
        let tool = self.tool("load");
        tracing::debug!("{} < {}", tool, item);

        let mut child = Command::new(&self.binary)
            .arg("load")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VaultError::ItemExternalTool {
                item: item.to_string(),
                tool: tool.clone(),
                message: format!("Failed to spawn: {e}"),
            })?;

        let stdin = child.stdin.take();

        let (fed, output) = std::thread::scope(|s| {
            let feeder = s.spawn(move || match stdin {
                Some(mut input) => {
                    let result = std::io::copy(source, &mut input);
                    // Closing stdin tells the engine the tarball is complete
                    drop(input);
                    result
                }
                None => Err(std::io::Error::other("engine stdin not captured")),
            });
            let output = child.wait_with_output();
            let fed = feeder
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("archive reader panicked")));
            (fed, output)
        });

        let output = output.map_err(|e| VaultError::ItemExternalTool {
            item: item.to_string(),
            tool: tool.clone(),
            message: format!("Failed to wait: {e}"),
        })?;

        let combined = combined_output(&output.stdout, &output.stderr);

        if !output.status.success() {
            let mut message = format!("{}\n{}", output.status, combined.trim_end());
            if let Err(e) = fed {
                message.push_str(&format!("\n(archive stream error: {e})"));
            }
            return Err(VaultError::ItemExternalTool {
                item: item.to_string(),
                tool,
                message,
            });
        }

        if let Err(e) = fed {
            return Err(VaultError::ItemExternalTool {
                item: item.to_string(),
                tool,
                message: format!("Failed to stream archive: {e}\n{}", combined.trim_end()),
            });
        }

        Ok(combined)
    }
}

/// Parse `image inspect` JSON. Accepts a single object (`--format {{json .}}`)
/// or the default array form.
fn parse_inspect_output(stdout: &[u8]) -> std::result::Result<ImageDetails, String> {
    let value: serde_json::Value =
        serde_json::from_slice(stdout).map_err(|e| format!("Invalid inspect output: {e}"))?;

    let record_value = match value {
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                return Err("Inspect returned no images".to_string());
            }
            items.swap_remove(0)
        }
        other => other,
    };

    let record: InspectRecord = serde_json::from_value(record_value)
        .map_err(|e| format!("Unexpected inspect output: {e}"))?;

    Ok(ImageDetails {
        id: record.id,
        repo_tags: record.repo_tags.unwrap_or_default(),
        size: u64::try_from(record.size).unwrap_or(0),
    })
}

fn read_all_lossy<R: Read>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        let _ = r.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    let err = String::from_utf8_lossy(stderr);
    if !err.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&err);
    }
    text
}
