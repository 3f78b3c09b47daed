//! Work item sources.
//!
//! Precedence: `--stdin`, then `--file`, then positional arguments. Lines are
//! trimmed and blank lines dropped. Resolving to nothing is fatal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use image_vault_core::VaultError;

/// Where the items for one invocation come from.
#[derive(Debug, Clone, Copy)]
pub struct ItemSource<'a> {
    pub positional: &'a [String],
    pub file: Option<&'a Path>,
    pub stdin: bool,
}

/// Read one item per line.
pub fn read_items<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let item = line.trim();
        if !item.is_empty() {
            items.push(item.to_string());
        }
    }
    Ok(items)
}

/// Resolve the work items; `what` names them in the error ("image names").
pub fn resolve_items(source: ItemSource<'_>, what: &str) -> Result<Vec<String>, VaultError> {
    let stdin = std::io::stdin();
    resolve_items_from(source, what, stdin.lock())
}

/// Like [`resolve_items`] with an explicit stand-in for standard input.
pub fn resolve_items_from<R: BufRead>(
    source: ItemSource<'_>,
    what: &str,
    stdin: R,
) -> Result<Vec<String>, VaultError> {
    let items = if source.stdin {
        read_items(stdin)
            .map_err(|e| VaultError::FatalInput(format!("Error reading stdin: {e}")))?
    } else if let Some(path) = source.file {
        let file = File::open(path).map_err(|e| {
            VaultError::FatalInput(format!("Error opening file {}: {e}", path.display()))
        })?;
        read_items(BufReader::new(file)).map_err(|e| {
            VaultError::FatalInput(format!("Error reading file {}: {e}", path.display()))
        })?
    } else {
        source
            .positional
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };

    if items.is_empty() {
        return Err(VaultError::FatalInput(format!(
            "No {what} provided. Use command arguments, --file, or --stdin"
        )));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_items_trims_and_skips_blank() {
        let items = read_items(Cursor::new("  nginx:latest \n\n\tredis:7\n   \n")).unwrap();
        assert_eq!(items, vec!["nginx:latest", "redis:7"]);
    }

    #[test]
    fn test_positional() {
        let positional = args(&["a:1", "b:2"]);
        let source = ItemSource {
            positional: &positional,
            file: None,
            stdin: false,
        };
        let items = resolve_items_from(source, "image names", Cursor::new("")).unwrap();
        assert_eq!(items, vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_file_beats_positional() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images.txt");
        std::fs::write(&path, "from-file:1\n").unwrap();

        let positional = args(&["ignored:1"]);
        let source = ItemSource {
            positional: &positional,
            file: Some(&path),
            stdin: false,
        };
        let items = resolve_items_from(source, "image names", Cursor::new("")).unwrap();
        assert_eq!(items, vec!["from-file:1"]);
    }

    #[test]
    fn test_stdin_beats_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images.txt");
        std::fs::write(&path, "from-file:1\n").unwrap();

        let positional = args(&["ignored:1"]);
        let source = ItemSource {
            positional: &positional,
            file: Some(&path),
            stdin: true,
        };
        let items =
            resolve_items_from(source, "image names", Cursor::new("from-stdin:1\n")).unwrap();
        assert_eq!(items, vec!["from-stdin:1"]);
    }

    #[test]
    fn test_empty_is_fatal() {
        let source = ItemSource {
            positional: &[],
            file: None,
            stdin: false,
        };
        let err = resolve_items_from(source, "tarball paths", Cursor::new("")).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("No tarball paths provided"));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.txt");
        let source = ItemSource {
            positional: &[],
            file: Some(&missing),
            stdin: false,
        };
        let err = resolve_items_from(source, "image names", Cursor::new("")).unwrap_err();
        assert!(matches!(err, VaultError::FatalInput(_)));
    }
}
