//! Archive naming policy.
//!
//! `{sanitized item}-{YYYYMMDD-HHMMSS}.tar[.gz]` under the backup directory.
//! Two items that sanitize to the same name and finish within the same second
//! map to the same path; the later write replaces the earlier one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::compression::CompressionKind;

/// Timestamp component of archive names (second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Replace path-hostile characters so a reference becomes one file name.
pub fn sanitize(item: &str) -> String {
    item.replace(['/', ':'], "_")
}

/// Archive file name for `item` created at `now`.
pub fn archive_file_name(item: &str, kind: CompressionKind, now: &DateTime<Utc>) -> String {
    format!(
        "{}-{}{}",
        sanitize(item),
        now.format(TIMESTAMP_FORMAT),
        kind.archive_suffix()
    )
}

/// Full archive path for `item` inside `dir`.
pub fn archive_path(
    dir: &Path,
    item: &str,
    kind: CompressionKind,
    now: &DateTime<Utc>,
) -> PathBuf {
    dir.join(archive_file_name(item, kind, now))
}
