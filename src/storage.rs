// SPDX-License-Identifier: GPL-3.0-only

//! Locations for exported snapshots

use crate::constants::snapshot;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process snapshot counter, keeps names unique within one second
static SNAPSHOT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Default snapshot directory: Downloads, falling back to home, then the working directory
pub fn default_snapshot_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Snapshot filename for a timestamp and sequence number
pub fn snapshot_filename(timestamp: DateTime<Local>, sequence: u64) -> String {
    format!(
        "{}_{}_{:03}.{}",
        snapshot::FILE_PREFIX,
        timestamp.format("%Y%m%d_%H%M%S"),
        sequence % 1000,
        snapshot::EXTENSION
    )
}

/// Next unused snapshot path in `dir`
pub fn next_snapshot_path(dir: &Path) -> PathBuf {
    loop {
        let sequence = SNAPSHOT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(snapshot_filename(Local::now(), sequence));
        if !path.exists() {
            return path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_filename_format() {
        let timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            snapshot_filename(timestamp, 7),
            "processed_20240309_140507_007.png"
        );
    }

    #[test]
    fn test_next_snapshot_paths_are_unique() {
        let dir = std::env::temp_dir();
        let first = next_snapshot_path(&dir);
        let second = next_snapshot_path(&dir);
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.as_path()));
        assert_eq!(first.extension().and_then(|e| e.to_str()), Some("png"));
    }
}
