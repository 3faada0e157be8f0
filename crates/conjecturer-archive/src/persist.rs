//! Atomic JSON snapshots
//!
//! Snapshots are written to a sibling `.tmp` file, synced, and renamed over
//! the target, so a crash mid-write leaves the previous snapshot intact.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::ArchiveError;

/// Temp path used while writing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialise `value` as pretty JSON and atomically replace `path`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArchiveError> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = temp_path_for(path);
    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Remove a temp file left behind by an interrupted write
pub fn clean_stale_temp(path: &Path) {
    let temp_path = temp_path_for(path);
    if temp_path.exists() {
        // Best effort
        let _ = std::fs::remove_file(&temp_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_json_atomic_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("map.json");

        let mut first = BTreeMap::new();
        first.insert("a", 1);
        write_json_atomic(&path, &first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("b", 2);
        write_json_atomic(&path, &second).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: BTreeMap<String, i32> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.get("b"), Some(&2));
        assert!(!back.contains_key("a"));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        let path = Path::new("/data/program_map.json");
        assert_eq!(temp_path_for(path), Path::new("/data/program_map.json.tmp"));
    }
}
