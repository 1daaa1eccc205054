//! Write-temp-then-rename durability, shared by the settings store and the
//! on-disk cache layer so no two writers can race on a partially written
//! file.

use crate::error::{AppError, Result};
use std::path::Path;

/// Writes `bytes` to `path` atomically: writes to a sibling `.tmp` file,
/// then renames over the destination. A crash mid-write leaves the
/// original file (if any) intact.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Reads and parses a JSON document, quarantining it (renaming with a
/// `.corrupt` suffix) if it fails to parse, per the Corrupt-kind recovery
/// rule: quarantine, recreate default, log.
pub fn read_json_or_quarantine<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let quarantine = path.with_extension("corrupt");
            tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt file");
            let _ = std::fs::rename(path, &quarantine);
            Err(AppError::corrupt(path.display().to_string(), e.to_string()))
        }
    }
}

pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Doc {
        value: u32,
    }

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &Doc { value: 42 }).unwrap();
        let back: Doc = read_json_or_quarantine(&path).unwrap().unwrap();
        assert_eq!(back, Doc { value: 42 });
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let back: Option<Doc> = read_json_or_quarantine(&path).unwrap();
        assert!(back.is_none());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"not json").unwrap();
        let result: Result<Option<Doc>> = read_json_or_quarantine(&path);
        assert!(result.is_err());
        assert!(dir.path().join("doc.corrupt").exists());
        assert!(!path.exists());
    }
}
