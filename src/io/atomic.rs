//! Atomic artifact writes.
//!
//! Content goes to a `.tmp` sibling which is flushed, synced and renamed over
//! the target only on success. On any failure the temporary file is removed
//! and the previous artifact (if any) is left untouched.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `path` through `body`; the file only appears once `body` succeeds.
pub fn write_atomic<F>(path: &Path, body: F) -> Result<(), AppError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), AppError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }

    let tmp = tmp_path(path);
    let result = (|| {
        let file = File::create(&tmp).map_err(|e| AppError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        body(&mut writer)?;
        writer.flush().map_err(|e| AppError::io(&tmp, e))?;
        let file = writer.into_inner().map_err(|e| AppError::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| AppError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| AppError::io(path, e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_atomic(&path, |w| w.write_all(b"a\n").map_err(|e| AppError::io("out.csv", e))).unwrap();
        write_atomic(&path, |w| w.write_all(b"b\n").map_err(|e| AppError::io("out.csv", e))).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn failure_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "old\n").unwrap();

        let err = write_atomic(&path, |w| {
            w.write_all(b"partial").map_err(|e| AppError::io("out.csv", e))?;
            Err(AppError::ModelFit("sampler failed".into()))
        });
        assert!(err.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.json");
        write_atomic(&path, |w| w.write_all(b"{}").map_err(|e| AppError::io("out.json", e))).unwrap();
        assert!(path.exists());
    }
}
