//! Atomic file replacement and paired-file rollback.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Write `content` to `path` by writing a sibling temp file and renaming it
/// over the target.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, content) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, ulid::Ulid::new()))
}

/// Captured contents of a file before a write; `None` means it did not exist.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    previous: Option<Vec<u8>>,
}

impl FileCapture {
    pub fn take(path: &Path) -> Result<Self> {
        let previous = if path.exists() {
            Some(fs::read(path)?)
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            previous,
        })
    }

    pub fn restore(&self) -> Result<()> {
        match &self.previous {
            Some(bytes) => write_atomic(&self.path, bytes),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        }
    }
}

/// Replace several files as a unit. Every target is captured first; if any
/// write fails, all targets are restored to their captured state and a
/// `Persistence` error is returned.
pub fn write_all_or_rollback(writes: &[(&Path, Vec<u8>)]) -> Result<()> {
    let captures = writes
        .iter()
        .map(|(path, _)| FileCapture::take(path))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| Error::Persistence(format!("could not capture previous state: {}", e)))?;

    for (path, content) in writes {
        if let Err(e) = write_atomic(path, content) {
            tracing::warn!("Write to {} failed, rolling back: {}", path.display(), e);
            for capture in &captures {
                if let Err(re) = capture.restore() {
                    tracing::error!("Rollback of {} failed: {}", capture.path.display(), re);
                }
            }
            return Err(Error::Persistence(format!(
                "failed to write {}",
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_replaces_content_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agents.json");

        write_atomic(&path, b"[1]").unwrap();
        write_atomic(&path, b"[2]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[2]");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn failed_pair_write_restores_both_files() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("agents.json");
        fs::write(&config, "old-config").unwrap();

        // A regular file where the secrets directory should be makes the
        // second write fail after the first has already landed.
        let blocker = dir.path().join("vault");
        fs::write(&blocker, "not a directory").unwrap();
        let secrets = blocker.join("secrets.json");

        let result = write_all_or_rollback(&[
            (config.as_path(), b"new-config".to_vec()),
            (secrets.as_path(), b"new-secrets".to_vec()),
        ]);

        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(fs::read_to_string(&config).unwrap(), "old-config");
    }

    #[test]
    fn restore_removes_file_that_did_not_exist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.json");
        let capture = FileCapture::take(&path).unwrap();

        write_atomic(&path, b"{}").unwrap();
        capture.restore().unwrap();

        assert!(!path.exists());
    }
}
