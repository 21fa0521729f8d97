use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::driver::{validate_key, Driver};
use crate::error::StoreResult;

/// Prefix of in-flight temp files; never reported by `list`.
const TEMP_PREFIX: &str = ".tmp";

/// Driver that maps keys to files under a root directory.
///
/// Writes go to a temp file in the destination directory, are synced, and
/// are then renamed into place, so a reader never observes a partial value.
#[derive(Clone, Debug)]
pub struct FsDriver {
    root: PathBuf,
}

impl FsDriver {
    /// Open a driver rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, part| p.join(part)))
    }
}

impl Driver for FsDriver {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(parent)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        persist(tmp, &path)?;

        debug!(key, bytes = value.len(), "fs driver write");
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.path_for(key)?.is_file())
    }
}

fn persist(tmp: NamedTempFile, path: &Path) -> io::Result<()> {
    tmp.persist(path).map(|_| ()).map_err(|e| e.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::contract;

    fn driver() -> (tempfile::TempDir, FsDriver) {
        let dir = tempfile::tempdir().unwrap();
        let driver = FsDriver::open(dir.path().join("store")).unwrap();
        (dir, driver)
    }

    #[test]
    fn write_then_read() {
        let (_dir, d) = driver();
        contract::write_then_read(&d);
    }

    #[test]
    fn empty_value() {
        let (_dir, d) = driver();
        contract::empty_value(&d);
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, d) = driver();
        contract::delete_is_idempotent(&d);
    }

    #[test]
    fn list_is_sorted_and_prefixed() {
        let (_dir, d) = driver();
        contract::list_is_sorted_and_prefixed(&d);
    }

    #[test]
    fn bad_keys_rejected() {
        let (_dir, d) = driver();
        contract::bad_keys_rejected(&d);
    }

    #[test]
    fn keys_map_to_nested_files() {
        let (_dir, d) = driver();
        d.write("blobs/ab/cdef", b"x").unwrap();
        assert!(d.root().join("blobs").join("ab").join("cdef").is_file());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FsDriver::open(dir.path()).unwrap().write("k", b"v").unwrap();
        let reopened = FsDriver::open(dir.path()).unwrap();
        assert_eq!(reopened.read("k").unwrap(), Some(b"v".to_vec()));
    }
}
