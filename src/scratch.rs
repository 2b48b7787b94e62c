//! Working directory for downloads and intermediate files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Either a throwaway temporary directory, removed on drop, or a caller
/// supplied directory that is emptied first and left in place afterwards.
#[derive(Debug)]
pub enum Scratch {
    Temporary(TempDir),
    Provided(PathBuf),
}

impl Scratch {
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("naptan_map")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        debug!(path = %dir.path().display(), "Created temporary scratch");
        Ok(Scratch::Temporary(dir))
    }

    /// Uses `path`, clearing its contents or creating it as needed.
    pub fn provided(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        prepare_scratch_dir(&path)?;
        info!(path = %path.display(), "Using provided scratch");
        Ok(Scratch::Provided(path))
    }

    pub fn path(&self) -> &Path {
        match self {
            Scratch::Temporary(dir) => dir.path(),
            Scratch::Provided(path) => path,
        }
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }
}

/// Empties `path` (files removed, subdirectories removed recursively), or
/// creates it if it does not exist.
pub fn prepare_scratch_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return fs::create_dir_all(path).map_err(|e| Error::io(path, e));
    }

    for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
        let entry = entry.map_err(|e| Error::io(path, e))?;
        let entry_path = entry.path();
        let is_dir = entry
            .file_type()
            .map_err(|e| Error::io(&entry_path, e))?
            .is_dir();

        let removed = if is_dir {
            fs::remove_dir_all(&entry_path)
        } else {
            fs::remove_file(&entry_path)
        };
        removed.map_err(|e| Error::io(&entry_path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_creates_missing_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = root.path().join("a/b/scratch");

        prepare_scratch_dir(&scratch).unwrap();

        assert!(scratch.is_dir());
    }

    #[test]
    fn test_prepare_clears_files_and_subdirs() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("naptan.csv"), "old").unwrap();
        fs::create_dir_all(root.path().join("nested/deeper")).unwrap();
        fs::write(root.path().join("nested/deeper/file.txt"), "old").unwrap();

        prepare_scratch_dir(root.path()).unwrap();

        assert!(root.path().is_dir());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_provided_scratch_survives_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("scratch");

        {
            let scratch = Scratch::provided(&path).unwrap();
            assert_eq!(scratch.join("x.json"), path.join("x.json"));
        }

        assert!(path.is_dir());
    }

    #[test]
    fn test_temporary_scratch_removed_on_drop() {
        let scratch = Scratch::temporary().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());

        drop(scratch);

        assert!(!path.exists());
    }
}
