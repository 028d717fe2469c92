//! Filesystem collaborator
//!
//! The tracker reads sources and the report writer emits files through this
//! trait so tests can inject failures without touching the disk.

use crate::result::FirmoResult;
use std::path::Path;

/// Minimal filesystem surface used by coverage
pub trait FileSystem: Send + Sync {
    /// Read a whole file as UTF-8 (lossy)
    fn read_file(&self, path: &Path) -> FirmoResult<String>;

    /// Write `content`, replacing any existing file
    fn write_file(&self, path: &Path, content: &str) -> FirmoResult<()>;

    /// Create `path` and its parents if missing
    fn ensure_directory_exists(&self, path: &Path) -> FirmoResult<()>;
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_file(&self, path: &Path) -> FirmoResult<String> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write_file(&self, path: &Path, content: &str) -> FirmoResult<()> {
        std::fs::write(path, content)?;
        Ok(())
    }

    fn ensure_directory_exists(&self, path: &Path) -> FirmoResult<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }
}
