//! Per-request scratch storage.
//!
//! Each request gets its own uniquely named directory under the configured
//! scratch root. The directory is removed on every exit path: explicitly via
//! [`Workspace::release`] on the happy path, and by `Drop` on any early
//! return. Cleanup failures are logged, never propagated.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use tempfile::{Builder, TempDir};

const INPUT_FILENAME: &str = "document.docx";

/// Handle to one request's scratch directory.
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    /// Create a collision-free scratch directory under `root`.
    ///
    /// The root itself is created if missing so first requests after a fresh
    /// deploy do not fail.
    pub fn acquire(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = Builder::new().prefix("docproc-").tempdir_in(root)?;
        Ok(Self { dir: Some(dir) })
    }

    /// Directory all request-scoped files live in.
    pub fn dir(&self) -> &Path {
        self.dir
            .as_ref()
            .expect("workspace used after release")
            .path()
    }

    /// Persist the rendered document into the workspace and return its path.
    pub fn write_input(&self, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir().join(INPUT_FILENAME);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Read a file produced inside the workspace.
    pub fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Remove the scratch directory and everything under it.
    ///
    /// Idempotent; a second call is a no-op. Failures are logged and swallowed
    /// so cleanup never masks the outcome of the request itself.
    pub fn release(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("failed to clean up workspace {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_unique_dirs() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::acquire(root.path()).unwrap();
        let b = Workspace::acquire(root.path()).unwrap();
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert!(b.dir().is_dir());
    }

    #[test]
    fn write_input_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::acquire(root.path()).unwrap();
        let path = ws.write_input(b"hello").unwrap();
        assert_eq!(ws.read_file(&path).unwrap(), b"hello");
    }

    #[test]
    fn release_removes_everything_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::acquire(root.path()).unwrap();
        let dir = ws.dir().to_path_buf();
        ws.write_input(b"data").unwrap();
        ws.release();
        assert!(!dir.exists());
        ws.release();
    }

    #[test]
    fn drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let ws = Workspace::acquire(root.path()).unwrap();
            ws.write_input(b"data").unwrap();
            ws.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }
}
