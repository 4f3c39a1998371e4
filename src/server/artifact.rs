//! Ownership of the socket file created by a successful bind.

use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use log::{debug, warn};

/// The filesystem entry a Unix listener created when it bound.
///
/// Only created after a bind succeeds, so a path that belongs to someone
/// else is never unlinked. Removal happens once, either explicitly during
/// shutdown or when the last owner drops.
#[derive(Debug)]
pub struct SocketArtifact {
    path: PathBuf,
    removed: AtomicBool,
}

impl SocketArtifact {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: AtomicBool::new(false),
        }
    }

    /// Path of the socket file.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Returns `true` once the file has been removed by this owner.
    #[must_use]
    pub fn is_removed(&self) -> bool { self.removed.load(Ordering::Acquire) }

    /// Unlink the socket file. Later calls are no-ops.
    pub(crate) fn remove(&self) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed socket file: path={}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("socket file already gone: path={}", self.path.display());
            }
            Err(e) => warn!(
                "failed to remove socket file: path={}, error={e}",
                self.path.display()
            ),
        }
    }
}

impl Drop for SocketArtifact {
    fn drop(&mut self) { self.remove(); }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn removes_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.sock");
        fs::write(&path, b"").expect("create file");

        let artifact = SocketArtifact::new(path.clone());
        artifact.remove();
        assert!(artifact.is_removed());
        assert!(!path.exists());

        fs::write(&path, b"").expect("recreate file");
        artifact.remove();
        assert!(path.exists(), "second removal must be a no-op");
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("b.sock");
        fs::write(&path, b"").expect("create file");
        drop(SocketArtifact::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = SocketArtifact::new(dir.path().join("missing.sock"));
        artifact.remove();
        assert!(artifact.is_removed());
    }
}
