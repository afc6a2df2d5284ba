//! Temp artifact staging area.
//!
//! Files are addressed by bare file name inside one root directory. The store
//! does not coordinate concurrent writers: callers pick names that are unique
//! per in-flight operation (certificate ids or random uuids).

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct TempFileStore {
    root: PathBuf,
}

impl TempFileStore {
    /// Open the store, creating the root directory when missing
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    pub async fn stage(&self, bytes: &[u8], name: &str) -> io::Result<PathBuf> {
        let path = self.path_of(name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!("Failed to stage {}: {}", name, e);
            e
        })?;
        debug!("Staged {} ({} bytes)", name, bytes.len());
        Ok(path)
    }

    pub async fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_of(name)).await
    }

    pub fn remove(&self, name: &str) -> io::Result<()> {
        std::fs::remove_file(self.path_of(name)).map_err(|e| {
            error!("Failed to remove {}: {}", name, e);
            e
        })?;
        debug!("Removed {}", name);
        Ok(())
    }

    /// Remove `name` if present; returns whether a file was deleted
    pub fn remove_if_exists(&self, name: &str) -> io::Result<bool> {
        if self.exists(name) {
            self.remove(name)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> io::Result<()> {
        std::fs::rename(self.path_of(old_name), self.path_of(new_name)).map_err(|e| {
            error!("Failed to rename {} to {}: {}", old_name, new_name, e);
            e
        })
    }

    /// Start tracking the artifacts of one multi-step operation
    pub fn scope(&self) -> ArtifactScope<'_> {
        ArtifactScope {
            store: self,
            names: Vec::new(),
        }
    }
}

/// Artifacts created by one operation, deleted when the scope is dropped.
///
/// Names handed over with `keep` survive the scope; everything still tracked
/// at drop time is removed, on success and on every error path alike.
pub struct ArtifactScope<'a> {
    store: &'a TempFileStore,
    names: Vec<String>,
}

impl<'a> ArtifactScope<'a> {
    pub fn track(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    /// Stop tracking `name` so it outlives the scope
    pub fn keep(&mut self, name: &str) {
        self.names.retain(|tracked| tracked != name);
    }

    pub fn tracked(&self) -> &[String] {
        &self.names
    }
}

impl Drop for ArtifactScope<'_> {
    fn drop(&mut self) {
        for name in self.names.drain(..) {
            if let Err(e) = self.store.remove_if_exists(&name) {
                warn!("Could not clean up artifact {}: {}", name, e);
            }
        }
    }
}
