//! Static resource access.
//!
//! The resolver never maps logical paths to storage itself. It asks a
//! [`ResourceResolver`] whether a path exists and, for manifests, for the
//! bytes. A [`Resource`] may carry the backing file on disk; only resources
//! with a backing file can be watched for changes.
//!
//! [`FileSystemResolver`] searches an ordered list of web roots, first match
//! wins, the same way module web directories overlay one another.

use std::path::{Component, Path, PathBuf};

use crate::core::ClientDepsError;

/// A resolved static resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    path: String,
    file: Option<PathBuf>,
}

impl Resource {
    /// Create a resource for a logical path with an optional backing file.
    pub fn new(path: impl Into<String>, file: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file,
        }
    }

    /// Logical path the resource was looked up by.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Backing file, when the resource lives on a filesystem.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// `(directory, file name)` pair to register a watch on.
    pub fn watch_target(&self) -> Option<(PathBuf, String)> {
        let file = self.file.as_ref()?;
        let dir = file.parent()?.to_path_buf();
        let name = file.file_name()?.to_string_lossy().into_owned();
        Some((dir, name))
    }
}

/// Resolve logical paths to readable resources.
pub trait ResourceResolver: Send + Sync {
    /// Look a logical path up; `None` when absent.
    fn lookup(&self, path: &str) -> Option<Resource>;

    /// Read the full contents of a resource returned by [`lookup`](Self::lookup).
    fn read(&self, resource: &Resource) -> Result<Vec<u8>, ClientDepsError>;
}

/// Resolver over an ordered list of directories.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    roots: Vec<PathBuf>,
}

impl FileSystemResolver {
    /// Create a resolver searching `roots` in order.
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Configured roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl ResourceResolver for FileSystemResolver {
    fn lookup(&self, path: &str) -> Option<Resource> {
        if !is_contained(path) {
            tracing::warn!(
                target: "clientdeps::source",
                "Refusing to resolve {path}: path escapes the web roots"
            );
            return None;
        }

        self.roots.iter().map(|root| root.join(path)).find(|candidate| candidate.is_file()).map(
            |file| {
                tracing::trace!(target: "clientdeps::source", "{path} -> {}", file.display());
                Resource::new(path, Some(file))
            },
        )
    }

    fn read(&self, resource: &Resource) -> Result<Vec<u8>, ClientDepsError> {
        let file = resource.file().ok_or_else(|| ClientDepsError::ResourceReadError {
            path: resource.path().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no backing file"),
        })?;
        std::fs::read(file).map_err(|source| ClientDepsError::ResourceReadError {
            path: resource.path().to_string(),
            source,
        })
    }
}

/// Whether a logical path stays below whatever root it is joined to.
fn is_contained(path: &str) -> bool {
    Path::new(path).components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
