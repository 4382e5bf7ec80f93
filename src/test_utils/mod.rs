//! Test utilities for clientdeps
//!
//! In-memory stand-ins for the external collaborators of the resolver, so
//! tests can control exactly which resources exist, count how often they are
//! read and fire watch events by hand.
//!
//! - [`MemoryResources`] - a [`ResourceResolver`] over a map of path to bytes
//! - [`RecordingWatchService`] - a [`WatchService`] that records
//!   registrations and fires them on demand
//! - [`init_test_logging`] - one-time tracing setup for tests
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use clientdeps::resolver::Resolver;
//! use clientdeps::specifier::DependencySpecifier;
//! use clientdeps::test_utils::MemoryResources;
//!
//! let resources = Arc::new(MemoryResources::new());
//! resources.insert("app/main.js", "// main");
//!
//! let resolver = Resolver::builder(resources.clone()).build();
//! assert!(resolver.resolve(&DependencySpecifier::parse("app/main.js")).is_some());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError, RwLock, Weak};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::core::ClientDepsError;
use crate::source::{Resource, ResourceResolver};
use crate::watch::{EventMask, WatchCallback, WatchEventKind, WatchService, WatchSubscription};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging based on RUST_LOG environment variable.
///
/// Safe to call from every test; only the first call installs a
/// subscriber. Without a level and without `RUST_LOG`, nothing is logged.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// In-memory resource resolver.
///
/// Resources get a virtual backing file under the backing directory so the
/// resolver registers watches for them.
pub struct MemoryResources {
    files: RwLock<HashMap<String, Vec<u8>>>,
    reads: Mutex<HashMap<String, usize>>,
    backing_dir: PathBuf,
    read_delay: Option<Duration>,
}

impl Default for MemoryResources {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResources {
    /// Empty resolver with backing files under `/memory`.
    pub fn new() -> Self {
        Self::with_backing_dir("/memory")
    }

    /// Empty resolver with backing files under `dir`.
    pub fn with_backing_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            reads: Mutex::new(HashMap::new()),
            backing_dir: dir.into(),
            read_delay: None,
        }
    }

    /// Sleep this long in every read, to widen race windows.
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Add or replace a resource.
    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), contents.into());
    }

    /// Remove a resource.
    pub fn remove(&self, path: &str) {
        self.files.write().unwrap_or_else(PoisonError::into_inner).remove(path);
    }

    /// Number of reads of `path` so far.
    pub fn read_count(&self, path: &str) -> usize {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).get(path).copied().unwrap_or(0)
    }

    /// Virtual backing file of `path`.
    pub fn backing_file(&self, path: &str) -> PathBuf {
        self.backing_dir.join(path)
    }
}

impl ResourceResolver for MemoryResources {
    fn lookup(&self, path: &str) -> Option<Resource> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
            .then(|| Resource::new(path, Some(self.backing_file(path))))
    }

    fn read(&self, resource: &Resource) -> Result<Vec<u8>, ClientDepsError> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        *self
            .reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(resource.path().to_string())
            .or_default() += 1;

        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource.path())
            .cloned()
            .ok_or_else(|| ClientDepsError::ResourceReadError {
                path: resource.path().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "removed"),
            })
    }
}

struct Recorded {
    id: u64,
    dir: PathBuf,
    file_name: String,
    mask: EventMask,
    callback: WatchCallback,
}

#[derive(Default)]
struct RecordingState {
    registrations: Mutex<Vec<Recorded>>,
    next_id: AtomicU64,
    total: AtomicU64,
}

/// Watch service that records registrations and fires them on demand.
#[derive(Default, Clone)]
pub struct RecordingWatchService {
    state: Arc<RecordingState>,
}

impl RecordingWatchService {
    /// Empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `kind` for `dir/file_name` to every matching live
    /// registration. Returns how many callbacks ran.
    pub fn fire(&self, dir: &Path, file_name: &str, kind: WatchEventKind) -> usize {
        let callbacks: Vec<WatchCallback> = self
            .state
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.dir == dir && r.file_name == file_name && r.mask.contains(kind))
            .map(|r| r.callback.clone())
            .collect();
        for callback in &callbacks {
            callback(kind);
        }
        callbacks.len()
    }

    /// Deliver `kind` for a full file path.
    pub fn fire_file(&self, file: &Path, kind: WatchEventKind) -> usize {
        match (file.parent(), file.file_name()) {
            (Some(dir), Some(name)) => self.fire(dir, &name.to_string_lossy(), kind),
            _ => 0,
        }
    }

    /// Live registrations as `(directory, file name)`.
    pub fn watched(&self) -> Vec<(PathBuf, String)> {
        self.state
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| (r.dir.clone(), r.file_name.clone()))
            .collect()
    }

    /// Number of registrations ever made, dropped ones included.
    pub fn total_registrations(&self) -> u64 {
        self.state.total.load(Ordering::SeqCst)
    }
}

struct RecordedSubscription {
    id: u64,
    state: Weak<RecordingState>,
}

impl WatchSubscription for RecordedSubscription {}

impl Drop for RecordedSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.registrations.lock().unwrap_or_else(PoisonError::into_inner).retain(|r| r.id != self.id);
        }
    }
}

impl WatchService for RecordingWatchService {
    fn watch(
        &self,
        dir: &Path,
        file_name: &str,
        mask: EventMask,
        callback: WatchCallback,
    ) -> Result<Box<dyn WatchSubscription>, ClientDepsError> {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.total.fetch_add(1, Ordering::SeqCst);
        self.state.registrations.lock().unwrap_or_else(PoisonError::into_inner).push(Recorded {
            id,
            dir: dir.to_path_buf(),
            file_name: file_name.to_string(),
            mask,
            callback,
        });
        Ok(Box::new(RecordedSubscription {
            id,
            state: Arc::downgrade(&self.state),
        }))
    }
}

/// Minimal library manifest listing `dependencies` and `files`.
pub fn library_xml(dependencies: &[&str], files: &[&str]) -> String {
    let deps: String =
        dependencies.iter().map(|d| format!("        <dependency path=\"{d}\"/>\n")).collect();
    let scripts: String = files.iter().map(|f| format!("        <script path=\"{f}\"/>\n")).collect();
    format!(
        "<libraries>\n    <dependencies>\n{deps}    </dependencies>\n    <library>\n{scripts}    </library>\n</libraries>\n"
    )
}
