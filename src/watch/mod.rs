//! Filesystem watch boundary.
//!
//! The resolver registers `(directory, file name, event mask) -> callback`
//! with a [`WatchService`] and keeps the returned [`WatchSubscription`] alive
//! for as long as it wants events. Dropping the subscription unregisters it.
//!
//! Implementations:
//! - [`NotifyWatchService`] - OS-native watching through the `notify` crate;
//!   one non-recursive watch per directory shared by every file registered in
//!   it
//! - [`NoopWatchService`] - accepts registrations and never fires, for
//!   deployments where manifests never change at runtime

use dashmap::DashMap;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::core::ClientDepsError;

/// Kind of change reported for a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    /// File appeared
    Create,
    /// File contents or metadata changed
    Modify,
    /// File was removed
    Delete,
}

/// Set of event kinds a registration is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask {
    create: bool,
    modify: bool,
    delete: bool,
}

impl EventMask {
    /// Create, modify and delete.
    pub const ALL: EventMask = EventMask {
        create: true,
        modify: true,
        delete: true,
    };

    /// Build a mask from explicit flags.
    pub const fn new(create: bool, modify: bool, delete: bool) -> Self {
        Self {
            create,
            modify,
            delete,
        }
    }

    /// Whether `kind` is selected.
    pub fn contains(&self, kind: WatchEventKind) -> bool {
        match kind {
            WatchEventKind::Create => self.create,
            WatchEventKind::Modify => self.modify,
            WatchEventKind::Delete => self.delete,
        }
    }
}

/// Callback invoked for every matching event.
pub type WatchCallback = Arc<dyn Fn(WatchEventKind) + Send + Sync>;

/// Handle of a registration; dropping it unregisters the callback.
pub trait WatchSubscription: Send + Sync {}

/// Registers callbacks for file events.
pub trait WatchService: Send + Sync {
    /// Watch `file_name` inside `dir` for the events in `mask`.
    fn watch(
        &self,
        dir: &Path,
        file_name: &str,
        mask: EventMask,
        callback: WatchCallback,
    ) -> Result<Box<dyn WatchSubscription>, ClientDepsError>;
}

/// Watch service that never fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatchService;

struct NoopSubscription;

impl WatchSubscription for NoopSubscription {}

impl WatchService for NoopWatchService {
    fn watch(
        &self,
        dir: &Path,
        file_name: &str,
        _mask: EventMask,
        _callback: WatchCallback,
    ) -> Result<Box<dyn WatchSubscription>, ClientDepsError> {
        tracing::trace!(
            target: "clientdeps::watch",
            "Ignoring watch on {}/{file_name}",
            dir.display()
        );
        Ok(Box::new(NoopSubscription))
    }
}

struct Registration {
    id: u64,
    file_name: String,
    mask: EventMask,
    callback: WatchCallback,
}

type Registrations = DashMap<PathBuf, Vec<Registration>>;

struct Shared {
    watcher: Mutex<RecommendedWatcher>,
    registrations: Arc<Registrations>,
    next_id: AtomicU64,
}

/// OS-native watch service backed by `notify`.
pub struct NotifyWatchService {
    shared: Arc<Shared>,
}

impl NotifyWatchService {
    /// Create the service and its underlying OS watcher.
    pub fn new() -> Result<Self, ClientDepsError> {
        let registrations: Arc<Registrations> = Arc::new(DashMap::new());
        let handler_registrations = registrations.clone();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => dispatch(&handler_registrations, &event),
                Err(e) => tracing::warn!(target: "clientdeps::watch", "Watch error: {e}"),
            }
        })
        .map_err(|e| ClientDepsError::WatchError {
            path: "<watcher>".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                watcher: Mutex::new(watcher),
                registrations,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Number of directories with at least one registration.
    pub fn watched_directories(&self) -> usize {
        self.shared.registrations.len()
    }
}

impl WatchService for NotifyWatchService {
    fn watch(
        &self,
        dir: &Path,
        file_name: &str,
        mask: EventMask,
        callback: WatchCallback,
    ) -> Result<Box<dyn WatchSubscription>, ClientDepsError> {
        // notify reports canonical paths on some platforms
        let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        let first_in_dir = {
            let mut regs = self.shared.registrations.entry(dir.clone()).or_default();
            regs.push(Registration {
                id,
                file_name: file_name.to_string(),
                mask,
                callback,
            });
            regs.len() == 1
        };

        if first_in_dir {
            let result = self
                .shared
                .watcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .watch(&dir, RecursiveMode::NonRecursive);
            if let Err(e) = result {
                remove_registration(&self.shared, &dir, id);
                return Err(ClientDepsError::WatchError {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                });
            }
            tracing::debug!(target: "clientdeps::watch", "Watching directory {}", dir.display());
        }

        Ok(Box::new(NotifySubscription {
            id,
            dir,
            shared: Arc::downgrade(&self.shared),
        }))
    }
}

struct NotifySubscription {
    id: u64,
    dir: PathBuf,
    shared: Weak<Shared>,
}

impl WatchSubscription for NotifySubscription {}

impl Drop for NotifySubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            remove_registration(&shared, &self.dir, self.id);
        }
    }
}

fn remove_registration(shared: &Shared, dir: &Path, id: u64) {
    if let Some(mut regs) = shared.registrations.get_mut(dir) {
        regs.retain(|r| r.id != id);
    }
    if shared.registrations.remove_if(dir, |_, regs| regs.is_empty()).is_some() {
        let _ = shared.watcher.lock().unwrap_or_else(PoisonError::into_inner).unwatch(dir);
        tracing::debug!(target: "clientdeps::watch", "Stopped watching {}", dir.display());
    }
}

fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Create),
        EventKind::Modify(_) => Some(WatchEventKind::Modify),
        EventKind::Remove(_) => Some(WatchEventKind::Delete),
        _ => None,
    }
}

fn dispatch(registrations: &Registrations, event: &notify::Event) {
    let Some(kind) = classify(&event.kind) else {
        return;
    };

    for path in &event.paths {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            continue;
        };

        // Collect first so no shard guard is held while callbacks run
        let callbacks: Vec<WatchCallback> = registrations
            .get(dir)
            .map(|regs| {
                regs.iter()
                    .filter(|r| matches(r, name, kind))
                    .map(|r| r.callback.clone())
                    .collect()
            })
            .unwrap_or_default();

        for callback in callbacks {
            tracing::debug!(target: "clientdeps::watch", "{kind:?} {}", path.display());
            callback(kind);
        }
    }
}

fn matches(registration: &Registration, name: &OsStr, kind: WatchEventKind) -> bool {
    registration.mask.contains(kind) && OsStr::new(&registration.file_name) == name
}
