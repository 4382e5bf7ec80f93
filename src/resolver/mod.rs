//! Dependency resolution.
//!
//! [`Resolver`] is the one injected entry point that turns a
//! [`DependencySpecifier`] into a shared, immutable [`DependencyNode`]. It
//! owns:
//!
//! - the [`ResolutionCache`], single-flight per `(identifier, mode)`
//! - the watch registry: a reverse index from backing manifest file to the
//!   keys loaded from it, plus exactly one [`WatchSubscription`] per file
//! - a subscription to the module registry's reload broadcast
//!
//! Resolution of a key is complete before it becomes visible. A library is
//! published only after every child has been resolved, which in turn may
//! load and publish the children.
//!
//! # Invalidation
//!
//! - a watch event on a manifest removes only the keys loaded from that file
//! - a "modules reloaded" broadcast clears everything
//! - [`Resolver::invalidate_key`] and [`Resolver::invalidate_all`] do the same
//!   on demand
//!
//! Parents store children as specifiers, so a cached library keeps working
//! after one of its children was invalidated: the next walk re-resolves it.
//!
//! # Cycles
//!
//! Every resolution carries the chain of keys currently being loaded on
//! this thread. A child whose key is already on the chain is not waited on:
//! the parent keeps it as a child specifier and the aggregation walk
//! resolves it later, once it is published. A node's children therefore do
//! not depend on which key was loaded first.

mod loader;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::aggregate::ClientDependencies;
use crate::cache::{CacheSettings, CacheStats, ResolutionCache};
use crate::core::Mode;
use crate::manifest::ChildResolution;
use crate::modules::{ModuleRegistry, StaticModuleRegistry};
use crate::node::{DependencyNode, ExternalDependency};
use crate::source::{Resource, ResourceResolver};
use crate::specifier::{CacheKey, DependencySpecifier};
use crate::supplier::DependencySupplier;
use crate::watch::{EventMask, NoopWatchService, WatchCallback, WatchEventKind, WatchService, WatchSubscription};

/// Cached result of one resolution; a failed load is cached as `None`.
pub type Resolution = Option<Arc<DependencyNode>>;

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    resources: Arc<dyn ResourceResolver>,
    modules: Arc<dyn ModuleRegistry>,
    watcher: Arc<dyn WatchService>,
    dev_mode: bool,
    cache: CacheSettings,
}

impl ResolverBuilder {
    /// Start a builder over `resources` with an empty module registry, no
    /// watching and production deployment.
    pub fn new(resources: Arc<dyn ResourceResolver>) -> Self {
        Self {
            resources,
            modules: Arc::new(StaticModuleRegistry::default()),
            watcher: Arc::new(NoopWatchService),
            dev_mode: false,
            cache: CacheSettings::default(),
        }
    }

    /// Module registry used for module contexts and reload broadcasts.
    pub fn modules(mut self, modules: Arc<dyn ModuleRegistry>) -> Self {
        self.modules = modules;
        self
    }

    /// Watch service used for library manifests.
    pub fn watcher(mut self, watcher: Arc<dyn WatchService>) -> Self {
        self.watcher = watcher;
        self
    }

    /// Whether the deployment runs in development mode.
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Cache bounds and timeouts.
    pub fn cache_settings(mut self, settings: CacheSettings) -> Self {
        self.cache = settings;
        self
    }

    /// Build the resolver and subscribe it to module reloads.
    pub fn build(self) -> Resolver {
        let inner = Arc::new(ResolverInner {
            resources: self.resources,
            modules: self.modules,
            watcher: self.watcher,
            dev_mode: self.dev_mode,
            cache: ResolutionCache::new(self.cache),
            file_keys: DashMap::new(),
            subscriptions: DashMap::new(),
        });

        let weak: Weak<ResolverInner> = Arc::downgrade(&inner);
        inner.modules.subscribe_reload(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                tracing::info!(target: "clientdeps::resolver", "Modules reloaded, clearing resolution cache");
                inner.invalidate_all();
            }
        }));

        tracing::debug!(
            target: "clientdeps::resolver",
            "Resolver ready (dev_mode={}, max_entries={})",
            inner.dev_mode,
            inner.cache.settings().max_entries
        );
        Resolver {
            inner,
        }
    }
}

/// Cached, watch-invalidated dependency resolver.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

pub(crate) struct ResolverInner {
    resources: Arc<dyn ResourceResolver>,
    modules: Arc<dyn ModuleRegistry>,
    watcher: Arc<dyn WatchService>,
    dev_mode: bool,
    cache: ResolutionCache<Resolution>,
    file_keys: DashMap<PathBuf, HashSet<CacheKey>>,
    subscriptions: DashMap<PathBuf, Box<dyn WatchSubscription>>,
}

impl Resolver {
    /// Start building a resolver over `resources`.
    pub fn builder(resources: Arc<dyn ResourceResolver>) -> ResolverBuilder {
        ResolverBuilder::new(resources)
    }

    /// Resolve a specifier through the cache.
    ///
    /// External specifiers never touch the cache. Failures are logged once,
    /// when the key is loaded, and cached as `None`.
    pub fn resolve(&self, spec: &DependencySpecifier) -> Option<Arc<DependencyNode>> {
        self.inner.resolve(spec, &mut Vec::new())
    }

    /// Deferred reference to `spec`.
    pub fn supplier(&self, spec: DependencySpecifier) -> DependencySupplier {
        DependencySupplier::new(self.clone(), spec)
    }

    /// Deferred reference to a raw identifier requested in `mode`.
    pub fn supplier_for(&self, raw: &str, mode: Mode) -> DependencySupplier {
        self.supplier(DependencySpecifier::new(raw, mode))
    }

    /// Empty aggregation bound to this resolver.
    pub fn client_dependencies(&self) -> ClientDependencies {
        ClientDependencies::new(self.clone())
    }

    /// Drop one cached resolution.
    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        self.inner.cache.invalidate(key)
    }

    /// Drop every cached resolution.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Drop every resolution loaded from `file`, as a watch event would.
    pub fn invalidate_file(&self, file: &Path) -> usize {
        self.inner.invalidate_file(file, WatchEventKind::Modify)
    }

    /// Whether the deployment runs in development mode.
    pub fn dev_mode(&self) -> bool {
        self.inner.dev_mode
    }

    /// Cache counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Invalidation generation; changes whenever something was invalidated.
    pub fn generation(&self) -> u64 {
        self.inner.cache.generation()
    }

    /// Number of manifest files with a live watch subscription.
    pub fn watched_files(&self) -> usize {
        self.inner.subscriptions.len()
    }

    /// Whether `key` currently has a cached resolution.
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        self.inner.cache.contains(key)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("dev_mode", &self.inner.dev_mode)
            .field("stats", &self.inner.cache.stats())
            .finish()
    }
}

impl ResolverInner {
    fn resolve(self: &Arc<Self>, spec: &DependencySpecifier, chain: &mut Vec<CacheKey>) -> Resolution {
        self.resolve_child(spec, chain).node()
    }

    fn resolve_child(self: &Arc<Self>, spec: &DependencySpecifier, chain: &mut Vec<CacheKey>) -> ChildResolution {
        if spec.is_external() {
            let node = DependencyNode::External(ExternalDependency::from_specifier(spec));
            return ChildResolution::Resolved(Arc::new(node));
        }

        let key = spec.cache_key();
        if chain.contains(&key) {
            let path: Vec<String> = chain.iter().map(ToString::to_string).collect();
            tracing::debug!(
                target: "clientdeps::resolver",
                "Dependency cycle: {} -> {key}",
                path.join(" -> ")
            );
            return ChildResolution::InProgress;
        }

        let resolution = self.cache.get_or_load(&key, || {
            chain.push(key.clone());
            let resolution = self.load(spec, &key, chain);
            chain.pop();
            resolution
        });
        match resolution {
            Some(node) => ChildResolution::Resolved(node),
            None => ChildResolution::Unresolved,
        }
    }

    /// Development deployments may request production artifacts that were
    /// never built.
    fn tolerates_missing(&self, requested: Mode) -> bool {
        self.dev_mode && requested == Mode::Production
    }

    fn invalidate_all(&self) {
        self.file_keys.clear();
        self.cache.invalidate_all();
    }

    /// The index entry is kept so a later create event still reaches keys
    /// cached as missing after a delete.
    fn invalidate_file(&self, file: &Path, kind: WatchEventKind) -> usize {
        let keys: Vec<CacheKey> = match self.file_keys.get(file) {
            Some(keys) => keys.iter().cloned().collect(),
            None => return 0,
        };
        let removed = keys.iter().filter(|key| self.cache.invalidate(key)).count();
        tracing::debug!(
            target: "clientdeps::resolver",
            "{kind:?} on {}: invalidated {removed} resolution(s)",
            file.display()
        );
        removed
    }

    /// Record that `key` was loaded from `resource` and make sure its file
    /// is watched exactly once.
    fn track(self: &Arc<Self>, resource: &Resource, key: &CacheKey) {
        let Some(file) = resource.file() else {
            return;
        };
        let file = file.to_path_buf();
        self.file_keys.entry(file.clone()).or_default().insert(key.clone());

        let Entry::Vacant(vacant) = self.subscriptions.entry(file.clone()) else {
            return;
        };
        let Some((dir, name)) = resource.watch_target() else {
            return;
        };

        let weak = Arc::downgrade(self);
        let watched = file.clone();
        let callback: WatchCallback = Arc::new(move |kind| {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate_file(&watched, kind);
            }
        });

        match self.watcher.watch(&dir, &name, EventMask::ALL, callback) {
            Ok(subscription) => {
                vacant.insert(subscription);
                tracing::trace!(target: "clientdeps::resolver", "Watching {}", file.display());
            }
            Err(e) => {
                tracing::warn!(
                    target: "clientdeps::resolver",
                    "Unable to watch {}: {e}. Changes will not be picked up until reload",
                    file.display()
                );
            }
        }
    }
}
