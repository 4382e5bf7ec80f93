//! Shared harness for resolver integration tests.

use std::sync::Arc;
use std::time::Duration;

use clientdeps::cache::CacheSettings;
use clientdeps::modules::{ModuleDeclaration, StaticModuleRegistry};
use clientdeps::resolver::Resolver;
use clientdeps::test_utils::{MemoryResources, RecordingWatchService, init_test_logging};
use clientdeps::watch::WatchEventKind;

/// A resolver wired to in-memory collaborators.
pub struct Harness {
    pub resources: Arc<MemoryResources>,
    pub modules: Arc<StaticModuleRegistry>,
    pub watcher: RecordingWatchService,
    pub resolver: Resolver,
}

impl Harness {
    pub fn new(dev_mode: bool) -> Self {
        Self::build(MemoryResources::new(), dev_mode, Vec::new())
    }

    pub fn with_modules(dev_mode: bool, modules: Vec<ModuleDeclaration>) -> Self {
        Self::build(MemoryResources::new(), dev_mode, modules)
    }

    pub fn build(resources: MemoryResources, dev_mode: bool, modules: Vec<ModuleDeclaration>) -> Self {
        init_test_logging(None);
        let resources = Arc::new(resources);
        let modules = Arc::new(StaticModuleRegistry::new(modules));
        let watcher = RecordingWatchService::new();
        let resolver = Resolver::builder(resources.clone())
            .modules(modules.clone())
            .watcher(Arc::new(watcher.clone()))
            .dev_mode(dev_mode)
            .cache_settings(CacheSettings {
                pending_timeout: Duration::from_secs(2),
                ..CacheSettings::default()
            })
            .build();
        Self {
            resources,
            modules,
            watcher,
            resolver,
        }
    }

    /// Add empty assets.
    pub fn files(&self, paths: &[&str]) -> &Self {
        for path in paths {
            self.resources.insert(path, "");
        }
        self
    }

    /// Add a resource with contents.
    pub fn file(&self, path: &str, contents: impl Into<Vec<u8>>) -> &Self {
        self.resources.insert(path, contents);
        self
    }

    /// Fire a watch event for a resource's backing file.
    pub fn fire(&self, path: &str, kind: WatchEventKind) -> usize {
        self.watcher.fire_file(&self.resources.backing_file(path), kind)
    }

    /// Replace a resource and report the change.
    pub fn edit(&self, path: &str, contents: impl Into<Vec<u8>>) -> usize {
        self.resources.insert(path, contents);
        self.fire(path, WatchEventKind::Modify)
    }
}
