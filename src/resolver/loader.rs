//! Cache-miss loaders, one per specifier kind.

use std::sync::Arc;

use super::{Resolution, ResolverInner};
use crate::core::{AssetType, Mode};
use crate::manifest::{ChildResolution, ChildResolver, build_library, parse_manifest};
use crate::modules::ModuleId;
use crate::node::{DependencyNode, FileDependency, ModuleContextDependency};
use crate::specifier::{CacheKey, DependencySpecifier, SpecifierKind};

/// Resolves manifest children on the loading thread's chain.
struct ChainResolver<'a> {
    inner: &'a Arc<ResolverInner>,
    chain: &'a mut Vec<CacheKey>,
}

impl ChildResolver for ChainResolver<'_> {
    fn resolve_child(&mut self, spec: &DependencySpecifier) -> ChildResolution {
        self.inner.resolve_child(spec, self.chain)
    }

    fn find_module(&self, name: &str) -> Option<ModuleId> {
        self.inner.modules.module(name)
    }
}

impl ResolverInner {
    pub(super) fn load(
        self: &Arc<Self>,
        spec: &DependencySpecifier,
        key: &CacheKey,
        chain: &mut Vec<CacheKey>,
    ) -> Resolution {
        tracing::trace!(target: "clientdeps::resolver", "Loading {key}");
        match spec.kind() {
            SpecifierKind::File(asset_type) => self.load_file(spec, *asset_type),
            SpecifierKind::Library => self.load_library(spec, key, chain),
            SpecifierKind::ModuleContext {
                module,
            } => self.load_module_context(spec, module, chain),
            SpecifierKind::External {
                ..
            } => None,
        }
    }

    fn load_file(&self, spec: &DependencySpecifier, asset_type: AssetType) -> Resolution {
        let path = spec.identifier();
        if self.resources.lookup(path).is_none() {
            if self.tolerates_missing(spec.mode()) {
                tracing::debug!(
                    target: "clientdeps::resolver",
                    "Production file {path} not built in development deployment"
                );
            } else {
                tracing::error!(target: "clientdeps::resolver", "Client dependency file not found: {path}");
                return None;
            }
        }
        Some(Arc::new(DependencyNode::File(FileDependency::new(path, asset_type, spec.mode()))))
    }

    fn load_library(
        self: &Arc<Self>,
        spec: &DependencySpecifier,
        key: &CacheKey,
        chain: &mut Vec<CacheKey>,
    ) -> Resolution {
        let path = spec.identifier();
        let Some(resource) = self.resources.lookup(path) else {
            if self.tolerates_missing(spec.mode()) {
                tracing::debug!(
                    target: "clientdeps::resolver",
                    "Library {path} missing for production request in development deployment"
                );
            } else {
                tracing::error!(target: "clientdeps::resolver", "Client library not found: {path}");
            }
            return None;
        };

        // Watch before reading so an edit racing this load still invalidates
        self.track(&resource, key);

        let bytes = match self.resources.read(&resource) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(target: "clientdeps::resolver", "{e}");
                return None;
            }
        };
        let manifest = match parse_manifest(&bytes, &resource) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!(target: "clientdeps::resolver", "{e}");
                return None;
            }
        };

        let mut children = ChainResolver {
            inner: self,
            chain,
        };
        let library = build_library(path, spec.mode(), &manifest, &mut children);
        Some(Arc::new(DependencyNode::Library(library)))
    }

    fn load_module_context(
        self: &Arc<Self>,
        spec: &DependencySpecifier,
        name: &str,
        chain: &mut Vec<CacheKey>,
    ) -> Resolution {
        let Some(module) = self.modules.module(name) else {
            tracing::error!(target: "clientdeps::resolver", "Unknown module '{name}' in {}", spec.identifier());
            return None;
        };

        // Every declared dependency stays a child. One that fails now is
        // skipped by the aggregation walk and comes back once it is fixed.
        let mode = spec.mode();
        let children: Vec<DependencySpecifier> = self
            .modules
            .module_dependencies(&module)
            .into_iter()
            .map(|dep| if dep.mode() == Mode::Both { dep.with_mode(mode) } else { dep })
            .collect();
        for dep in &children {
            self.resolve_child(dep, chain);
        }

        Some(Arc::new(DependencyNode::ModuleContext(ModuleContextDependency::new(
            spec.identifier(),
            module,
            mode,
            children,
        ))))
    }
}
