//! Aggregation of client dependencies for rendering.
//!
//! [`ClientDependencies`] is what a page or view holds. It collects
//! deferred references and, when asked, walks them into flat, ordered,
//! de-duplicated path lists per asset type plus the set of modules whose
//! client context must be emitted.
//!
//! The walk is pre-order in declaration order. A node already visited in the
//! current walk is skipped, so diamonds and cycles cost nothing. References
//! that fail to resolve contribute nothing; their loader already logged.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{AssetType, Mode};
use crate::modules::ModuleId;
use crate::node::DependencyNode;
use crate::resolver::Resolver;
use crate::specifier::{CacheKey, DependencySpecifier};
use crate::supplier::DependencySupplier;

/// Anything that can be added to a [`ClientDependencies`].
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Raw identifier, requested in [`Mode::Both`]
    Path(String),
    /// Parsed specifier
    Specifier(DependencySpecifier),
    /// Existing deferred reference
    Supplier(DependencySupplier),
}

impl From<&str> for Dependency {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Dependency {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<DependencySpecifier> for Dependency {
    fn from(spec: DependencySpecifier) -> Self {
        Self::Specifier(spec)
    }
}

impl From<DependencySupplier> for Dependency {
    fn from(supplier: DependencySupplier) -> Self {
        Self::Supplier(supplier)
    }
}

/// Flattened output of one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedDependencies {
    /// Mode the paths were selected for
    pub mode: Mode,
    /// Script paths in emit order
    pub scripts: Vec<String>,
    /// Style paths in emit order
    pub styles: Vec<String>,
    /// Manifest asset paths in emit order
    pub manifests: Vec<String>,
    /// Modules whose client context is required
    pub required_modules: Vec<ModuleId>,
}

/// Ordered collection of deferred dependency references.
#[derive(Debug, Clone)]
pub struct ClientDependencies {
    resolver: Resolver,
    dependencies: Vec<DependencySupplier>,
}

impl ClientDependencies {
    /// Empty collection resolving through `resolver`.
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            dependencies: Vec::new(),
        }
    }

    /// Append a dependency.
    pub fn add_dependency(&mut self, dependency: impl Into<Dependency>) -> &mut Self {
        let supplier = match dependency.into() {
            Dependency::Path(path) => self.resolver.supplier(DependencySpecifier::parse(path)),
            Dependency::Specifier(spec) => self.resolver.supplier(spec),
            Dependency::Supplier(supplier) => supplier,
        };
        self.dependencies.push(supplier);
        self
    }

    /// Number of top-level references.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether nothing was added.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Mode paths are selected for: development or production, following
    /// the deployment.
    pub fn render_mode(&self) -> Mode {
        Mode::Both.effective(self.resolver.dev_mode())
    }

    /// Paths of `asset_type` for a `requested` mode.
    ///
    /// [`Mode::Both`] is resolved against the deployment first.
    pub fn paths(&self, asset_type: AssetType, requested: Mode) -> Vec<String> {
        let requested = requested.effective(self.resolver.dev_mode());
        let mut paths = Vec::new();
        let mut seen = HashSet::new();
        self.walk(|node| {
            if node.primary_type() != Some(asset_type) {
                return;
            }
            let Some(path) = node.path_for(requested) else {
                return;
            };
            if seen.insert(path.to_lowercase()) {
                paths.push(path.to_string());
            }
        });
        paths
    }

    /// Script paths for the deployment's mode.
    pub fn script_paths(&self) -> Vec<String> {
        self.paths(AssetType::Script, Mode::Both)
    }

    /// Style paths for the deployment's mode.
    pub fn style_paths(&self) -> Vec<String> {
        self.paths(AssetType::Style, Mode::Both)
    }

    /// Manifest asset paths for the deployment's mode.
    pub fn manifest_paths(&self) -> Vec<String> {
        self.paths(AssetType::Manifest, Mode::Both)
    }

    /// Modules required anywhere in the graph, first-seen order.
    pub fn required_modules(&self) -> Vec<ModuleId> {
        let mut modules: Vec<ModuleId> = Vec::new();
        self.walk(|node| {
            for module in node.required_modules() {
                if !modules.contains(module) {
                    modules.push(module.clone());
                }
            }
        });
        modules
    }

    /// Everything a template needs, for a `requested` mode.
    pub fn render(&self, requested: Mode) -> RenderedDependencies {
        let mode = requested.effective(self.resolver.dev_mode());
        RenderedDependencies {
            mode,
            scripts: self.paths(AssetType::Script, mode),
            styles: self.paths(AssetType::Style, mode),
            manifests: self.paths(AssetType::Manifest, mode),
            required_modules: self.required_modules(),
        }
    }

    fn walk(&self, mut visit: impl FnMut(&DependencyNode)) {
        let mut visited = HashSet::new();
        for supplier in &self.dependencies {
            if let Some(node) = supplier.get() {
                self.visit(&node, &mut visited, &mut visit);
            }
        }
    }

    fn visit(
        &self,
        node: &Arc<DependencyNode>,
        visited: &mut HashSet<CacheKey>,
        visit: &mut impl FnMut(&DependencyNode),
    ) {
        if !visited.insert(node.key()) {
            return;
        }
        visit(node);
        for child in node.children() {
            if let Some(child) = self.resolver.resolve(child) {
                self.visit(&child, visited, visit);
            }
        }
    }
}
