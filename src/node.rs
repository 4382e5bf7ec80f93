//! Resolved dependency nodes.
//!
//! [`DependencyNode`] is a closed sum over the four things a specifier can
//! resolve to. Every behavior is a pure function of the variant's fields, so
//! nodes are immutable once built and are shared between threads as
//! `Arc<DependencyNode>` without any locking.
//!
//! Children are stored as [`DependencySpecifier`]s, not as resolved nodes.
//! Walking a node re-resolves each child through the cache, which is what
//! keeps a cached library from pinning a child that has since been
//! invalidated.
//!
//! Path invariant shared by all variants: the development path is present
//! unless the node's mode is [`Mode::Production`], the production path is
//! present unless the mode is [`Mode::Dev`].

use crate::core::{AssetType, Mode};
use crate::modules::ModuleId;
use crate::specifier::{CacheKey, DependencySpecifier};

/// A single concrete asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDependency {
    path: String,
    asset_type: AssetType,
    mode: Mode,
}

impl FileDependency {
    /// Create a file node; `asset_type` must be an emitted type.
    pub fn new(path: impl Into<String>, asset_type: AssetType, mode: Mode) -> Self {
        Self {
            path: path.into(),
            asset_type,
            mode,
        }
    }

    /// Resolved asset path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A parsed library manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDependency {
    path: String,
    mode: Mode,
    children: Vec<DependencySpecifier>,
    required_modules: Vec<ModuleId>,
}

impl LibraryDependency {
    /// Create a library node from its validated children.
    ///
    /// The caller guarantees no child resolves to a library.
    pub fn new(
        path: impl Into<String>,
        mode: Mode,
        children: Vec<DependencySpecifier>,
        required_modules: Vec<ModuleId>,
    ) -> Self {
        Self {
            path: path.into(),
            mode,
            children,
            required_modules,
        }
    }

    /// Manifest path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Every dependency declared by one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContextDependency {
    path: String,
    module: ModuleId,
    mode: Mode,
    children: Vec<DependencySpecifier>,
}

impl ModuleContextDependency {
    /// Create a module context node.
    pub fn new(
        path: impl Into<String>,
        module: ModuleId,
        mode: Mode,
        children: Vec<DependencySpecifier>,
    ) -> Self {
        Self {
            path: path.into(),
            module,
            mode,
            children,
        }
    }

    /// The wrapped module.
    pub fn module(&self) -> &ModuleId {
        &self.module
    }
}

/// An absolute URL, opaque to local resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDependency {
    url: String,
    asset_type: Option<AssetType>,
    mode: Mode,
}

impl ExternalDependency {
    /// Create an external node.
    pub fn new(url: impl Into<String>, asset_type: Option<AssetType>, mode: Mode) -> Self {
        Self {
            url: url.into(),
            asset_type,
            mode,
        }
    }

    /// Build the node an external specifier stands for.
    pub fn from_specifier(spec: &DependencySpecifier) -> Self {
        Self::new(spec.identifier(), spec.asset_type(), spec.mode())
    }

    /// The URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyNode {
    /// A single asset
    File(FileDependency),
    /// A library manifest
    Library(LibraryDependency),
    /// A module's declared dependencies
    ModuleContext(ModuleContextDependency),
    /// An absolute URL
    External(ExternalDependency),
}

impl DependencyNode {
    fn path(&self) -> &str {
        match self {
            DependencyNode::File(f) => &f.path,
            DependencyNode::Library(l) => &l.path,
            DependencyNode::ModuleContext(m) => &m.path,
            DependencyNode::External(e) => &e.url,
        }
    }

    /// Primary asset type; `None` only for an external of unknown type.
    pub fn primary_type(&self) -> Option<AssetType> {
        match self {
            DependencyNode::File(f) => Some(f.asset_type),
            DependencyNode::Library(_) => Some(AssetType::Library),
            DependencyNode::ModuleContext(_) => Some(AssetType::ModuleContext),
            DependencyNode::External(e) => e.asset_type,
        }
    }

    /// Mode this node was resolved in.
    pub fn mode(&self) -> Mode {
        match self {
            DependencyNode::File(f) => f.mode,
            DependencyNode::Library(l) => l.mode,
            DependencyNode::ModuleContext(m) => m.mode,
            DependencyNode::External(e) => e.mode,
        }
    }

    /// Development path, absent for production-only nodes.
    pub fn dev_path(&self) -> Option<&str> {
        self.mode().has_dev_path().then(|| self.path())
    }

    /// Production path, absent for development-only nodes.
    pub fn prod_path(&self) -> Option<&str> {
        self.mode().has_prod_path().then(|| self.path())
    }

    /// Path to emit for a request in `requested` mode.
    ///
    /// A development request never consults the production path and vice
    /// versa. A [`Mode::Both`] request prefers the development path.
    pub fn path_for(&self, requested: Mode) -> Option<&str> {
        match requested {
            Mode::Dev => self.dev_path(),
            Mode::Production => self.prod_path(),
            Mode::Both => self.dev_path().or_else(|| self.prod_path()),
        }
    }

    /// Child specifiers in declaration order.
    pub fn children(&self) -> &[DependencySpecifier] {
        match self {
            DependencyNode::Library(l) => &l.children,
            DependencyNode::ModuleContext(m) => &m.children,
            DependencyNode::File(_) | DependencyNode::External(_) => &[],
        }
    }

    /// Modules whose client-side context this node requires.
    ///
    /// A module context always requires its own module.
    pub fn required_modules(&self) -> &[ModuleId] {
        match self {
            DependencyNode::Library(l) => &l.required_modules,
            DependencyNode::ModuleContext(m) => std::slice::from_ref(&m.module),
            DependencyNode::File(_) | DependencyNode::External(_) => &[],
        }
    }

    /// Whether this is a library.
    pub fn is_library(&self) -> bool {
        matches!(self, DependencyNode::Library(_))
    }

    /// Whether this is an external URL.
    pub fn is_external(&self) -> bool {
        matches!(self, DependencyNode::External(_))
    }

    /// Walk identity of the node: lowercased path plus mode.
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.path(), self.mode())
    }
}
