//! Library manifest parsing and library construction.
//!
//! A library manifest (`*.lib.xml`) declares the pieces of a client library:
//!
//! ```xml
//! <libraries xmlns="http://labkey.org/clientLibrary/xml/">
//!     <library compileInProduction="true">
//!         <script path="reports/Grid.js"/>
//!         <script path="reports/Grid.css"/>
//!     </library>
//!     <dependencies>
//!         <dependency path="Ext4"/>
//!         <dependency path="clientapi/core.js" mode="dev"/>
//!     </dependencies>
//!     <requiredModules>
//!         <module name="query"/>
//!     </requiredModules>
//! </libraries>
//! ```
//!
//! Parsing ([`parse_manifest`]) is a pure bytes-to-record step. Building the
//! library node ([`build_library`]) needs to resolve every child, which it
//! does through a [`ChildResolver`] so the cache can supply the recursion.
//!
//! # Children, in order
//!
//! 1. `<dependencies>` entries, at their own mode or the library's
//! 2. one module context per `<requiredModules>` entry that names a known
//!    module
//! 3. `<library>` files, at their own mode, else [`Mode::Dev`] when the
//!    library compiles in production, else the library's mode
//! 4. the pre-built bundles (`<name>.min.js`, `<name>.min.css`) when the
//!    library compiles in production, is not requested dev-only, and has at
//!    least one non-production file of that type
//!
//! A child that resolves to another library is dropped with a warning:
//! libraries cannot include other libraries. A module context that is still
//! being loaded further up the same resolution is kept as a child; the
//! aggregation walk visits each node once, so the cycle is harmless there.

use serde::Deserialize;
use std::sync::Arc;

use crate::constants::{LIBRARY_EXTENSION, MINIFIED_INFIX};
use crate::core::{AssetType, ClientDepsError, Mode};
use crate::modules::ModuleId;
use crate::node::{DependencyNode, LibraryDependency};
use crate::source::Resource;
use crate::specifier::{DependencySpecifier, SpecifierKind};

/// One `path`/`mode` entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Raw identifier as written
    pub path: String,
    /// Explicit mode, `None` to inherit
    pub mode: Option<Mode>,
}

/// The `<library>` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LibraryFiles {
    /// Whether a pre-built bundle replaces the raw files in production
    pub compile_in_production: bool,
    /// Raw script and style files
    pub files: Vec<ManifestEntry>,
}

/// Declaration record parsed from a library manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LibraryManifest {
    /// `<dependencies>` entries
    pub dependencies: Vec<ManifestEntry>,
    /// `<requiredModules>` names
    pub required_modules: Vec<String>,
    /// `<library>` block, if present
    pub library: Option<LibraryFiles>,
}

#[derive(Debug, Deserialize)]
struct LibrariesDocument {
    #[serde(default)]
    library: Option<LibraryElement>,
    #[serde(default)]
    dependencies: Option<DependenciesElement>,
    #[serde(rename = "requiredModules", default)]
    required_modules: Option<RequiredModulesElement>,
}

#[derive(Debug, Deserialize)]
struct LibraryElement {
    #[serde(rename = "@compileInProduction", default)]
    compile_in_production: bool,
    #[serde(rename = "script", default)]
    scripts: Vec<PathElement>,
}

#[derive(Debug, Deserialize)]
struct DependenciesElement {
    #[serde(rename = "dependency", default)]
    entries: Vec<PathElement>,
}

#[derive(Debug, Deserialize)]
struct RequiredModulesElement {
    #[serde(rename = "module", default)]
    modules: Vec<ModuleElement>,
}

#[derive(Debug, Deserialize)]
struct PathElement {
    #[serde(rename = "@path")]
    path: String,
    #[serde(rename = "@mode", default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModuleElement {
    #[serde(rename = "@name")]
    name: String,
}

/// Parse manifest bytes into a declaration record.
///
/// Any syntax error, non-UTF-8 content or unknown mode value fails the
/// whole manifest.
pub fn parse_manifest(bytes: &[u8], resource: &Resource) -> Result<LibraryManifest, ClientDepsError> {
    let parse_error = |reason: String| ClientDepsError::ManifestParseError {
        file: resource.path().to_string(),
        reason,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;
    let document: LibrariesDocument =
        quick_xml::de::from_str(text).map_err(|e| parse_error(e.to_string()))?;

    let convert = |entries: Vec<PathElement>| -> Result<Vec<ManifestEntry>, ClientDepsError> {
        entries
            .into_iter()
            .map(|e| {
                let mode = e.mode.as_deref().map(str::parse::<Mode>).transpose().map_err(|err| {
                    parse_error(format!("entry '{}': {err}", e.path))
                })?;
                Ok(ManifestEntry {
                    path: e.path,
                    mode,
                })
            })
            .collect()
    };

    let dependencies = convert(document.dependencies.map(|d| d.entries).unwrap_or_default())?;
    let required_modules = document
        .required_modules
        .map(|m| m.modules.into_iter().map(|m| m.name).collect())
        .unwrap_or_default();
    let library = document
        .library
        .map(|lib| -> Result<LibraryFiles, ClientDepsError> {
            Ok(LibraryFiles {
                compile_in_production: lib.compile_in_production,
                files: convert(lib.scripts)?,
            })
        })
        .transpose()?;

    Ok(LibraryManifest {
        dependencies,
        required_modules,
        library,
    })
}

/// Outcome of resolving one child while building its parent.
#[derive(Debug, Clone)]
pub enum ChildResolution {
    /// The child is resolved and published.
    Resolved(Arc<DependencyNode>),
    /// The child is an ancestor still being loaded on this resolution chain.
    InProgress,
    /// The child contributes nothing; its loader already logged why.
    Unresolved,
}

impl ChildResolution {
    /// The resolved node, if any.
    pub fn node(self) -> Option<Arc<DependencyNode>> {
        match self {
            Self::Resolved(node) => Some(node),
            Self::InProgress | Self::Unresolved => None,
        }
    }
}

/// Recursion hook used while building a library.
pub trait ChildResolver {
    /// Resolve a child specifier.
    fn resolve_child(&mut self, spec: &DependencySpecifier) -> ChildResolution;

    /// Look a module up by name.
    fn find_module(&self, name: &str) -> Option<ModuleId>;
}

/// Path of the pre-built bundle of a library for `asset_type`.
///
/// `reports.lib.xml` becomes `reports.min.js` for scripts.
pub fn bundle_path(library_path: &str, asset_type: AssetType) -> String {
    let stem = if library_path.to_ascii_lowercase().ends_with(LIBRARY_EXTENSION) {
        &library_path[..library_path.len() - LIBRARY_EXTENSION.len()]
    } else {
        library_path
    };
    format!("{stem}{MINIFIED_INFIX}{}", asset_type.extension())
}

/// Build the library node for a parsed manifest.
pub fn build_library(
    path: &str,
    mode: Mode,
    manifest: &LibraryManifest,
    resolver: &mut impl ChildResolver,
) -> LibraryDependency {
    let mut children = Vec::new();
    let mut required_modules: Vec<ModuleId> = Vec::new();

    for entry in &manifest.dependencies {
        let spec = DependencySpecifier::new(&entry.path, entry.mode.unwrap_or(mode));
        accept_child(path, spec, resolver, &mut children);
    }

    for name in &manifest.required_modules {
        let Some(module) = resolver.find_module(name) else {
            tracing::error!(
                target: "clientdeps::manifest",
                "Unable to find module '{name}' required by {path}"
            );
            continue;
        };
        let spec = DependencySpecifier::module_context(module.name(), mode);
        accept_child(path, spec, resolver, &mut children);
        if !required_modules.contains(&module) {
            required_modules.push(module);
        }
    }

    if let Some(library) = &manifest.library {
        let default_mode = if library.compile_in_production {
            Mode::Dev
        } else {
            mode
        };
        let mut unbundled_scripts = false;
        let mut unbundled_styles = false;

        for entry in &library.files {
            let child_mode = entry.mode.unwrap_or(default_mode);
            let spec = DependencySpecifier::new(&entry.path, child_mode);
            let Some(node) = accept_child(path, spec, resolver, &mut children) else {
                continue;
            };
            if child_mode != Mode::Production {
                match node.primary_type() {
                    Some(AssetType::Script) => unbundled_scripts = true,
                    Some(AssetType::Style) => unbundled_styles = true,
                    _ => {}
                }
            }
        }

        if library.compile_in_production && mode != Mode::Dev {
            for (needed, asset_type) in
                [(unbundled_scripts, AssetType::Script), (unbundled_styles, AssetType::Style)]
            {
                if needed {
                    let spec =
                        DependencySpecifier::new(bundle_path(path, asset_type), Mode::Production);
                    accept_child(path, spec, resolver, &mut children);
                }
            }
        }
    }

    LibraryDependency::new(path, mode, children, required_modules)
}

fn accept_child(
    library_path: &str,
    spec: DependencySpecifier,
    resolver: &mut impl ChildResolver,
    children: &mut Vec<DependencySpecifier>,
) -> Option<Arc<DependencyNode>> {
    let node = match resolver.resolve_child(&spec) {
        ChildResolution::Resolved(node) => node,
        ChildResolution::Unresolved => return None,
        ChildResolution::InProgress => {
            if matches!(spec.kind(), SpecifierKind::Library) {
                warn_library_child(library_path, &spec);
            } else {
                tracing::debug!(
                    target: "clientdeps::manifest",
                    "{} is still loading above {library_path}, keeping it as a deferred child",
                    spec.identifier()
                );
                children.push(spec);
            }
            return None;
        }
    };
    if node.is_library() {
        warn_library_child(library_path, &spec);
        return None;
    }
    children.push(spec);
    Some(node)
}

fn warn_library_child(library_path: &str, spec: &DependencySpecifier) {
    tracing::warn!(
        target: "clientdeps::manifest",
        "Libraries cannot include other libraries: dropping {} from {library_path}",
        spec.identifier()
    );
}
