//! Dependency declarations.
//!
//! A [`DependencySpecifier`] is the immutable, normalized form of one
//! requested dependency: an identifier (asset path, library name, module
//! context or absolute URL) plus the [`Mode`] it was requested in. Parsing is
//! pure; nothing here touches the resource resolver or the cache.
//!
//! # Normalization
//!
//! - Leading slashes are stripped: `/query/Grid.js` becomes `query/Grid.js`.
//! - An identifier ending in `.lib` gets `.xml` appended.
//! - Any other identifier without a recognized extension is assumed to name
//!   a library manifest and gets `.lib.xml` appended: `Ext4` becomes
//!   `Ext4.lib.xml`.
//! - `http://` and `https://` identifiers are external and left untouched.
//!
//! Cache identity is the lowercased normalized identifier plus the mode, see
//! [`CacheKey`].

use std::fmt;

use crate::constants::{CONTEXT_EXTENSION, LIBRARY_EXTENSION};
use crate::core::{AssetType, Mode};

/// How a specifier will be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecifierKind {
    /// A single script, style or manifest asset
    File(AssetType),
    /// A library manifest (`.lib.xml`)
    Library,
    /// Every dependency declared by a module (`<module>.context`)
    ModuleContext {
        /// Module name as written in the identifier
        module: String,
    },
    /// An absolute URL; never cached, never watched
    External {
        /// Type inferred from the URL suffix, `None` when unrecognized
        asset_type: Option<AssetType>,
    },
}

/// A normalized, immutable dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySpecifier {
    identifier: String,
    mode: Mode,
    kind: SpecifierKind,
}

impl DependencySpecifier {
    /// Parse and normalize a raw identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use clientdeps::core::Mode;
    /// use clientdeps::specifier::DependencySpecifier;
    ///
    /// let spec = DependencySpecifier::new("/reports.lib", Mode::Both);
    /// assert_eq!(spec.identifier(), "reports.lib.xml");
    /// ```
    pub fn new(raw: impl AsRef<str>, mode: Mode) -> Self {
        let raw = raw.as_ref().trim();

        if is_external(raw) {
            let asset_type = external_asset_type(raw);
            if asset_type.is_none() {
                tracing::warn!(
                    target: "clientdeps::specifier",
                    "Unable to determine asset type of external dependency {raw}"
                );
            }
            return Self {
                identifier: raw.to_string(),
                mode,
                kind: SpecifierKind::External {
                    asset_type,
                },
            };
        }

        let identifier = normalize_identifier(raw);
        let kind = match AssetType::from_path(&identifier) {
            Some(AssetType::Library) | None => SpecifierKind::Library,
            Some(AssetType::ModuleContext) => SpecifierKind::ModuleContext {
                module: identifier[..identifier.len() - CONTEXT_EXTENSION.len()].to_string(),
            },
            Some(asset_type) => SpecifierKind::File(asset_type),
        };

        Self {
            identifier,
            mode,
            kind,
        }
    }

    /// Parse an identifier requested in [`Mode::Both`].
    pub fn parse(raw: impl AsRef<str>) -> Self {
        Self::new(raw, Mode::Both)
    }

    /// Specifier for the context of the named module.
    pub fn module_context(module: &str, mode: Mode) -> Self {
        Self::new(format!("{module}{CONTEXT_EXTENSION}"), mode)
    }

    /// The same identifier requested in another mode.
    #[must_use]
    pub fn with_mode(&self, mode: Mode) -> Self {
        Self {
            identifier: self.identifier.clone(),
            mode,
            kind: self.kind.clone(),
        }
    }

    /// Normalized identifier (external URLs verbatim).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Requested mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// How the specifier resolves.
    pub fn kind(&self) -> &SpecifierKind {
        &self.kind
    }

    /// Whether this is an absolute URL.
    pub fn is_external(&self) -> bool {
        matches!(self.kind, SpecifierKind::External { .. })
    }

    /// Type of the asset this specifier points at, when known.
    pub fn asset_type(&self) -> Option<AssetType> {
        match &self.kind {
            SpecifierKind::File(t) => Some(*t),
            SpecifierKind::Library => Some(AssetType::Library),
            SpecifierKind::ModuleContext {
                ..
            } => Some(AssetType::ModuleContext),
            SpecifierKind::External {
                asset_type,
            } => *asset_type,
        }
    }

    /// Cache identity of this specifier.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.identifier, self.mode)
    }
}

impl fmt::Display for DependencySpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.mode)
    }
}

/// Identity of a cached resolution: lowercased identifier plus mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    identifier: String,
    mode: Mode,
}

impl CacheKey {
    /// Build a key; the identifier is lowercased.
    pub fn new(identifier: &str, mode: Mode) -> Self {
        Self {
            identifier: identifier.to_lowercase(),
            mode,
        }
    }

    /// Lowercased identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Mode component.
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.identifier, self.mode)
    }
}

fn is_external(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn external_asset_type(url: &str) -> Option<AssetType> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    AssetType::from_path(&url[..end]).filter(AssetType::is_emitted)
}

fn normalize_identifier(raw: &str) -> String {
    let mut identifier = raw.trim_start_matches('/').to_string();
    if identifier.to_ascii_lowercase().ends_with(".lib") {
        identifier.push_str(".xml");
    } else if AssetType::from_path(&identifier).is_none() {
        identifier.push_str(LIBRARY_EXTENSION);
    }
    identifier
}
