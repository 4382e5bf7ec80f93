//! Asset types and resolution modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    CONTEXT_EXTENSION, LIBRARY_EXTENSION, MANIFEST_EXTENSION, SCRIPT_EXTENSION, STYLE_EXTENSION,
};
use crate::core::ClientDepsError;

/// The kind of asset a dependency node stands for.
///
/// Only [`Script`](AssetType::Script), [`Style`](AssetType::Style) and
/// [`Manifest`](AssetType::Manifest) are emitted as paths by the aggregation
/// layer. Libraries and module contexts are containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetType {
    /// JavaScript file (`.js`)
    Script,
    /// Stylesheet (`.css`)
    Style,
    /// Client-side manifest asset (`.json`)
    Manifest,
    /// Library manifest (`.lib.xml`)
    Library,
    /// All dependencies declared by a module (`.context`)
    ModuleContext,
}

impl AssetType {
    /// The asset types that produce emitted paths.
    pub const EMITTED: [AssetType; 3] = [AssetType::Script, AssetType::Style, AssetType::Manifest];

    /// File extension associated with this asset type.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            AssetType::Script => SCRIPT_EXTENSION,
            AssetType::Style => STYLE_EXTENSION,
            AssetType::Manifest => MANIFEST_EXTENSION,
            AssetType::Library => LIBRARY_EXTENSION,
            AssetType::ModuleContext => CONTEXT_EXTENSION,
        }
    }

    /// Detect the asset type of a path from its suffix, case-insensitively.
    ///
    /// `.lib.xml` is checked before any single-segment extension.
    #[must_use]
    pub fn from_path(path: &str) -> Option<AssetType> {
        let lower = path.to_ascii_lowercase();
        [
            AssetType::Library,
            AssetType::ModuleContext,
            AssetType::Script,
            AssetType::Style,
            AssetType::Manifest,
        ]
        .into_iter()
        .find(|t| lower.ends_with(t.extension()))
    }

    /// Whether the aggregation layer emits paths for this type.
    #[must_use]
    pub fn is_emitted(&self) -> bool {
        Self::EMITTED.contains(self)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetType::Script => write!(f, "script"),
            AssetType::Style => write!(f, "style"),
            AssetType::Manifest => write!(f, "manifest"),
            AssetType::Library => write!(f, "library"),
            AssetType::ModuleContext => write!(f, "module-context"),
        }
    }
}

impl FromStr for AssetType {
    type Err = ClientDepsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "script" | "js" => Ok(AssetType::Script),
            "style" | "css" => Ok(AssetType::Style),
            "manifest" | "json" => Ok(AssetType::Manifest),
            "library" | "lib" => Ok(AssetType::Library),
            "module-context" | "context" => Ok(AssetType::ModuleContext),
            _ => Err(ClientDepsError::InvalidAssetType {
                asset_type: s.to_string(),
            }),
        }
    }
}

/// Which built artifact a dependency exposes.
///
/// A node resolved in [`Dev`](Mode::Dev) only answers development requests,
/// one resolved in [`Production`](Mode::Production) only answers production
/// requests, and [`Both`](Mode::Both) answers either.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Individual source files
    Dev,
    /// Pre-built bundles
    Production,
    /// Either
    #[default]
    Both,
}

impl Mode {
    /// Whether a node in this mode answers a request in `requested` mode.
    ///
    /// A [`Both`](Mode::Both) request is answered by every node.
    #[must_use]
    pub fn answers(self, requested: Mode) -> bool {
        match (self, requested) {
            (Mode::Both, _) | (_, Mode::Both) => true,
            (a, b) => a == b,
        }
    }

    /// Pick a concrete mode for a [`Both`](Mode::Both) request using the
    /// deployment flag. Concrete modes are returned unchanged.
    #[must_use]
    pub fn effective(self, dev_deployment: bool) -> Mode {
        match self {
            Mode::Both if dev_deployment => Mode::Dev,
            Mode::Both => Mode::Production,
            concrete => concrete,
        }
    }

    /// Whether a node in this mode carries a development path.
    #[must_use]
    pub fn has_dev_path(self) -> bool {
        self != Mode::Production
    }

    /// Whether a node in this mode carries a production path.
    #[must_use]
    pub fn has_prod_path(self) -> bool {
        self != Mode::Dev
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Dev => write!(f, "dev"),
            Mode::Production => write!(f, "production"),
            Mode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for Mode {
    type Err = ClientDepsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Mode::Dev),
            "production" | "prod" => Ok(Mode::Production),
            "both" => Ok(Mode::Both),
            _ => Err(ClientDepsError::InvalidMode {
                mode: s.to_string(),
            }),
        }
    }
}
