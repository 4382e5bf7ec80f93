//! Configuration management for clientdeps
//!
//! A deployment is described by one TOML file, `clientdeps.toml`:
//!
//! ```toml
//! # Serve individual source files instead of pre-built bundles
//! dev_mode = false
//!
//! # Web roots searched in order; relative paths resolve against this file
//! roots = ["webapp", "modules/query/web"]
//!
//! [cache]
//! max_entries = 10000
//! ttl_secs = 2592000
//! pending_timeout_ms = 10000
//!
//! # Module declarations for the static module registry
//! [modules.query]
//! dependencies = ["clientapi/core.js", "query/QueryGrid.lib.xml"]
//! ```
//!
//! # Location
//!
//! 1. `--config <path>` on the command line
//! 2. the `CLIENTDEPS_CONFIG` environment variable
//! 3. `clientdeps.toml` in the current directory
//!
//! An explicitly named file must exist. When the default file is absent the
//! built-in defaults are used. `CLIENTDEPS_DEV_MODE` overrides `dev_mode`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::constants::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL,
    DEFAULT_PENDING_TIMEOUT, DEV_MODE_ENV,
};
use crate::core::ClientDepsError;
use crate::modules::{ModuleDeclaration, StaticModuleRegistry};
use crate::resolver::ResolverBuilder;
use crate::source::FileSystemResolver;

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached resolutions
    pub max_entries: usize,
    /// Time-to-live of a resolution, in seconds
    pub ttl_secs: u64,
    /// Wait on another thread's load, in milliseconds
    pub pending_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT.as_millis() as u64,
        }
    }
}

/// One `[modules.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Raw dependency identifiers, in order
    pub dependencies: Vec<String>,
}

/// Deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientDepsConfig {
    /// Development deployment
    pub dev_mode: bool,
    /// Web roots, searched in order
    pub roots: Vec<PathBuf>,
    /// Cache bounds
    pub cache: CacheConfig,
    /// Module declarations by name
    pub modules: BTreeMap<String, ModuleConfig>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Default for ClientDepsConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            roots: vec![PathBuf::from("webapp")],
            cache: CacheConfig::default(),
            modules: BTreeMap::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl ClientDepsConfig {
    /// Load the configuration, following the lookup order above, and apply
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                if !path.is_file() {
                    return Err(ClientDepsError::ConfigError {
                        message: format!("Configuration file {} does not exist", path.display()),
                    })
                    .with_context(|| format!("Failed to load {}", path.display()));
                }
                Self::load_from(&path)?
            }
            None => {
                let path = PathBuf::from(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::load_from(&path)?
                } else {
                    tracing::debug!(target: "clientdeps::config", "No {CONFIG_FILE_NAME} found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_dev_mode_override(std::env::var(DEV_MODE_ENV).ok().as_deref());
        Ok(config)
    }

    /// Load a configuration file without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_toml(&content, &path.display().to_string(), base_dir)
    }

    /// Parse configuration text; `base_dir` anchors relative roots.
    pub fn from_toml(content: &str, file: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| ClientDepsError::ConfigParseError {
            file: file.to_string(),
            reason: e.to_string(),
        })?;
        config.base_dir = base_dir.into();
        config.validate()?;
        tracing::debug!(
            target: "clientdeps::config",
            "Loaded {file}: {} root(s), {} module(s)",
            config.roots.len(),
            config.modules.len()
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ClientDepsError> {
        if self.roots.is_empty() {
            return Err(ClientDepsError::ConfigError {
                message: "at least one web root is required".to_string(),
            });
        }
        if self.cache.max_entries == 0 {
            return Err(ClientDepsError::ConfigError {
                message: "cache.max_entries must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Apply a `CLIENTDEPS_DEV_MODE` value; unrecognized values are ignored
    /// with a warning.
    pub fn apply_dev_mode_override(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => self.dev_mode = true,
            "0" | "false" | "no" | "off" => self.dev_mode = false,
            other => tracing::warn!(
                target: "clientdeps::config",
                "Ignoring {DEV_MODE_ENV}={other}: expected true or false"
            ),
        }
    }

    /// Web roots with relative entries resolved against the config file.
    pub fn resolved_roots(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .map(|root| if root.is_absolute() { root.clone() } else { self.base_dir.join(root) })
            .collect()
    }

    /// Cache settings derived from the `[cache]` table.
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_entries: self.cache.max_entries,
            ttl: Duration::from_secs(self.cache.ttl_secs),
            pending_timeout: Duration::from_millis(self.cache.pending_timeout_ms),
        }
    }

    /// Declarations for a [`StaticModuleRegistry`].
    pub fn module_declarations(&self) -> Vec<ModuleDeclaration> {
        self.modules
            .iter()
            .map(|(name, module)| ModuleDeclaration::new(name.clone(), module.dependencies.clone()))
            .collect()
    }

    /// Resolver builder over the configured roots and modules.
    ///
    /// The registry is returned too so callers can reload it later.
    pub fn resolver_builder(&self) -> (ResolverBuilder, Arc<StaticModuleRegistry>) {
        let registry = Arc::new(StaticModuleRegistry::new(self.module_declarations()));
        let builder = ResolverBuilder::new(Arc::new(FileSystemResolver::new(self.resolved_roots())))
            .modules(registry.clone())
            .dev_mode(self.dev_mode)
            .cache_settings(self.cache_settings());
        (builder, registry)
    }
}
