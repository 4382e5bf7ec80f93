//! Global constants used throughout the clientdeps codebase.
//!
//! File extensions, cache sizing defaults, and timeouts live here so that
//! the naming conventions shared by the specifier, manifest and cache
//! modules are defined exactly once.

use std::time::Duration;

/// Extension of a library manifest file.
///
/// Identifiers without a recognized extension are assumed to name a library
/// manifest and get this extension appended.
pub const LIBRARY_EXTENSION: &str = ".lib.xml";

/// Extension of a module context specifier (`query.context`).
pub const CONTEXT_EXTENSION: &str = ".context";

/// Extension of a script asset.
pub const SCRIPT_EXTENSION: &str = ".js";

/// Extension of a style asset.
pub const STYLE_EXTENSION: &str = ".css";

/// Extension of a manifest asset (client-side application manifest).
pub const MANIFEST_EXTENSION: &str = ".json";

/// Infix inserted before the extension of a pre-built production bundle.
pub const MINIFIED_INFIX: &str = ".min";

/// Default upper bound on resolved entries held by the resolution cache.
///
/// Manifests are few and leaf assets are many; the bound only exists to keep
/// memory in check when invalidation is missed.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default time-to-live of a cached resolution (30 days).
///
/// Correctness relies on explicit invalidation; the TTL is a safety net.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default time a caller waits on another thread's in-flight load (10 seconds).
///
/// After this the waiter loads the entry itself, which keeps a cross-thread
/// cycle through module contexts from deadlocking.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(10);

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "clientdeps.toml";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "CLIENTDEPS_CONFIG";

/// Environment variable overriding the configured deployment mode.
pub const DEV_MODE_ENV: &str = "CLIENTDEPS_DEV_MODE";
