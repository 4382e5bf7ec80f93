//! clientdeps - client asset dependency resolution
//!
//! Pages and plugin modules declare the scripts, styles and application
//! manifests they need, directly or through library manifests
//! (`*.lib.xml`). clientdeps resolves those declarations into ordered,
//! de-duplicated path lists, choosing per asset between the development
//! path (individual files) and the production path (pre-built bundles).
//!
//! # Architecture Overview
//!
//! ```text
//! specifier ──▶ supplier ──▶ resolver ──▶ cache ──miss──▶ loader
//!                                │                          │
//!                                │                 manifest / modules / files
//!                                ▼
//!                           aggregate ──▶ script_paths / style_paths / ...
//! ```
//!
//! - [`specifier`] - normalized, immutable dependency declarations
//! - [`node`] - resolved nodes: file, library, module context, external
//! - [`manifest`] - library manifest parsing and library construction
//! - [`cache`] - single-flight resolution cache with TTL and LRU bounds
//! - [`resolver`] - the injected resolver: cache, loaders and invalidation
//! - [`supplier`] - deferred references that re-resolve on every use
//! - [`aggregate`] - flattening into per-type path lists for templates
//!
//! External collaborators sit behind traits:
//! - [`source`] - "does this path exist" and "read its bytes"
//! - [`modules`] - module lookup, declared dependencies, reload broadcasts
//! - [`watch`] - filesystem change notification
//!
//! Supporting modules: [`config`] (`clientdeps.toml`), [`core`] (asset
//! types, modes, errors), [`cli`] and [`constants`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use clientdeps::resolver::Resolver;
//! use clientdeps::test_utils::{MemoryResources, library_xml};
//!
//! let resources = Arc::new(MemoryResources::new());
//! resources.insert("reports.lib.xml", library_xml(&["core/api.js"], &["reports/Grid.js"]));
//! resources.insert("core/api.js", "");
//! resources.insert("reports/Grid.js", "");
//!
//! let resolver = Resolver::builder(resources).dev_mode(true).build();
//! let mut page = resolver.client_dependencies();
//! page.add_dependency("reports.lib");
//!
//! assert_eq!(page.script_paths(), vec!["core/api.js", "reports/Grid.js"]);
//! ```
//!
//! # Invalidation
//!
//! Resolved nodes are cached until the manifest they were loaded from
//! changes on disk or the module registry broadcasts a reload. Long-lived
//! holders keep [`supplier::DependencySupplier`]s, never nodes.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod manifest;
pub mod modules;
pub mod node;
pub mod resolver;
pub mod source;
pub mod specifier;
pub mod supplier;
pub mod watch;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
