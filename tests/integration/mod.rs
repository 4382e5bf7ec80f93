//! Integration test suite for clientdeps
//!
//! End-to-end tests of resolution, aggregation and invalidation through the
//! public API, plus the command line binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=clientdeps=debug cargo test --test integration -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **aggregation**: ordering, de-duplication, modes and bundles
//! - **cli**: the `clientdeps` binary
//! - **filesystem**: real web roots and OS-native watching
//! - **invalidation**: watch events, module reloads, deferred references
//! - **resolution**: single flight, structural rules, failure handling

mod common;

mod aggregation;
mod cli;
mod filesystem;
mod invalidation;
mod resolution;
