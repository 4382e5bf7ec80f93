//! `clientdeps check`
//!
//! Walks every configured web root for `*.lib.xml`, resolves each library in
//! development and production mode, and fails when any does not resolve.
//! A manifest present under several roots is checked once, as served from
//! the first root.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

use super::OutputFormat;
use crate::config::ClientDepsConfig;
use crate::constants::LIBRARY_EXTENSION;
use crate::core::Mode;
use crate::resolver::Resolver;
use crate::specifier::DependencySpecifier;

/// Verify every library manifest under the web roots.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct CheckFailure {
    path: String,
    mode: Mode,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    checked: usize,
    failures: Vec<CheckFailure>,
}

impl CheckCommand {
    /// Run against a loaded configuration.
    pub async fn execute(self, config: &ClientDepsConfig) -> Result<()> {
        let roots = config.resolved_roots();
        let (builder, _registry) = config.resolver_builder();
        let resolver = builder.build();

        let report = tokio::task::spawn_blocking(move || {
            let libraries = find_libraries(&roots);
            check_libraries(&resolver, &libraries)
        })
        .await?;

        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            for failure in &report.failures {
                println!("{} {} ({})", "✗".red(), failure.path, failure.mode);
            }
            let summary = format!(
                "Checked {} librar{}, {} failure(s)",
                report.checked,
                if report.checked == 1 { "y" } else { "ies" },
                report.failures.len()
            );
            if report.failures.is_empty() {
                println!("{} {}", "✓".green(), summary);
            } else {
                println!("{}", summary.red());
            }
        }

        if !report.failures.is_empty() {
            anyhow::bail!("{} library resolution(s) failed", report.failures.len());
        }
        Ok(())
    }
}

/// Library manifests under `roots`, as logical paths with `/` separators.
fn find_libraries(roots: &[std::path::PathBuf]) -> BTreeSet<String> {
    let mut libraries = BTreeSet::new();
    for root in roots {
        if !root.is_dir() {
            tracing::warn!(target: "clientdeps::cli", "Web root {} does not exist", root.display());
            continue;
        }
        for entry in WalkDir::new(root).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if !name.ends_with(LIBRARY_EXTENSION) {
                continue;
            }
            if let Some(logical) = logical_path(root, entry.path()) {
                libraries.insert(logical);
            }
        }
    }
    libraries
}

fn logical_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> =
        relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Some(parts.join("/"))
}

fn check_libraries(resolver: &Resolver, libraries: &BTreeSet<String>) -> CheckReport {
    let mut failures = Vec::new();
    for library in libraries {
        for mode in [Mode::Dev, Mode::Production] {
            let spec = DependencySpecifier::new(library, mode);
            if resolver.resolve(&spec).is_none() {
                failures.push(CheckFailure {
                    path: library.clone(),
                    mode,
                });
            }
        }
    }
    CheckReport {
        checked: libraries.len(),
        failures,
    }
}
