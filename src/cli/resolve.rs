//! `clientdeps resolve`

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;

use crate::aggregate::{ClientDependencies, RenderedDependencies};
use crate::config::ClientDepsConfig;
use crate::core::Mode;
use crate::specifier::DependencySpecifier;

/// Output format shared by the subcommands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

/// Which path lists to print.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TypeFilter {
    /// Scripts only
    Script,
    /// Styles only
    Style,
    /// Manifest assets only
    Manifest,
    /// Everything
    #[default]
    All,
}

/// Resolve dependencies and print the emitted paths.
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Dependency identifiers: files, libraries (`Ext4`, `reports.lib`),
    /// module contexts (`query.context`) or URLs
    #[arg(required = true)]
    pub specs: Vec<String>,

    /// Mode to request: dev, production or both (deployment default)
    #[arg(long, default_value = "both")]
    pub mode: Mode,

    /// Restrict output to one asset type
    #[arg(long = "type", value_enum, default_value_t = TypeFilter::All)]
    pub asset_type: TypeFilter,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl ResolveCommand {
    /// Run against a loaded configuration.
    pub async fn execute(self, config: &ClientDepsConfig) -> Result<()> {
        let (builder, _registry) = config.resolver_builder();
        let resolver = builder.build();

        let mut dependencies = resolver.client_dependencies();
        for spec in &self.specs {
            dependencies.add_dependency(DependencySpecifier::new(spec, self.mode));
        }

        let rendered = render_blocking(dependencies, self.mode).await?;
        print_rendered(&rendered, self.asset_type, self.format)
    }
}

/// Walk `dependencies` on the blocking pool.
pub(crate) async fn render_blocking(
    dependencies: ClientDependencies,
    mode: Mode,
) -> Result<RenderedDependencies> {
    tokio::task::spawn_blocking(move || dependencies.render(mode))
        .await
        .context("Dependency resolution task failed")
}

/// Drop the lists `filter` excludes.
pub(crate) fn apply_filter(mut rendered: RenderedDependencies, filter: TypeFilter) -> RenderedDependencies {
    match filter {
        TypeFilter::Script => {
            rendered.styles.clear();
            rendered.manifests.clear();
        }
        TypeFilter::Style => {
            rendered.scripts.clear();
            rendered.manifests.clear();
        }
        TypeFilter::Manifest => {
            rendered.scripts.clear();
            rendered.styles.clear();
        }
        TypeFilter::All => {}
    }
    rendered
}

pub(crate) fn print_rendered(
    rendered: &RenderedDependencies,
    filter: TypeFilter,
    format: OutputFormat,
) -> Result<()> {
    let rendered = apply_filter(rendered.clone(), filter);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    let sections = [
        ("Scripts", &rendered.scripts, filter != TypeFilter::Style && filter != TypeFilter::Manifest),
        ("Styles", &rendered.styles, filter != TypeFilter::Script && filter != TypeFilter::Manifest),
        ("Manifests", &rendered.manifests, filter != TypeFilter::Script && filter != TypeFilter::Style),
    ];

    println!("{} {}", "Mode:".bold(), rendered.mode);
    for (title, paths, shown) in sections {
        if !shown {
            continue;
        }
        println!("{} ({})", title.bold(), paths.len());
        for path in paths {
            println!("  {path}");
        }
    }

    if !rendered.required_modules.is_empty() {
        let names: Vec<&str> = rendered.required_modules.iter().map(|m| m.name()).collect();
        println!("{} {}", "Required modules:".bold(), names.join(", "));
    }

    if rendered.scripts.is_empty() && rendered.styles.is_empty() && rendered.manifests.is_empty() {
        println!("{}", "No paths resolved".yellow());
    }
    Ok(())
}
