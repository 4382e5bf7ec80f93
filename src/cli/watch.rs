//! `clientdeps watch`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;

use super::resolve::{print_rendered, render_blocking};
use super::{OutputFormat, TypeFilter};
use crate::aggregate::ClientDependencies;
use crate::config::ClientDepsConfig;
use crate::core::Mode;
use crate::resolver::Resolver;
use crate::specifier::DependencySpecifier;
use crate::watch::NotifyWatchService;

/// Resolve, then re-resolve whenever a watched manifest changes.
#[derive(Args, Debug)]
pub struct WatchCommand {
    /// Dependency identifiers
    #[arg(required = true)]
    pub specs: Vec<String>,

    /// Mode to request: dev, production or both (deployment default)
    #[arg(long, default_value = "both")]
    pub mode: Mode,

    /// Restrict output to one asset type
    #[arg(long = "type", value_enum, default_value_t = TypeFilter::All)]
    pub asset_type: TypeFilter,

    /// How often to check for invalidations, in milliseconds
    #[arg(long, default_value_t = 250)]
    pub poll_ms: u64,
}

impl WatchCommand {
    /// Run until Ctrl-C.
    pub async fn execute(self, config: &ClientDepsConfig) -> Result<()> {
        let (builder, _registry) = config.resolver_builder();
        let resolver = builder.watcher(Arc::new(NotifyWatchService::new()?)).build();

        let mut dependencies = resolver.client_dependencies();
        for spec in &self.specs {
            dependencies.add_dependency(DependencySpecifier::new(spec, self.mode));
        }

        let rendered = render_blocking(dependencies.clone(), self.mode).await?;
        print_rendered(&rendered, self.asset_type, OutputFormat::Text)?;
        println!(
            "{} {} manifest(s), press Ctrl-C to stop",
            "Watching".cyan(),
            resolver.watched_files()
        );

        self.run_until(&resolver, &dependencies, tokio::signal::ctrl_c()).await?;

        tracing::debug!(target: "clientdeps::cli", "Watch stopped: {:?}", resolver.stats());
        Ok(())
    }

    /// Re-render after every invalidation until `shutdown` completes.
    ///
    /// `shutdown` is polled across iterations, so a signal that arrives
    /// while a render is in progress is seen on the next pass.
    async fn run_until<F: Future>(
        &self,
        resolver: &Resolver,
        dependencies: &ClientDependencies,
        shutdown: F,
    ) -> Result<()> {
        tokio::pin!(shutdown);
        let poll = Duration::from_millis(self.poll_ms.max(10));
        let mut generation = resolver.generation();
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(poll) => {
                    let current = resolver.generation();
                    if current != generation {
                        generation = current;
                        println!("\n{}", "Change detected, re-resolving".cyan());
                        let rendered = render_blocking(dependencies.clone(), self.mode).await?;
                        print_rendered(&rendered, self.asset_type, OutputFormat::Text)?;
                    }
                }
            }
        }
        Ok(())
    }
}
