//! Command-line interface for clientdeps.
//!
//! # Commands
//!
//! - `resolve` - resolve dependencies and print the paths a page would emit
//! - `check` - resolve every library manifest under the web roots in both
//!   modes and report the ones that fail
//! - `watch` - like `resolve`, then re-resolve whenever a manifest changes
//!
//! # Global Options
//!
//! - `--verbose` - debug logging
//! - `--quiet` - errors only
//! - `--config <path>` - configuration file (also `CLIENTDEPS_CONFIG`)
//! - `--dev` - force a development deployment
//!
//! `RUST_LOG` takes precedence over `--verbose` and `--quiet` when set.
//!
//! # Examples
//!
//! ```bash
//! clientdeps resolve Ext4 query/QueryGrid.lib.xml --mode production
//! clientdeps --config deploy/clientdeps.toml check --format json
//! clientdeps --dev watch reports.lib.xml
//! ```

mod check;
mod resolve;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::ClientDepsConfig;
use crate::constants::CONFIG_PATH_ENV;

pub use check::CheckCommand;
pub use resolve::{OutputFormat, ResolveCommand, TypeFilter};
pub use watch::WatchCommand;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(
    name = "clientdeps",
    about = "Resolve client asset dependencies into ordered script and style lists",
    version,
    author
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to clientdeps.toml
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Treat the deployment as development regardless of configuration
    #[arg(long, global = true)]
    dev: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve dependencies and print the emitted paths
    Resolve(ResolveCommand),
    /// Verify every library manifest under the web roots
    Check(CheckCommand),
    /// Resolve, then re-resolve on every manifest change until Ctrl-C
    Watch(WatchCommand),
}

impl Cli {
    /// Install logging, load configuration and run the subcommand.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);

        let mut config = ClientDepsConfig::load(self.config.as_deref())?;
        if self.dev {
            config.dev_mode = true;
        }

        match self.command {
            Commands::Resolve(cmd) => cmd.execute(&config).await,
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Watch(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Directive used when `RUST_LOG` is not set.
fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "clientdeps=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_directive(verbose, quiet))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
