//! inlay - embed a sibling web application's rendered output safely
//!
//! Main entry point for the inlay CLI.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{check, config, render, resolve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// inlay - embed a sibling web application's rendered output safely
#[derive(Parser)]
#[command(name = "inlay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Project config file (default: ./inlay.toml)
    #[arg(short, long, global = true, env = "INLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Target root directory, overriding configuration
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Target origin, overriding configuration
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a target file as an embeddable fragment
    Render(render::RenderArgs),

    /// Resolve a request to a target file without running it
    Resolve(resolve::ResolveArgs),

    /// Check the target root, origin and interpreter
    Check(check::CheckArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loaded = inlay_config::load_config(cli.config.as_deref())?;
    let log_dir = loaded.config.logging().dir;
    let _guard = init_logging(cli.verbose, log_dir.as_deref());

    // Config is loaded before the subscriber exists
    for warning in &loaded.warnings {
        tracing::warn!(warning = %warning, "config layer skipped");
    }

    // CLI flags override every config layer
    if cli.root.is_some() || cli.base_url.is_some() {
        let mut target = loaded.config.target();
        if let Some(root) = cli.root {
            target.root = Some(root);
        }
        if let Some(base_url) = cli.base_url {
            target.base_url = Some(base_url);
        }
        loaded.config.target = Some(target);
    }

    let ctx = commands::Context {
        loaded,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Render(args) => render::run(args, &ctx).await,
        Commands::Resolve(args) => resolve::run(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console logging on stderr, plus daily-rotated JSON files when a log
/// directory is configured.
fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        "inlay=debug,inlay_embed=debug,inlay_sandbox=debug,inlay_config=debug,info"
    } else {
        "inlay=info,inlay_embed=info,inlay_sandbox=info,inlay_config=info,warn"
    };
    let console = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "inlay.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(console)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_filter(EnvFilter::new(
                            "inlay=trace,inlay_embed=trace,inlay_sandbox=trace,inlay_config=trace,info",
                        )),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    }
}
