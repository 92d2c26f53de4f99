//! CLI command handlers.

pub mod check;
pub mod config;
pub mod render;
pub mod resolve;

use anyhow::Result;
use inlay_config::LoadedConfig;
use inlay_embed::{EmbedRequest, Embedder};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn embedder(&self) -> Result<Embedder> {
        Ok(Embedder::from_config(&self.loaded.config)?)
    }
}

/// Request arguments shared by `render` and `resolve`.
#[derive(clap::Args, Debug, Clone)]
pub struct RequestArgs {
    /// Path relative to the target root (default: configured entry)
    #[arg(short, long)]
    pub path: Option<String>,

    /// Absolute path override; still confined to the target root
    #[arg(long)]
    pub fullpath: Option<String>,
}

impl RequestArgs {
    pub fn to_request(&self) -> EmbedRequest {
        EmbedRequest::from_params(self.path.clone(), self.fullpath.clone())
    }
}
