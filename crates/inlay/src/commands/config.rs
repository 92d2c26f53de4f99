//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration as TOML (default)
    Show,

    /// Show which config files are loaded and their precedence
    Which,
}

#[derive(Debug, Serialize)]
struct LayerOutput {
    path: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct WhichOutput {
    layers: Vec<LayerOutput>,
    env_overrides: Vec<&'static str>,
    warnings: Vec<String>,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;

    if ctx.json_output {
        let output = WhichOutput {
            layers: loaded
                .layers
                .iter()
                .map(|layer| LayerOutput {
                    path: layer.path.display().to_string(),
                    status: layer.status.as_str(),
                })
                .collect(),
            env_overrides: loaded.env_overrides.clone(),
            warnings: loaded.warnings.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Config files (lowest precedence first):");
    for layer in &loaded.layers {
        println!("  {} ({})", layer.path.display(), layer.status.as_str());
    }
    if !loaded.env_overrides.is_empty() {
        println!("Environment overrides:");
        for var in &loaded.env_overrides {
            println!("  {var}");
        }
    }
    for warning in &loaded.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}
