//! Resolve command - runs path resolution and containment only.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{Context, RequestArgs};

/// Arguments for the resolve command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    path: String,
    root: String,
    relative: String,
}

/// Run the resolve command.
pub async fn run(args: ResolveArgs, ctx: &Context) -> Result<()> {
    let embedder = ctx.embedder()?;
    let target = embedder.resolve(&args.request.to_request())?;

    if ctx.json_output {
        let output = ResolveOutput {
            path: target.path().display().to_string(),
            root: target.root().display().to_string(),
            relative: target.relative().display().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", target.path().display());
        if ctx.verbose {
            println!("  root: {}", target.root().display());
            println!("  dir:  {}", target.dir().display());
        }
    }

    Ok(())
}
