//! Render command - runs the embedding pipeline for one request.

use anyhow::Result;
use clap::Args;
use inlay_embed::{PageAssets, RequestContext};
use serde::Serialize;

use super::{Context, RequestArgs};

/// Arguments for the render command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Treat the hosting page as served over plain http
    #[arg(long)]
    pub insecure: bool,
}

/// Rendered page parts for JSON output.
#[derive(Debug, Serialize)]
struct RenderOutput {
    head: String,
    body: String,
    footer: String,
}

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let embedder = ctx.embedder()?;
    let context = if args.insecure {
        RequestContext::insecure()
    } else {
        RequestContext::secure()
    };

    let mut page = PageAssets::new();
    let body = embedder
        .embed(&args.request.to_request(), context, &mut page)
        .await;

    let output = RenderOutput {
        head: page.head_html(),
        body,
        footer: page.footer_html(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for part in [&output.head, &output.body, &output.footer] {
            if !part.is_empty() {
                println!("{part}");
            }
        }
    }

    Ok(())
}
