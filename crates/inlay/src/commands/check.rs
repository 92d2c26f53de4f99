//! Check command - reports whether the configuration can embed anything.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use inlay_config::{AssetMode, RunnerKind};
use inlay_sandbox::InterpreterStatus;
use serde::Serialize;

use super::Context;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {}

#[derive(Debug, Serialize)]
struct CheckOutput {
    root: Option<String>,
    root_ok: bool,
    origin: Option<String>,
    origin_ok: bool,
    runner: String,
    interpreter: Option<String>,
    interpreter_ok: bool,
    problems: Vec<String>,
}

/// Run the check command.
pub async fn run(_args: CheckArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.loaded.config;
    let execution = config.execution();
    let mut problems = Vec::new();

    let root = config.target().effective_root();
    let root_ok = root.as_ref().is_some_and(|r| r.is_dir());
    match &root {
        None => problems.push("target root not configured".to_string()),
        Some(r) if !root_ok => problems.push(format!("target root {} is not a directory", r.display())),
        Some(_) => {}
    }

    let origin = config.target().origin();
    // The origin only matters when assets are rewritten
    let origin_required = config.output().assets == AssetMode::Register;
    if let Err(e) = &origin
        && origin_required
    {
        problems.push(e.to_string());
    }

    let (runner, interpreter) = match execution.runner {
        RunnerKind::Process => ("process", Some(InterpreterStatus::detect(&execution.interpreter))),
        RunnerKind::Static => ("static", None),
    };
    let interpreter_ok = interpreter.as_ref().is_none_or(InterpreterStatus::is_available);
    if let Some(status) = interpreter.as_ref().filter(|s| !s.is_available()) {
        problems.push(status.to_string());
    }

    if ctx.json_output {
        let output = CheckOutput {
            root: root.as_ref().map(|r| r.display().to_string()),
            root_ok,
            origin: origin.as_ref().ok().cloned(),
            origin_ok: origin.is_ok(),
            runner: runner.to_string(),
            interpreter: interpreter.as_ref().map(|s| s.to_string()),
            interpreter_ok,
            problems: problems.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let green = Style::new().green();
        let red = Style::new().red();
        let dim = Style::new().dim();
        let mark = |ok: bool| {
            if ok {
                green.apply_to("✓").to_string()
            } else {
                red.apply_to("✗").to_string()
            }
        };

        println!();
        println!("{}", style("inlay Check").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!();
        println!(
            "  {} {} {}",
            mark(root_ok),
            dim.apply_to("Root:"),
            root.as_ref()
                .map(|r| r.display().to_string())
                .unwrap_or_else(|| "(not configured)".to_string())
        );
        println!(
            "  {} {} {}",
            mark(origin.is_ok() || !origin_required),
            dim.apply_to("Origin:"),
            origin.as_ref().map(String::as_str).unwrap_or("(invalid or not configured)")
        );
        println!("  {} {} {}", mark(interpreter_ok), dim.apply_to("Runner:"), runner);
        if let Some(status) = &interpreter {
            println!("    {}", status);
        }

        let sources = ctx.loaded.loaded_paths();
        if !sources.is_empty() {
            println!();
            println!("  {}", dim.apply_to("Config files:"));
            for source in sources {
                println!("    {}", source.display());
            }
        }
        println!();
    }

    if !problems.is_empty() {
        bail!("{}", problems.join("; "));
    }
    Ok(())
}
