//! Command handlers
//!
//! Each handler returns the process exit code; errors are reported on stderr.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::commands::{GenerateArgs, GenerateFormat, WorkspacesArgs};
use super::output::{OutputFormatter, WorkspaceReport};
use crate::config::{InstallConfig, OPT_NO_CACHE};
use crate::gateway::{BuildOpts, Client, LocalClient};
use crate::llb::CapSet;
use crate::yarn::{context_source, discover_patterns, new_state};

pub async fn handle_generate(args: &GenerateArgs) -> i32 {
    report(run_generate(args).await)
}

pub async fn handle_workspaces(args: &WorkspacesArgs) -> i32 {
    report(run_workspaces(args).await)
}

fn report(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

async fn run_generate(args: &GenerateArgs) -> Result<()> {
    let context = resolve_context(args.context.as_deref())?;

    let mut opts = BuildOpts::new(CapSet::all());
    for (key, value) in &args.opts {
        opts = opts.with_opt(key, value);
    }
    if args.no_cache {
        opts = opts.with_opt(OPT_NO_CACHE, "");
    }

    let client = LocalClient::new(&context, opts);
    let config = InstallConfig::from_build_opts(client.build_opts())?;
    debug!(?config, context = %context.display(), "Generating install definition");

    let cancel = cancel_on_ctrl_c();
    let state = new_state(&client, &config, &cancel)
        .await
        .context("Failed to compose install graph")?;
    let definition = state
        .marshal(&client.build_opts().llb_caps)
        .context("Failed to marshal install graph")?;

    info!(ops = definition.len(), "Generated install definition");

    let bytes = match args.format {
        GenerateFormat::Llb => definition.to_bytes(),
        GenerateFormat::Summary => definition.summary().into_bytes(),
    };
    write_output(args.output.as_deref(), &bytes)
}

async fn run_workspaces(args: &WorkspacesArgs) -> Result<()> {
    let context = resolve_context(args.context.as_deref())?;

    let client = LocalClient::new(&context, BuildOpts::new(CapSet::all()));
    let config = InstallConfig::default();
    let cancel = cancel_on_ctrl_c();

    let patterns = discover_patterns(&client, &context_source(config.lockfile), &cancel)
        .await
        .context("Failed to discover workspaces")?;

    let output = OutputFormatter::new(args.format).format(&WorkspaceReport { context, patterns })?;
    print!("{}", output);
    Ok(())
}

fn resolve_context(path: Option<&Path>) -> Result<PathBuf> {
    let path = path.unwrap_or_else(|| Path::new("."));
    let context = path
        .canonicalize()
        .with_context(|| format!("Build context not found: {}", path.display()))?;
    if !context.is_dir() {
        anyhow::bail!("Build context is not a directory: {}", context.display());
    }
    Ok(context)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });
    cancel
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("Failed to write to stdout")?;
            stdout.flush().context("Failed to write to stdout")
        }
    }
}
