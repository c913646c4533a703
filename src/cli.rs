//! Command-line interface: argument definitions and command entry points.

use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser, Subcommand};
use notify::{RecursiveMode, Watcher};

use crate::config::{FunnelConfig, RawConfig};
use crate::funnel::{BuildOutcome, DependencyFunnel};
use crate::log;
use crate::logger;

/// Incremental dependency funnel CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (e.g. funnel.toml)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Entry file, relative to the input root
    #[arg(short, long, global = true)]
    pub entry: Option<String>,

    /// Materialize the dependency set
    #[arg(long, global = true)]
    pub include: bool,

    /// Materialize everything but the dependency set
    #[arg(long, global = true)]
    pub exclude: bool,

    /// Module specifier to treat as external (repeatable)
    #[arg(short = 'x', long = "external", global = true, value_name = "SPECIFIER")]
    pub external: Vec<String>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a single funnel build
    #[command(visible_alias = "b")]
    Build(BuildArgs),

    /// Rebuild whenever the input tree changes
    #[command(visible_alias = "w")]
    Watch(BuildArgs),
}

/// Shared arguments for Build and Watch commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Input root directory
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub input: PathBuf,

    /// Output root directory
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: PathBuf,
}

/// Assemble the funnel configuration: config file first, CLI overrides
/// on top.
pub fn load_config(cli: &Cli) -> Result<FunnelConfig> {
    let mut raw = match &cli.config {
        Some(path) => RawConfig::load(path)
            .with_context(|| format!("failed to load `{}`", path.display()))?,
        None => RawConfig::default(),
    };

    if let Some(entry) = &cli.entry {
        raw.entry = Some(entry.clone());
    }
    if cli.include {
        raw.include = Some(true);
    }
    if cli.exclude {
        raw.exclude = Some(true);
    }
    raw.external.extend(cli.external.iter().cloned());

    Ok(FunnelConfig::from_raw(raw)?)
}

/// Run a single build and report the outcome.
pub fn run_build(config: &FunnelConfig, args: &BuildArgs) -> Result<()> {
    let mut funnel = DependencyFunnel::new(config.clone());
    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create `{}`", args.output.display()))?;

    let outcome = funnel.build(&args.input, &args.output)?;
    log!("funnel"; "{outcome} ({})", funnel.stats());
    Ok(())
}

/// Keep the funnel warm: rebuild on every input change, reusing the
/// in-process cached state so most rebuilds are hits or patches.
pub fn run_watch(config: &FunnelConfig, args: &BuildArgs) -> Result<()> {
    let mut funnel = DependencyFunnel::new(config.clone());
    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create `{}`", args.output.display()))?;

    let outcome = funnel.build(&args.input, &args.output)?;
    log!("funnel"; "{outcome}");

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        tx.send(event).ok();
    })?;
    watcher.watch(&args.input, RecursiveMode::Recursive)?;
    log!("watch"; "watching {}", args.input.display());

    while let Ok(event) = rx.recv() {
        if event.is_err() {
            continue;
        }
        // Editors fire bursts of events; let the burst settle so one
        // rebuild covers it.
        while rx.recv_timeout(Duration::from_millis(100)).is_ok() {}

        match funnel.build(&args.input, &args.output) {
            Ok(BuildOutcome::CacheHit) => {
                logger::status_unchanged(&format!("cache hit ({})", funnel.stats()));
            }
            Ok(outcome) => logger::status_success(&format!("{outcome} ({})", funnel.stats())),
            Err(e) => logger::status_error("build failed", &e.to_string()),
        }
    }

    Ok(())
}
