//! depfunnel - incremental dependency funnel for build pipelines.
//!
//! Partitions an input tree into the set of files reachable from an
//! entry module and its complement, materializing one of the two into an
//! output directory and reusing cached state across builds.

#![allow(dead_code)]

mod cli;
mod config;
mod error;
mod funnel;
mod logger;
mod materialize;
mod resolver;
mod snapshot;
mod stats;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = cli::load_config(&cli)?;
    if let Some(name) = &config.name {
        crate::debug!("funnel"; "instance `{name}`");
    }

    match &cli.command {
        Commands::Build(args) => cli::run_build(&config, args),
        Commands::Watch(args) => cli::run_watch(&config, args),
    }
}
