//! docforge - build documentation bundles from manifests spanning many
//! repositories.

mod cli;
mod config;
mod core;
mod jobs;
mod logger;
mod manifest;
mod markdown;
mod node;
mod processors;
mod reactor;
mod resource;
mod utils;
mod watch;
mod writer;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;
use core::state::{is_shutdown, root_context, setup_shutdown_handler};

fn main() -> Result<()> {
    // Ctrl+C cancels the root context of every command
    setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }

    let config = Config::load(&cli, cli.build_args())?;
    let ctx = root_context();

    let result = match &cli.command {
        Commands::Build { .. } => cli::build::build(&ctx, &config),
        Commands::Resolve { .. } => cli::build::resolve(&ctx, &config),
        Commands::Watch { .. } => cli::watch::run(&ctx, &config),
    };

    if is_shutdown() {
        crate::log!("docforge"; "interrupted");
    }
    result
}
