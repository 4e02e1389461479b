mod cli;
mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::commands::BuildArgs;
use crate::config::{load_config, DEFAULT_CONFIG};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = if cli.verbose {
        true
    } else {
        logging::env_flag()
    };
    logging::init(verbose);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = load_config(&config_path)?;
    config.apply_env()?;

    match cli.command {
        Command::Normalize { sheets, out } => commands::normalize(&config, sheets, out),
        Command::ExportDocs { records, out } => commands::export_docs(&config, records, out),
        Command::BuildIndex {
            records,
            artifacts,
            batch_size,
            global_limit,
            force,
        } => commands::build(
            &config,
            BuildArgs {
                records,
                artifacts,
                batch_size,
                global_limit,
                force,
            },
        ),
        Command::Query {
            question,
            top_k,
            artifacts,
            json,
        } => commands::query(&config, &question, top_k, &artifacts, json),
    }
}
