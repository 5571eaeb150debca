//! iagent - DevOps agent CLI

mod cli;
mod commands;
mod config;
mod output;

use clap::Parser;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = commands::run::execute(cli).await {
        println!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the answer
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "warn,iagent=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}
