mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    unload_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    match args.command {
        Command::Run(args) => commands::run(args).await,
        Command::Inspect(args) => commands::inspect(args).await,
    }
}
