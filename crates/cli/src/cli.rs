use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Run Athena queries and export the transformed results to S3.
#[derive(Parser, Debug)]
#[command(name = "unload", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configured query and write one artifact per query.
    Run(RunArgs),
    /// Fetch an artifact from the destination bucket and print it.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline YAML config.
    #[arg(long, short, env = "UNLOAD_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Validate the config and resolve all queries without contacting AWS.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero if any query item failed.
    #[arg(long)]
    pub strict: bool,

    /// Override the number of query items processed at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Cancel the run after this many seconds.
    #[arg(long)]
    pub deadline: Option<u64>,

    /// S3-compatible endpoint instead of AWS S3.
    #[arg(long, env = "UNLOAD_S3_ENDPOINT")]
    pub endpoint_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Pipeline YAML config (role, bucket and region are taken from it).
    #[arg(long, short, env = "UNLOAD_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Object key inside the destination bucket.
    #[arg(long)]
    pub key: String,

    /// csv, parquet or json. Guessed from the key's extension if omitted.
    #[arg(long)]
    pub format: Option<String>,

    /// Maximum rows to print.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// S3-compatible endpoint instead of AWS S3.
    #[arg(long, env = "UNLOAD_S3_ENDPOINT")]
    pub endpoint_url: Option<String>,
}
