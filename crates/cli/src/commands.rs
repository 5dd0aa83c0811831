use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use unload_athena::{AthenaConfig, CredentialBroker, StsCredentialBroker};
use unload_core::{cancel_pair, CancelHandle, FileFormat, PipelineConfig, Table};
use unload_pipeline::{execute, DirectoryQuerySource, PipelineOrchestrator};
use unload_storage::{FormatCodec, ObjectStoreGateway, RetryPolicy};

use crate::cli::{InspectArgs, RunArgs};

fn load_config(path: &std::path::Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

pub async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = load_config(&args.config)?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.validate().context("invalid pipeline config")?;
    config.log_summary();

    let source = Arc::new(DirectoryQuerySource::new(&config.query_dir));

    if args.dry_run {
        let orchestrator = PipelineOrchestrator::new(config, source)?;
        let plan = orchestrator.dry_run().await.context("dry run failed")?;
        for item in plan {
            println!("[{}] {} -> {}", item.index, item.query_id, item.key);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let athena = AthenaConfig::from_env().with_overrides(
        config.region.as_deref(),
        config.workgroup.as_deref(),
        config.max_wait_seconds,
    );
    let broker = StsCredentialBroker::new(&athena.region).await;

    let (handle, signal) = cancel_pair();
    spawn_ctrl_c(handle.clone());
    if let Some(secs) = args.deadline {
        spawn_deadline(handle, Duration::from_secs(secs));
    }

    let summary = execute(
        config,
        source,
        &broker,
        athena,
        args.endpoint_url.as_deref(),
        &signal,
    )
    .await
    .context("pipeline run failed")?;

    print!("{summary}");

    if let Some(reason) = summary.aborted() {
        bail!("run aborted: {reason}");
    }
    if args.strict && summary.failed() > 0 {
        warn!(failed = summary.failed(), "strict mode: failing the run");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn inspect(args: InspectArgs) -> Result<ExitCode> {
    let config = load_config(&args.config)?;

    let format = match args.format.as_deref() {
        Some(tag) => tag.parse::<FileFormat>()?,
        None => FileFormat::from_key(&args.key).with_context(|| {
            format!("cannot tell the format of {}; pass --format", args.key)
        })?,
    };

    let athena = AthenaConfig::from_env().with_overrides(config.region.as_deref(), None, None);
    let broker = StsCredentialBroker::new(&athena.region).await;
    let session = broker
        .assume_role(&config.aws_role)
        .await
        .context("failed to assume role")?;

    let gateway = ObjectStoreGateway::for_session(
        &session,
        &config.destination_bucket,
        args.endpoint_url.as_deref(),
        RetryPolicy::default(),
    )?;
    let bytes = gateway
        .get(&args.key)
        .await
        .with_context(|| format!("failed to read {}", gateway.uri(&args.key)))?;
    let table = FormatCodec::decode(&bytes, format)
        .with_context(|| format!("failed to decode {} as {format}", args.key))?;

    info!(key = %args.key, rows = table.row_count(), "artifact decoded");
    println!("{}", head(&table, args.limit)?);
    if table.row_count() > args.limit {
        println!("(showing {} of {} rows)", args.limit, table.row_count());
    }
    Ok(ExitCode::SUCCESS)
}

/// First `limit` rows of `table`.
fn head(table: &Table, limit: usize) -> Result<Table> {
    if table.row_count() <= limit {
        return Ok(table.clone());
    }
    Ok(Table::from_parts(
        table.columns().to_vec(),
        table.rows()[..limit].to_vec(),
    )?)
}

fn spawn_ctrl_c(handle: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            handle.cancel();
        }
    });
}

fn spawn_deadline(handle: CancelHandle, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        warn!(seconds = after.as_secs(), "deadline reached, cancelling run");
        handle.cancel();
    });
}
