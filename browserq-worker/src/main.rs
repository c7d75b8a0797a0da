//! browserq worker binary
//!
//! Loads configuration, opens the job store and either runs a worker loop or
//! performs one of the small store maintenance commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use browserq_config::Config;
use browserq_db_connection::StoreConnectionConfig;
use browserq_job_queue::{JobInput, JobRegistry, JobStore};
use browserq_jobs::JobDefinitions;
use browserq_worker::shutdown::install_shutdown_handler;
use browserq_worker::{HttpLauncher, ShutdownReason, WorkerConfig, WorkerLoop};
use clap::Parser;
use serde_json::json;

mod cli;
mod tracing_setup;

use cli::{Cli, Command, EnqueueArgs, RunArgs};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Resolve config path: CLI > environment variable
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("BROWSERQ_CONFIG_PATH").map(PathBuf::from));

    let mut config = load_config(config_path.as_deref())?;
    if let Some(db) = &cli.database {
        config.database.path = db.to_string_lossy().into_owned();
    }
    if let Command::Run(args) = &cli.command {
        apply_run_overrides(&mut config, args);
    }
    browserq_config::validate_config(&config)?;

    install_tracing_from_config(&config.logging);

    match cli.command {
        Command::Run(_) => run_worker(config).await,
        Command::Init => init_store(&config).await,
        Command::Enqueue(args) => enqueue_job(&config, args).await,
        Command::Show { id } => show_job(&config, id).await,
    }
}

/// Load configuration from file or defaults.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    browserq_config::load_config(path).map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })
}

fn apply_run_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(name) = &args.name {
        config.worker.name = Some(name.clone());
    }
    if let Some(jobs) = &args.jobs {
        config.jobs.definitions_path = Some(jobs.to_string_lossy().into_owned());
    }
}

fn store_config(config: &Config, create_if_missing: bool) -> StoreConnectionConfig {
    let mut store = StoreConnectionConfig::new(&config.database.path).create_if_missing(create_if_missing);
    store.max_connections = config.database.max_connections;
    store.busy_timeout_secs = config.database.busy_timeout_secs;
    store
}

/// `worker_` followed by eight random characters.
fn random_worker_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("worker_{}", &id[..8])
}

/// Built-in jobs, or only those listed in the definitions file.
fn build_registry(config: &Config) -> anyhow::Result<JobRegistry> {
    match &config.jobs.definitions_path {
        Some(path) => {
            let definitions: JobDefinitions = browserq_config::load_file(path)
                .with_context(|| format!("failed to read job definitions from {path}"))?;
            Ok(definitions.into_registry()?)
        }
        None => {
            let mut registry = JobRegistry::new();
            browserq_jobs::register_builtin_jobs(&mut registry);
            Ok(registry)
        }
    }
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    let name = config
        .worker
        .name
        .clone()
        .unwrap_or_else(random_worker_name);
    let registry = build_registry(&config)?;

    let store = JobStore::connect(&store_config(&config, false)).await?;
    store.migrate().await?;

    let shutdown = install_shutdown_handler().context("failed to install signal handlers")?;
    let worker = WorkerLoop::new(
        name,
        store.clone(),
        Arc::new(registry),
        Arc::new(HttpLauncher::new()),
        WorkerConfig::from(&config.worker),
    );

    let result = worker.run(shutdown).await;
    store.close().await;

    match result? {
        ShutdownReason::Signal => tracing::info!("worker exited after shutdown request"),
        ShutdownReason::EnvironmentFault(e) => {
            tracing::warn!(error = %e, "worker exited after environment fault")
        }
    }
    Ok(())
}

async fn init_store(config: &Config) -> anyhow::Result<()> {
    let store = JobStore::connect(&store_config(config, true)).await?;
    store.migrate().await?;
    store.close().await;
    tracing::info!(path = %config.database.path, "job store initialized");
    Ok(())
}

async fn enqueue_job(config: &Config, args: EnqueueArgs) -> anyhow::Result<()> {
    let input: JobInput = serde_json::from_str(&args.input)
        .context("job input must be a JSON object")?;

    let store = JobStore::connect(&store_config(config, false)).await?;
    let job = store.enqueue(&args.name, input).await?;
    store.close().await;

    println!("{}", job.id);
    Ok(())
}

async fn show_job(config: &Config, id: i64) -> anyhow::Result<()> {
    let store = JobStore::connect(&store_config(config, false)).await?;
    let job = store
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    let output = store.get_output(id).await?;
    store.close().await;

    let report = json!({
        "job": job,
        "output_bytes": output.and_then(|o| o.output).map(|bytes| bytes.len()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
