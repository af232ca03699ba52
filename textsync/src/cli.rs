/// # textsync CLI Interface (Module)
///
/// Command parsing and orchestration for the `textsync` binary. Reconciliation
/// itself lives in `textsync-core`; this module loads the configuration, builds
/// the HTTP client, runs a pass, persists the ledger and prints the result.
///
/// ## How To Use
/// - From the shell: `textsync --help`.
/// - Programmatically: call [`run`] with a constructed [`Cli`], or call the
///   per-command functions ([`up`], [`patch`], [`down`], [`verify`]) with any
///   [`RemoteClient`].
use crate::client::HttpClient;
use crate::load_config::{load_config, DEFAULT_CONFIG_PATH};
use crate::serve::{serve, AppState};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use textsync_core::config::DataConfig;
use textsync_core::contract::RemoteClient;
use textsync_core::reconcile::{Drift, Reconciler};
use textsync_core::render::DEFAULT_TEMPLATE;
use textsync_core::status::{DataStatus, SaveOutcome, StatusLedger};
use textsync_core::SyncError;

/// CLI for textsync: keep a declared set of text documents in sync with a remote store.
#[derive(Parser)]
#[clap(
    name = "textsync",
    version,
    about = "Create, update and remove a collection of text documents on a remote document store"
)]
pub struct Cli {
    /// Path to the YAML desired-state file
    #[clap(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Restrict the command to these documents (may be repeated)
    #[clap(long = "name", global = true)]
    pub names: Vec<String>,

    /// Format of printed output
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the recorded status
    Status,
    /// Create or adopt every document and the collection
    Up,
    /// Bring everything up, then push current content and metadata
    Patch,
    /// Delete everything the status records
    Down,
    /// Compare the recorded status with the remote store
    Verify,
    /// Print the resolved configuration
    Config {
        /// Print the client connection settings instead
        #[clap(long)]
        client: bool,
    },
    /// Serve the recorded documents over HTTP
    Run {
        #[clap(long, default_value = "127.0.0.1")]
        host: IpAddr,
        #[clap(long, default_value_t = 8000)]
        port: u16,
    },
    /// Print a fresh identifier for a new configuration
    Identifier,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let names = (!cli.names.is_empty()).then_some(cli.names.as_slice());
    let output = cli.output;

    match cli.command {
        Commands::Identifier => {
            println!("{}", new_identifier());
            Ok(())
        }
        Commands::Config { client: true } => {
            let client = connect()?;
            print(&client.settings(), output)
        }
        Commands::Config { client: false } => {
            let config = load_config(&cli.config)?;
            print(&config, output)
        }
        Commands::Status => {
            let config = load_config(&cli.config)?;
            let current = status(&config)?;
            print(&current, output)
        }
        Commands::Up => {
            let config = load_config(&cli.config)?;
            let client = connect()?;
            tracing::info!(command = "up", "Starting ensure pass");
            let status = up(&client, &config, names).await.map_err(|e| {
                tracing::error!(command = "up", error = %e, "Ensure failed");
                e
            })?;
            print(&status, output)
        }
        Commands::Patch => {
            let config = load_config(&cli.config)?;
            let client = connect()?;
            tracing::info!(command = "patch", "Starting ensure and update passes");
            let status = patch(&client, &config, names).await.map_err(|e| {
                tracing::error!(command = "patch", error = %e, "Patch failed");
                e
            })?;
            print(&status, output)
        }
        Commands::Down => {
            let config = load_config(&cli.config)?;
            let client = connect()?;
            tracing::info!(command = "down", "Starting destroy pass");
            let status = down(&client, &config, names).await.map_err(|e| {
                tracing::error!(command = "down", error = %e, "Destroy failed");
                e
            })?;
            print(&status, output)
        }
        Commands::Verify => {
            let config = load_config(&cli.config)?;
            let client = connect()?;
            let drift = verify(&client, &config).await?;
            print(&drift, output)?;
            if drift.is_empty() {
                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "{} difference(s) between status and remote",
                    drift.len()
                ))
            }
        }
        Commands::Run { host, port } => {
            let config = load_config(&cli.config)?;
            let ledger = require_ledger(&config)?;
            let template = match config.template_path() {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read template {path:?}"))?,
                None => DEFAULT_TEMPLATE.to_string(),
            };
            let client = connect()?;
            let state = AppState {
                host: client.host().to_string(),
                client: Arc::new(client),
                status: Arc::new(ledger.status),
                template: Arc::new(template),
            };
            serve(SocketAddr::new(host, port), state).await
        }
    }
}

/// Run `ensure` and record the result.
pub async fn up<C>(
    client: &C,
    config: &DataConfig,
    names: Option<&[String]>,
) -> Result<DataStatus, SyncError>
where
    C: RemoteClient + ?Sized,
{
    let status = Reconciler::new(client, config).ensure(names).await?;
    persist(config, &status)?;
    Ok(status)
}

/// Run `ensure` over the whole set, then `update` the named documents (all
/// when `names` is `None`). Only the final status is recorded.
pub async fn patch<C>(
    client: &C,
    config: &DataConfig,
    names: Option<&[String]>,
) -> Result<DataStatus, SyncError>
where
    C: RemoteClient + ?Sized,
{
    let reconciler = Reconciler::new(client, config);
    let ensured = reconciler.ensure(None).await?;
    let updated = reconciler.update(&ensured, names).await?;
    persist(config, &updated)?;
    Ok(updated)
}

/// Run `destroy` against the recorded status and record the deletions.
pub async fn down<C>(
    client: &C,
    config: &DataConfig,
    names: Option<&[String]>,
) -> Result<DataStatus, SyncError>
where
    C: RemoteClient + ?Sized,
{
    let ledger = require_ledger(config)?;
    let destroyed = Reconciler::new(client, config)
        .destroy(&ledger.status, names)
        .await?;
    persist(config, &destroyed)?;
    Ok(destroyed)
}

pub async fn verify<C>(client: &C, config: &DataConfig) -> Result<Vec<Drift>, SyncError>
where
    C: RemoteClient + ?Sized,
{
    let ledger = require_ledger(config)?;
    Reconciler::new(client, config).verify(&ledger.status).await
}

pub fn status(config: &DataConfig) -> Result<DataStatus, SyncError> {
    require_ledger(config).map(|ledger| ledger.status)
}

pub fn new_identifier() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn require_ledger(config: &DataConfig) -> Result<StatusLedger, SyncError> {
    StatusLedger::load_optional(&config.status_path())?.ok_or(SyncError::StatusUnavailable)
}

fn persist(config: &DataConfig, status: &DataStatus) -> Result<SaveOutcome, SyncError> {
    let path = config.status_path();
    let outcome = StatusLedger::new(status.clone()).save(&path)?;
    tracing::info!(path = %path.display(), ?outcome, "Status ledger saved");
    Ok(outcome)
}

fn connect() -> Result<HttpClient> {
    HttpClient::new_from_env()
        .map_err(|e| anyhow::anyhow!("Failed to construct client from environment: {e}"))
}

fn print<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    let text = match output {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}
