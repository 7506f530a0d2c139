//! `reldir` command line.
//!
//! # Usage
//!
//! ```bash
//! # Pull manifest and data from a remote directory, deleting local leftovers
//! reldir --db /var/lib/reldir.db sync --remote http://directory:9292 --mode manifest,diff
//!
//! # Resume from the last watermark, configured through the environment
//! RELDIR__SYNC__MODE=watermark RELDIR_API_KEY=... reldir sync
//!
//! # Upgrade the on-disk layout, or only report whether one is needed
//! reldir migrate
//! reldir migrate --check
//!
//! # Object and relation counts as JSON
//! reldir stats
//! ```

mod config;

use std::{
    io::IsTerminal,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use reldir_directory::{Directory, DirectoryError, ManifestCompiler};
use reldir_store::{Store, StoreError, migrate};
use reldir_sync::{GrpcRemote, Mode, SyncError, SyncReport, Syncer};
use reldir_types::config::{LogFormat, LoggingConfig};
use snafu::{ResultExt, Snafu};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "reldir", version, about = "Relation directory store and sync tool")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, short, env = "RELDIR_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Store file, overriding `directory.store.db_path`.
    #[arg(long, env = "RELDIR_DB", global = true)]
    db: Option<PathBuf>,

    /// Log filter directive used when `RUST_LOG` is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON regardless of the configured format.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Serve Prometheus metrics on this address while the command runs.
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull the manifest and data of a remote directory into the local store.
    Sync {
        /// Comma-separated modes: manifest, full, diff, watermark.
        #[arg(long)]
        mode: Option<String>,
        /// Remote exporter address.
        #[arg(long)]
        remote: Option<String>,
        /// API key sent with every request.
        #[arg(long, env = "RELDIR_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Tenant id sent with every request.
        #[arg(long, env = "RELDIR_TENANT_ID")]
        tenant_id: Option<String>,
    },
    /// Bring the store layout to the version this build requires.
    Migrate {
        /// Only report the stored and required versions.
        #[arg(long)]
        check: bool,
    },
    /// Print object and relation counts as JSON.
    Stats,
    /// Print the JSON schema of the configuration file.
    Schema,
}

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("Failed to load configuration"))]
    LoadConfig { source: ::config::ConfigError },

    #[snafu(display("Invalid configuration"))]
    InvalidConfig { source: reldir_types::config::ConfigError },

    #[snafu(display("Invalid log filter {directive:?}"))]
    LogFilter { directive: String, source: tracing_subscriber::filter::ParseError },

    #[snafu(display("Failed to install Prometheus exporter on {addr}"))]
    MetricsExporter {
        addr: SocketAddr,
        source: metrics_exporter_prometheus::BuildError,
    },

    #[snafu(display("Store error"))]
    Store { source: StoreError },

    #[snafu(display("Directory error"))]
    Directory { source: DirectoryError },

    #[snafu(display("Sync failed"))]
    Sync { source: SyncError },

    #[snafu(display("Failed to encode output"))]
    Output { source: serde_json::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::Schema) {
        println!("{}", config::schema());
        return Ok(());
    }

    let mut config = CliConfig::load(cli.config.as_deref()).context(LoadConfigSnafu)?;
    apply_overrides(&mut config, &cli);
    config.validate().context(InvalidConfigSnafu)?;

    init_logging(&config.logging)?;
    if let Some(addr) = config.metrics_addr {
        init_metrics_exporter(addr)?;
    }

    match cli.command {
        Command::Sync { mode, .. } => run_sync(config, mode).await,
        Command::Migrate { check } => run_migrate(&config, check),
        Command::Stats => run_stats(config),
        Command::Schema => Ok(()),
    }
}

/// Applies command line flags on top of the loaded configuration.
fn apply_overrides(config: &mut CliConfig, cli: &Cli) {
    if let Some(db) = &cli.db {
        config.directory.store.db_path.clone_from(db);
    }
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if cli.metrics_addr.is_some() {
        config.metrics_addr = cli.metrics_addr;
    }
    if let Command::Sync { remote, api_key, tenant_id, .. } = &cli.command {
        if let Some(remote) = remote {
            config.sync.remote_address.clone_from(remote);
        }
        if api_key.is_some() {
            config.sync.api_key.clone_from(api_key);
        }
        if tenant_id.is_some() {
            config.sync.tenant_id.clone_from(tenant_id);
        }
    }
}

/// Initializes logging to stderr so command output on stdout stays clean.
///
/// `RUST_LOG` wins over the configured level. `Auto` picks JSON when stderr
/// is not a terminal.
fn init_logging(config: &LoggingConfig) -> Result<(), CliError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .context(LogFilterSnafu { directive: config.level.clone() })?,
    };

    let use_json = match config.format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stderr().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn init_metrics_exporter(addr: SocketAddr) -> Result<(), CliError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context(MetricsExporterSnafu { addr })?;
    info!(%addr, "Serving Prometheus metrics");
    Ok(())
}

fn open_directory(config: CliConfig) -> Result<Directory, CliError> {
    Directory::open(config.directory, Arc::new(ManifestCompiler)).context(DirectorySnafu)
}

async fn run_sync(config: CliConfig, mode: Option<String>) -> Result<(), CliError> {
    let mode: Mode =
        mode.as_deref().unwrap_or(&config.sync.mode).parse().context(SyncSnafu)?;
    let sync_config = config.sync.clone();
    let directory = Arc::new(open_directory(config)?);

    let remote = GrpcRemote::connect(&sync_config).await.context(SyncSnafu)?;
    let syncer = Syncer::new(directory, remote, sync_config).context(SyncSnafu)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling sync");
            on_signal.cancel();
        }
    });

    let started = Instant::now();
    let report = syncer.run(mode, &cancel).await.context(SyncSnafu)?;
    print_report(&report, mode, started.elapsed().as_secs_f64());
    Ok(())
}

fn print_report(report: &SyncReport, mode: Mode, elapsed_secs: f64) {
    println!("mode:      {mode}");
    println!("manifest:  {}", if report.manifest_changed { "updated" } else { "unchanged" });
    for (kind, c) in [("objects:", &report.objects), ("relations:", &report.relations)] {
        println!(
            "{kind:<10} received={} written={} unchanged={} errors={} deleted={}",
            c.received, c.written, c.unchanged, c.errors, c.deleted
        );
    }
    for failure in &report.failures {
        println!(
            "  {} {} {}: {} ({})",
            failure.stage, failure.kind, failure.key, failure.message, failure.code
        );
    }
    if let Some(mark) = &report.watermark {
        println!("watermark: {}", mark.last_updated);
    }
    println!("elapsed:   {elapsed_secs:.3}s");
}

fn run_migrate(config: &CliConfig, check: bool) -> Result<(), CliError> {
    let store = Store::open(&config.directory.store).context(StoreSnafu)?;
    let current = migrate::current_version(&store).context(StoreSnafu)?;
    let current_text = current.map_or_else(|| "none".to_string(), |v| v.to_string());

    if check {
        println!("stored:   {current_text}");
        println!("required: {}", migrate::REQUIRED_VERSION);
        return migrate::check_version(&store).context(StoreSnafu);
    }

    let report = migrate::migrate(&store).context(StoreSnafu)?;
    if report.is_noop() {
        println!("store already at {}", report.to);
        return Ok(());
    }
    println!("migrated {current_text} -> {}", report.to);
    for backup in &report.backups {
        println!("backup:   {}", backup.display());
    }
    Ok(())
}

fn run_stats(config: CliConfig) -> Result<(), CliError> {
    let directory = open_directory(config)?;
    let stats = directory.stats().context(DirectorySnafu)?;
    println!("{}", serde_json::to_string_pretty(&stats).context(OutputSnafu)?);
    Ok(())
}
