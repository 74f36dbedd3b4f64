// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Pulse: log and speedtest ingestion with live fan-out
//
//  HTTP + WebSocket:  axum on a multi-threaded tokio runtime
//  Storage:           in-memory tables, optional JSONL journal
//  Config:            YAML file + PULSE_* environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use pulse_api::{AppState, JwtAuthenticator};
use pulse_core::PulseConfig;
use pulse_engine::BroadcastRegistry;
use pulse_observability::MetricsCollector;
use pulse_store::{MemoryStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "pulse", version, about = "Pulse log and speedtest ingestion service")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/pulse/pulse.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Override `storage.data_dir` from the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Pulse starting");

    // ── Config ──
    // A missing file is fine: defaults plus `PULSE_` env overrides apply.
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults and environment");
    }
    let mut config = PulseConfig::load(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }
    if config.auth.uses_dev_secret() {
        warn!("auth.jwt_secret not set, using the development secret");
    }

    // ── Store ──
    let store = match &config.storage.data_dir {
        Some(dir) => {
            let store = MemoryStore::open(dir)?;
            let stats = store.stats().await;
            info!(
                data_dir = %dir.display(),
                logs = stats.logs,
                speedtests = stats.speedtests,
                "Journal replayed"
            );
            store
        }
        None => {
            warn!("storage.data_dir not set, records will not survive a restart");
            MemoryStore::new()
        }
    };
    let store: Arc<dyn Store> = Arc::new(store);

    // ── Shared state ──
    let registry = Arc::new(BroadcastRegistry::from_config(&config.broadcast));
    let metrics = Arc::new(MetricsCollector::new(
        config.observability.prometheus.enabled,
    )?);
    let state = Arc::new(
        AppState::new(
            store,
            registry.clone(),
            Arc::new(JwtAuthenticator::new(&config.auth.jwt_secret)),
            metrics,
            config.query.clone(),
        )
        .with_metrics_path(config.observability.prometheus.path.clone()),
    );

    // ── Serve until SIGTERM/SIGINT ──
    pulse_api::serve(&config.server.addr, state, shutdown_signal()).await?;

    info!("Shutdown signal received, closing live observers");
    registry.shutdown().await;
    info!("Pulse stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
