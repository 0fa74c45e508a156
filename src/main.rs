#![forbid(unsafe_code)]

//! `rosterbridge` — CRM attendance relay binary.
//!
//! Bootstraps configuration and credentials, then serves the HTTP API
//! that fronts the CRM for roster, attendance, and supervision flows.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use rosterbridge::config::GlobalConfig;
use rosterbridge::http::{build_router, AppState};
use rosterbridge::{AppError, Result};

/// How often expired sessions are swept out of the store.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rosterbridge", about = "CRM attendance relay", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("rosterbridge server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }

    // Load the bearer token and CRM secrets from keyring / env vars.
    config.load_credentials().await?;

    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Build shared application state ──────────────────
    let state = Arc::new(AppState::from_config(Arc::clone(&config))?);

    // ── Start background session sweep ──────────────────
    let ct = CancellationToken::new();
    let purge_handle = spawn_session_purge(Arc::clone(&state), ct.clone());

    // ── Serve HTTP ──────────────────────────────────────
    let bind = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind on {bind}: {err}")))?;
    info!(%bind, "server listening");

    let router = build_router(Arc::clone(&state));
    let shutdown_ct = ct.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown_ct.cancel();
        })
        .await
        .map_err(|err| AppError::Config(format!("server error: {err}")))?;

    let _ = purge_handle.await;
    info!("rosterbridge shut down");

    Ok(())
}

/// Periodically drop expired sessions so abandoned credentials do not
/// linger in memory.
fn spawn_session_purge(
    state: Arc<AppState>,
    ct: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = ct.cancelled() => break,
                () = tokio::time::sleep(SESSION_PURGE_INTERVAL) => {
                    let removed = state.sessions.purge_expired().await;
                    if removed > 0 {
                        debug!(removed, "purged expired sessions");
                    }
                }
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
