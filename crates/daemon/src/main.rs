// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ksid`: process entry point. Resolves configuration, opens every
//! storage subsystem, assembles `DaemonCtx`, and runs the listener
//! until shutdown (spec.md §6.3).

use std::sync::Arc;

use ksi_compositions::store::StoreError;
use ksi_compositions::{CapabilityError, CapabilityRegistry, CompositionStore, DEFAULT_CAPABILITIES_YAML};
use ksi_core::now_seconds;
use ksi_daemon::context::Subsystems;
use ksi_daemon::{Config, DaemonCtx, Listener};
use ksi_storage::{CorrelationStore, EventLog, EventLogError, StateError, StateStore};
use tokio::net::UnixListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum DaemonError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    EventLog(#[from] EventLogError),
    #[error(transparent)]
    Composition(#[from] StoreError),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Writes the bundled default capability definitions to `path` if nothing
/// is there yet, then loads whatever's on disk (spec.md §6.3).
fn load_capabilities(path: &std::path::Path) -> Result<CapabilityRegistry, CapabilityError> {
    if !path.exists() {
        std::fs::write(path, DEFAULT_CAPABILITIES_YAML)
            .map_err(|source| CapabilityError::Io { path: path.to_path_buf(), source })?;
        info!(path = %path.display(), "seeded default capability definitions");
    }
    CapabilityRegistry::load_from_yaml(path)
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        ksi_daemon::config::LogFormat::Json => subscriber.json().init(),
        ksi_daemon::config::LogFormat::Pretty => subscriber.init(),
    }
}

/// `KSI_PROVIDER_COMMAND`: path to the provider subprocess the scheduler
/// invokes per completion request (spec.md §6.2). Defaults to a bare
/// `claude` lookup on `PATH`.
fn provider_command() -> std::path::PathBuf {
    std::env::var("KSI_PROVIDER_COMMAND").map(std::path::PathBuf::from).unwrap_or_else(|_| "claude".into())
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let config = Arc::new(Config::from_env());
    init_tracing(&config);

    config.paths.ensure_dirs()?;

    let event_log = Arc::new(EventLog::open(&config.paths, config.storage)?);
    let state = Arc::new(StateStore::open(&config.paths)?);
    let correlation = Arc::new(CorrelationStore::new());
    let compositions =
        Arc::new(CompositionStore::open(config.paths.compositions_dir.clone(), &config.paths.composition_index_db())?);
    let capabilities = Arc::new(load_capabilities(&config.paths.capabilities_file())?);

    let subsystems = Subsystems {
        state: Arc::clone(&state),
        event_log: Arc::clone(&event_log),
        correlation: Arc::clone(&correlation),
        compositions,
        capabilities,
        provider_command: provider_command(),
    };
    let ctx = DaemonCtx::assemble(Arc::clone(&config), subsystems, now_seconds());

    if config.paths.socket_path.exists() {
        std::fs::remove_file(&config.paths.socket_path)?;
    }
    let unix = UnixListener::bind(&config.paths.socket_path)?;
    info!(socket = %config.paths.socket_path.display(), "ksid listening");

    spawn_gc_tasks(Arc::clone(&ctx), Arc::clone(&state), Arc::clone(&correlation), config.storage.correlation_max_age_hours);
    spawn_shutdown_signal(Arc::clone(&ctx));

    Listener::new(unix, ctx).run().await;

    let _ = std::fs::remove_file(&config.paths.socket_path);
    info!("ksid stopped");
    Ok(())
}

/// Periodic reaper for expired async-state queue items and stale
/// correlation traces (spec.md §4.3, §4.4); neither structure prunes
/// itself on read.
fn spawn_gc_tasks(
    ctx: Arc<DaemonCtx>,
    state: Arc<StateStore>,
    correlation: Arc<CorrelationStore>,
    max_age_hours: u64,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = now_seconds();
                    match state.sweep_expired_items(now) {
                        Ok(swept) if swept > 0 => info!(swept, "async_state: swept expired queue items"),
                        Ok(_) => {}
                        Err(err) => warn!(%err, "async_state sweep failed"),
                    }
                    let swept = correlation.sweep_expired(now, max_age_hours);
                    if swept > 0 {
                        info!(swept, "correlation: swept stale traces");
                    }
                }
                _ = ctx.shutdown.notified() => return,
            }
        }
    });
}

fn spawn_shutdown_signal(ctx: Arc<DaemonCtx>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c, shutting down");
            ctx.shutdown.notify_waiters();
        }
    });
}
