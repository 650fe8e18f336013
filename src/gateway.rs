//! Gateway facade and daemon for promptlane
//!
//! `ChatGateway` is the single manager object constructed once at startup:
//! it owns the session store, the execution lane and the system role, and
//! exposes exactly the operations a transport layer needs. It is handed
//! around by `Arc`, never through ambient globals.
//!
//! `run_gateway` wires the daemon: fatal engine initialization, reaper
//! startup, SIGTERM/SIGINT handling, and ordered shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;
use crate::engine::{InferenceEngine, OllamaEngine};
use crate::role::SystemRole;
use crate::scheduler::Scheduler;
use crate::session::{Reaper, SessionStore, SessionSummary, Turn};

/// Response to a sent message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of gateway load for the status surface
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Requests waiting in the execution lane
    pub queued: usize,
    /// Whether an engine turn is currently running
    pub in_flight: bool,
    /// Live session count
    pub live_sessions: usize,
    /// Configured session ceiling
    pub max_sessions: usize,
}

/// The one manager object behind whatever transport hosts the gateway
pub struct ChatGateway {
    store: Arc<SessionStore>,
    scheduler: Scheduler,
    role: SystemRole,
}

impl ChatGateway {
    /// Builds the gateway around an already-initialized engine and starts
    /// the execution lane.
    pub fn new(engine: Arc<dyn InferenceEngine>, config: &Config) -> Self {
        let store = Arc::new(SessionStore::new(engine, config.max_sessions));
        let role = SystemRole::new(config.system_role.clone());
        let scheduler = Scheduler::start(Arc::clone(&store), role.clone());
        Self {
            store,
            scheduler,
            role,
        }
    }

    /// Creates a session, optionally with a caller-supplied id
    pub async fn create_session(&self, id: Option<String>) -> crate::utils::Result<String> {
        self.store.create(id).await
    }

    /// Submits a message to a session and waits for the engine's response
    pub async fn send_message(&self, id: &str, text: &str) -> crate::utils::Result<ChatReply> {
        let content = self.scheduler.submit(id, text).await?;
        Ok(ChatReply {
            content,
            timestamp: Utc::now(),
        })
    }

    /// Ordered turn list for a session
    pub async fn history(&self, id: &str) -> crate::utils::Result<Vec<Turn>> {
        Ok(self.store.get(id).await?.history)
    }

    /// Read-only listing of live sessions
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }

    /// Deletes a session and releases its engine context
    pub async fn delete_session(&self, id: &str) -> crate::utils::Result<()> {
        self.store.delete(id).await
    }

    /// Queue depth, in-flight flag, session count and ceiling
    pub async fn status(&self) -> GatewayStatus {
        let lane = self.scheduler.status();
        GatewayStatus {
            queued: lane.queued,
            in_flight: lane.in_flight,
            live_sessions: self.store.len().await,
            max_sessions: self.store.max_sessions(),
        }
    }

    /// On-demand sweep: reap sessions idle longer than `max_age_minutes`,
    /// returning the count reclaimed
    pub async fn cleanup(&self, max_age_minutes: u64) -> usize {
        Reaper::sweep(&self.store, chrono::Duration::minutes(max_age_minutes as i64)).await
    }

    /// Current process-wide system role
    pub async fn system_role(&self) -> String {
        self.role.get().await
    }

    /// Replaces the system role for all subsequent turns; rejects empty
    pub async fn set_system_role(&self, role: String) -> crate::utils::Result<()> {
        self.role.set(role).await
    }

    /// Store handle for background-task wiring (reaper)
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Releases every live engine context. Called once at daemon shutdown.
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
    }
}

/// Runs the gateway daemon until SIGTERM/SIGINT.
///
/// Engine initialization failure aborts startup entirely: there is no
/// serving without a live engine.
pub async fn run_gateway(config: &Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting promptlane gateway"
    );

    let engine = OllamaEngine::connect(config.engine.clone())
        .await
        .context("Failed to initialize inference engine, refusing to serve")?;

    let gateway = Arc::new(ChatGateway::new(Arc::new(engine), config));
    info!(
        max_sessions = config.max_sessions,
        "Gateway initialized"
    );

    let reaper = Reaper::new(
        Arc::clone(gateway.store()),
        config.reap_interval_secs,
        config.session_max_age_minutes,
    );
    let (reaper_handle, reaper_shutdown) = reaper.start();
    info!(
        interval_secs = config.reap_interval_secs,
        max_age_minutes = config.session_max_age_minutes,
        "Reaper started"
    );

    wait_for_shutdown_signal().await;

    // Graceful shutdown: reaper first, then every live engine context
    info!("Shutting down gateway...");
    let _ = reaper_shutdown.send(()).await;
    let timeout = std::time::Duration::from_secs(5);
    match tokio::time::timeout(timeout, reaper_handle).await {
        Ok(Ok(())) => info!("Reaper stopped"),
        Ok(Err(e)) => error!("Reaper task panicked: {}", e),
        Err(_) => error!("Reaper did not stop within 5s timeout"),
    }

    gateway.shutdown().await;
    info!("Gateway stopped gracefully");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown..."),
        }
    }
    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    }
}
