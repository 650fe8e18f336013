//! Inactivity reaper for abandoned sessions
//!
//! Sessions whose last activity is older than the configured maximum age
//! are deleted on a fixed sweep interval, releasing their engine contexts
//! through the session store. The store's per-request lookup is what makes
//! a sweep racing an in-flight request safe; the reaper itself just calls
//! `delete`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::session::store::SessionStore;

/// Periodic TTL sweep over the session store
pub struct Reaper {
    store: Arc<SessionStore>,
    interval_secs: u64,
    max_age: Duration,
}

impl Reaper {
    pub fn new(store: Arc<SessionStore>, interval_secs: u64, max_age_minutes: u64) -> Self {
        Self {
            store,
            interval_secs,
            max_age: Duration::minutes(max_age_minutes as i64),
        }
    }

    /// Returns true if a session with this `last_activity` is past the age
    /// limit
    pub fn is_expired(last_activity: DateTime<Utc>, max_age: Duration) -> bool {
        Utc::now().signed_duration_since(last_activity) > max_age
    }

    /// Deletes every session idle longer than `max_age` and returns the
    /// count reclaimed.
    ///
    /// Individual delete failures are logged and skipped; a sweep never
    /// aborts part-way. Also backs the gateway's on-demand cleanup
    /// operation.
    pub async fn sweep(store: &SessionStore, max_age: Duration) -> usize {
        let stale = store.stale_ids(max_age).await;
        let mut reclaimed = 0;

        for id in stale {
            match store.delete(&id).await {
                Ok(()) => reclaimed += 1,
                Err(e) => {
                    // Most likely a concurrent explicit delete won the race
                    error!(session_id = %id, error = %e, "Failed to reap session");
                }
            }
        }

        if reclaimed > 0 {
            info!(reclaimed = reclaimed, "Reaper sweep complete");
        }
        reclaimed
    }

    /// Runs one sweep with this reaper's configured age limit
    pub async fn run(&self) -> usize {
        Self::sweep(&self.store, self.max_age).await
    }

    /// Starts the background sweep task.
    ///
    /// Returns a JoinHandle for graceful shutdown coordination and a
    /// shutdown sender to signal the task to stop.
    pub fn start(self) -> (tokio::task::JoinHandle<()>, tokio::sync::mpsc::Sender<()>) {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(self.interval_secs));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.run().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Reaper received shutdown signal, stopping...");
                        break;
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }
}
