//! Request scheduler: one execution lane for all sessions
//!
//! Many callers submit inference requests concurrently; exactly one worker
//! task drains them in strict submission order. The underlying engine
//! cannot service two contexts at once, so ordering is global FIFO across
//! sessions and a slow turn from one session delays everyone behind it.
//!
//! The lane is a single spawned task that exclusively owns the queue
//! receiver; two concurrent drains are unrepresentable.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::engine::EngineError;
use crate::role::SystemRole;
use crate::session::store::SessionStore;
use crate::utils::{GatewayError, Result};

/// One submitted inference request, consumed exactly once by the lane
struct QueuedRequest {
    session_id: String,
    message: String,
    enqueued_at: DateTime<Utc>,
    /// Single-use result channel the submitting caller awaits
    reply: oneshot::Sender<Result<String>>,
}

/// Observable lane state for the status surface
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LaneStatus {
    /// Requests enqueued but not yet picked up
    pub queued: usize,
    /// Whether an engine turn is currently executing
    pub in_flight: bool,
}

/// Submission handle to the execution lane.
///
/// Cheap to clone; all clones feed the same FIFO. The lane task exits when
/// the last handle is dropped.
#[derive(Clone)]
pub struct Scheduler {
    queue_tx: mpsc::UnboundedSender<QueuedRequest>,
    depth: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
}

impl Scheduler {
    /// Spawns the execution lane and returns the submission handle
    pub fn start(store: Arc<SessionStore>, role: SystemRole) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::drain(
            queue_rx,
            store,
            role,
            Arc::clone(&depth),
            Arc::clone(&in_flight),
        ));

        Self {
            queue_tx,
            depth,
            in_flight,
        }
    }

    /// Enqueues one request and waits for its result.
    ///
    /// Enqueueing itself never blocks on other callers; the await is on
    /// this request's own reply channel. The queue is unbounded by design
    /// (see DESIGN.md): no backpressure policy is applied here, and the
    /// depth is observable through `status` instead.
    pub async fn submit(&self, session_id: &str, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(GatewayError::invalid_input("message must not be empty"));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = QueuedRequest {
            session_id: session_id.to_string(),
            message: message.to_string(),
            enqueued_at: Utc::now(),
            reply: reply_tx,
        };

        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.queue_tx.send(request).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            error!(session_id = %session_id, "Execution lane is gone, rejecting request");
            return Err(GatewayError::Engine(EngineError::connection(
                "execution lane unavailable",
            )));
        }

        match reply_rx.await {
            Ok(result) => result,
            // The lane never drops a request it received; this means the
            // whole lane died mid-request.
            Err(_) => Err(GatewayError::Engine(EngineError::connection(
                "execution lane dropped the request",
            ))),
        }
    }

    /// Current queue depth and in-flight flag
    pub fn status(&self) -> LaneStatus {
        LaneStatus {
            queued: self.depth.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }

    /// The lane: drains the FIFO head-to-tail, one engine turn at a time
    async fn drain(
        mut queue_rx: mpsc::UnboundedReceiver<QueuedRequest>,
        store: Arc<SessionStore>,
        role: SystemRole,
        depth: Arc<AtomicUsize>,
        in_flight: Arc<AtomicBool>,
    ) {
        while let Some(request) = queue_rx.recv().await {
            depth.fetch_sub(1, Ordering::SeqCst);
            in_flight.store(true, Ordering::SeqCst);

            let wait_ms = Utc::now()
                .signed_duration_since(request.enqueued_at)
                .num_milliseconds();
            let turn_start = std::time::Instant::now();

            let result =
                Self::process(&store, &role, &request.session_id, &request.message).await;

            in_flight.store(false, Ordering::SeqCst);

            match &result {
                Ok(_) => debug!(
                    session_id = %request.session_id,
                    wait_ms = wait_ms,
                    turn_ms = turn_start.elapsed().as_millis() as u64,
                    "Request processed"
                ),
                // One request's failure never stops the lane
                Err(e) => debug!(
                    session_id = %request.session_id,
                    wait_ms = wait_ms,
                    error = %e,
                    "Request failed"
                ),
            }

            if request.reply.send(result).is_err() {
                debug!(
                    session_id = %request.session_id,
                    "Caller went away before receiving its result"
                );
            }
        }

        debug!("Execution lane stopped");
    }

    /// One engine turn for one queued request
    async fn process(
        store: &SessionStore,
        role: &SystemRole,
        session_id: &str,
        message: &str,
    ) -> Result<String> {
        // Per-request lookup is the synchronization point with delete and
        // the reaper: a session removed while this request sat in the
        // queue fails here, cleanly.
        let slot = store.context_slot(session_id).await?;

        let response = {
            let mut guard = slot.lock().await;
            // Tombstoned between lookup and lock
            let context = guard
                .as_mut()
                .ok_or_else(|| GatewayError::not_found(session_id))?;
            let system = role.get().await;
            context.prompt(&system, message).await?
        };

        // The session may have been deleted while the engine was busy; the
        // turn is then discarded and the caller sees NotFound.
        store.append_turn(session_id, message, response.as_str()).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use futures::future::join_all;
    use std::time::Duration;

    fn setup(max_sessions: usize) -> (MockEngine, Arc<SessionStore>, Scheduler) {
        let engine = MockEngine::new();
        let store = Arc::new(SessionStore::new(Arc::new(engine.clone()), max_sessions));
        let scheduler = Scheduler::start(Arc::clone(&store), SystemRole::new("test role"));
        (engine, store, scheduler)
    }

    #[tokio::test]
    async fn test_submit_round_trip() {
        let (engine, store, scheduler) = setup(4);
        let id = store.create(Some("s1".to_string())).await.unwrap();

        let response = scheduler.submit(&id, "hello").await.unwrap();
        assert_eq!(response, "echo: hello");
        assert_eq!(engine.call_count(), 1);

        // The turn landed in history, user entry first
        let snapshot = store.get(&id).await.unwrap();
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history[0].content, "hello");
        assert_eq!(snapshot.history[1].content, "echo: hello");
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_enqueueing() {
        let (engine, store, scheduler) = setup(4);
        store.create(Some("s1".to_string())).await.unwrap();

        assert!(scheduler.submit("s1", "").await.is_err());
        assert!(scheduler.submit("s1", "   \n").await.is_err());
        assert_eq!(engine.call_count(), 0);
        assert_eq!(scheduler.status().queued, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_fails_only_that_request() {
        let (_, store, scheduler) = setup(4);
        store.create(Some("live".to_string())).await.unwrap();

        let err = scheduler.submit("ghost", "hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));

        // The lane kept draining
        let response = scheduler.submit("live", "hi").await.unwrap();
        assert_eq!(response, "echo: hi");
    }

    #[tokio::test]
    async fn test_engine_failure_is_isolated() {
        let (engine, store, scheduler) = setup(4);
        store.create(Some("s1".to_string())).await.unwrap();
        store.create(Some("s2".to_string())).await.unwrap();

        engine.fail_next_prompt(EngineError::api(500, "boom"));
        let err = scheduler.submit("s1", "first").await.unwrap_err();
        assert!(matches!(err, GatewayError::Engine(_)));

        // The failed turn must not be recorded
        assert!(store.get("s1").await.unwrap().history.is_empty());

        let response = scheduler.submit("s2", "second").await.unwrap();
        assert_eq!(response, "echo: second");
    }

    #[tokio::test]
    async fn test_global_fifo_ordering() {
        let (engine, store, scheduler) = setup(8);
        for s in ["a", "b", "c"] {
            store.create(Some(s.to_string())).await.unwrap();
        }

        // join_all polls the futures in construction order on its first
        // pass, and submit enqueues before its first await, so the
        // submission order is the vector order.
        let sessions = ["a", "b", "c"];
        let messages: Vec<String> = (0..12).map(|i| format!("msg-{:02}", i)).collect();
        let futures: Vec<_> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| scheduler.submit(sessions[i % 3], m))
            .collect();

        let results = join_all(futures).await;
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap(), &format!("echo: msg-{:02}", i));
        }

        // The engine saw them strictly in submission order
        assert_eq!(engine.prompts(), messages);
    }

    #[tokio::test]
    async fn test_at_most_one_call_in_flight() {
        let (engine, store, scheduler) = setup(8);
        for s in ["a", "b", "c", "d"] {
            store.create(Some(s.to_string())).await.unwrap();
        }
        engine.set_prompt_delay(Duration::from_millis(10));

        let futures: Vec<_> = (0..16)
            .map(|i| {
                let scheduler = scheduler.clone();
                let session = ["a", "b", "c", "d"][i % 4].to_string();
                tokio::spawn(async move { scheduler.submit(&session, "ping").await })
            })
            .collect();

        for handle in futures {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.call_count(), 16);
        assert_eq!(engine.max_concurrent_calls(), 1);
    }

    #[tokio::test]
    async fn test_session_deleted_while_queued_fails_not_found() {
        let (engine, store, scheduler) = setup(4);
        store.create(Some("slow".to_string())).await.unwrap();
        store.create(Some("doomed".to_string())).await.unwrap();
        engine.set_prompt_delay(Duration::from_millis(100));

        // Occupy the lane, queue a request behind it, then delete its
        // session before the lane reaches it.
        let scheduler_a = scheduler.clone();
        let first = tokio::spawn(async move { scheduler_a.submit("slow", "hold the lane").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let scheduler_b = scheduler.clone();
        let second = tokio::spawn(async move { scheduler_b.submit("doomed", "too late").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.delete("doomed").await.unwrap();

        first.await.unwrap().unwrap();
        let err = second.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));

        // Exactly one release: delete's, never a second from the lane
        assert_eq!(engine.contexts_released(), 1);
    }

    #[tokio::test]
    async fn test_current_system_role_read_per_turn() {
        let (engine, store, _) = setup(4);
        let role = SystemRole::new("first role");
        let scheduler = Scheduler::start(Arc::clone(&store), role.clone());
        store.create(Some("s1".to_string())).await.unwrap();

        scheduler.submit("s1", "one").await.unwrap();
        assert_eq!(engine.last_system(), Some("first role".to_string()));

        role.set("second role").await.unwrap();
        scheduler.submit("s1", "two").await.unwrap();
        assert_eq!(engine.last_system(), Some("second role".to_string()));
    }

    #[tokio::test]
    async fn test_status_idle_after_drain() {
        let (_, store, scheduler) = setup(4);
        store.create(Some("s1".to_string())).await.unwrap();
        scheduler.submit("s1", "hello").await.unwrap();

        let status = scheduler.status();
        assert_eq!(status.queued, 0);
        assert!(!status.in_flight);
    }
}
