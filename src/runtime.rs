//! Runtime for executing conversations
//!
//! One `ConversationRuntime` task per chat session. Sessions live only in
//! memory and disappear on teardown, idle expiry or process exit.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::engine::{ConversationSnapshot, DialogueEngine};
use crate::state_machine::{DialogueContext, Event};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Errors from the session plumbing (never from the dialogue itself)
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Chat session not found: {0}")]
    SessionNotFound(String),
    #[error("Chat session {0} is no longer running")]
    SessionStopped(String),
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        snapshot: serde_json::Value,
    },
    Message {
        message: serde_json::Value,
    },
    /// Bot typing indicator
    Typing {
        active: bool,
    },
    StateChange {
        snapshot: serde_json::Value,
    },
    Error {
        message: String,
    },
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct ConversationHandle {
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub snapshot_rx: watch::Receiver<ConversationSnapshot>,
    shutdown: CancellationToken,
}

impl ConversationHandle {
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_rx.borrow().clone()
    }
}

/// Spawn a runtime task for a fresh conversation and return its handle
pub fn spawn_conversation<L>(
    session_id: &str,
    context: DialogueContext,
    lead_submitter: Arc<L>,
) -> ConversationHandle
where
    L: LeadSubmitter + ?Sized + 'static,
{
    let engine = DialogueEngine::new(context);
    let (event_tx, event_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let shutdown = CancellationToken::new();

    let runtime = ConversationRuntime::new(
        session_id,
        engine,
        lead_submitter,
        event_rx,
        broadcast_tx.clone(),
        snapshot_tx,
        shutdown.clone(),
    );

    let id = session_id.to_string();
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!(session_id = %id, "Conversation runtime finished");
    });

    ConversationHandle {
        event_tx,
        broadcast_tx,
        snapshot_rx,
        shutdown,
    }
}

/// A live session and when a client last touched it
struct Session {
    handle: ConversationHandle,
    last_activity: Instant,
}

impl Session {
    fn new(handle: ConversationHandle) -> Self {
        Self {
            handle,
            last_activity: Instant::now(),
        }
    }

    /// An open SSE stream keeps the session alive
    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        self.handle.broadcast_tx.receiver_count() == 0
            && now.saturating_duration_since(self.last_activity) >= ttl
    }
}

/// Manager for all chat sessions
pub struct RuntimeManager {
    context: DialogueContext,
    lead_submitter: Arc<dyn LeadSubmitter>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl RuntimeManager {
    pub fn new(context: DialogueContext, lead_submitter: Arc<dyn LeadSubmitter>) -> Self {
        Self {
            context,
            lead_submitter,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new conversation and return its id and handle
    pub async fn create(&self) -> (String, ConversationHandle) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let handle = spawn_conversation(
            &session_id,
            self.context.clone(),
            Arc::clone(&self.lead_submitter),
        );

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Session::new(handle.clone()));
        tracing::info!(session_id = %session_id, "Chat session created");

        (session_id, handle)
    }

    pub async fn get(&self, session_id: &str) -> Result<ConversationHandle, RuntimeError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.handle.clone())
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Like `get`, but counts as client activity
    async fn touch(&self, session_id: &str) -> Result<ConversationHandle, RuntimeError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;
        session.last_activity = Instant::now();
        Ok(session.handle.clone())
    }

    /// Send an event to a conversation
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), RuntimeError> {
        let handle = self.touch(session_id).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::SessionStopped(session_id.to_string()))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<ConversationSnapshot, RuntimeError> {
        Ok(self.touch(session_id).await?.snapshot())
    }

    /// Subscribe to conversation updates, along with the state at subscription time
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(ConversationSnapshot, broadcast::Receiver<SseEvent>), RuntimeError> {
        let handle = self.touch(session_id).await?;
        let rx = handle.broadcast_tx.subscribe();
        Ok((handle.snapshot(), rx))
    }

    /// Tear a conversation down, cancelling any pending reply
    pub async fn close(&self, session_id: &str) -> Result<(), RuntimeError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))?;
        session.handle.shutdown.cancel();
        tracing::info!(session_id = %session_id, "Chat session closed");
        Ok(())
    }

    /// Close every session idle for at least `ttl`; returns how many went
    pub async fn close_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<(String, Session)> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.is_idle(now, ttl))
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove_entry(&id))
                .collect()
        };

        for (session_id, session) in &expired {
            session.handle.shutdown.cancel();
            tracing::info!(
                session_id = %session_id,
                idle_secs = now.saturating_duration_since(session.last_activity).as_secs(),
                "Idle chat session closed"
            );
        }
        expired.len()
    }

    /// Periodically close idle sessions. The task ends once the manager is dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, ttl: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let closed = manager.close_idle(ttl).await;
                if closed > 0 {
                    tracing::debug!(closed, "Idle sweep finished");
                }
            }
        })
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
