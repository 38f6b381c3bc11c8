//! Session lifecycle on top of the agent loop.
//!
//! The manager keeps the set of sessions active in this process, each with
//! its own async gate so at most one invocation runs per session at a time.
//! It never waits for a human itself: an invocation that ends awaiting
//! input just returns, and the next `send_message` resumes it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use outreach_tool_runtime::{
    AdvanceOutcome, AgentLoop, LoopError, SessionStatus, SessionSummary, StateRecord, StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),
    #[error("Session already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Initial contents of a new session.
#[derive(Debug, Clone, Default)]
pub struct SessionSeed {
    /// Use this id instead of generating one.
    pub session_id: Option<String>,
    pub user_preferences: Map<String, Value>,
    pub sender_info: Map<String, Value>,
    pub budget: Option<f64>,
}

impl SessionSeed {
    pub fn with_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_preferences(mut self, preferences: Map<String, Value>) -> Self {
        self.user_preferences = preferences;
        self
    }

    pub fn with_sender_info(mut self, sender_info: Map<String, Value>) -> Self {
        self.sender_info = sender_info;
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// How a message was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The session was not waiting; the text is new input.
    NewInput,
    /// The session was awaiting human input; the text answers it.
    Resumed,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub delivery: Delivery,
    pub outcome: AdvanceOutcome,
}

struct SessionHandle {
    gate: Mutex<()>,
    activated_at: DateTime<Utc>,
}

impl SessionHandle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Mutex::new(()),
            activated_at: Utc::now(),
        })
    }
}

pub struct SessionManager {
    agent: Arc<AgentLoop>,
    active: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new(agent: Arc<AgentLoop>) -> Self {
        Self {
            agent,
            active: RwLock::new(HashMap::new()),
        }
    }

    pub fn agent(&self) -> &Arc<AgentLoop> {
        &self.agent
    }

    /// Create, persist and activate a new session.
    pub async fn start_session(&self, seed: SessionSeed) -> Result<String, BridgeError> {
        let session_id = seed
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let store = self.agent.store();
        if store.load(&session_id)?.is_some() {
            return Err(BridgeError::AlreadyExists(session_id));
        }

        let record = StateRecord::new(&session_id)
            .with_preferences(seed.user_preferences)
            .with_sender_info(seed.sender_info)
            .with_budget(seed.budget);
        store.save(&session_id, &record)?;

        self.active
            .write()
            .await
            .insert(session_id.clone(), SessionHandle::new());
        info!(session_id = %session_id, "session started");
        Ok(session_id)
    }

    /// Re-activate a persisted session, e.g. after a restart.
    pub async fn resume_session(&self, session_id: &str) -> Result<SessionSummary, BridgeError> {
        let record = self
            .agent
            .store()
            .load(session_id)?
            .ok_or_else(|| BridgeError::UnknownSession(session_id.to_string()))?;

        let mut active = self.active.write().await;
        if !active.contains_key(session_id) {
            active.insert(session_id.to_string(), SessionHandle::new());
            info!(session_id, status = record.status().label(), "session resumed");
        }
        Ok(record.summary())
    }

    /// Deliver human text to an active session and run one invocation.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<SendOutcome, BridgeError> {
        let handle = self.handle(session_id).await?;
        let _gate = handle.gate.lock().await;

        let record = self
            .agent
            .store()
            .load(session_id)?
            .ok_or_else(|| BridgeError::UnknownSession(session_id.to_string()))?;
        let delivery = if record.status().is_awaiting() {
            Delivery::Resumed
        } else {
            Delivery::NewInput
        };
        debug!(session_id, ?delivery, "routing message");

        let outcome = self.agent.advance(session_id, Some(text)).await?;
        Ok(SendOutcome { delivery, outcome })
    }

    /// Inject an inbound reply, serialized with any local driver of the same
    /// session. `Ok(None)` when the message was already processed or the
    /// session has no stored state.
    pub async fn deliver_inbound(
        &self,
        session_id: &str,
        message_id: &str,
        text: &str,
    ) -> Result<Option<AdvanceOutcome>, BridgeError> {
        let handle = self.active.read().await.get(session_id).cloned();
        let _gate = match &handle {
            Some(handle) => Some(handle.gate.lock().await),
            None => None,
        };
        Ok(self.agent.inject_inbound(session_id, message_id, text).await?)
    }

    pub async fn get_state(&self, session_id: &str) -> Result<StateRecord, BridgeError> {
        self.agent
            .store()
            .load(session_id)?
            .ok_or_else(|| BridgeError::UnknownSession(session_id.to_string()))
    }

    pub async fn summary(&self, session_id: &str) -> Result<SessionSummary, BridgeError> {
        Ok(self.get_state(session_id).await?.summary())
    }

    /// Mark the session terminated and deactivate it. Its state stays on disk.
    pub async fn end_session(&self, session_id: &str) -> Result<SessionSummary, BridgeError> {
        let handle = self.handle(session_id).await?;
        let _gate = handle.gate.lock().await;

        let store = self.agent.store();
        let mut record = store
            .load(session_id)?
            .ok_or_else(|| BridgeError::UnknownSession(session_id.to_string()))?;
        record.set_status(SessionStatus::Terminated);
        store.save(session_id, &record)?;

        self.active.write().await.remove(session_id);
        let lifetime = Utc::now() - handle.activated_at;
        info!(session_id, active_secs = lifetime.num_seconds(), "session ended");
        Ok(record.summary())
    }

    /// Summaries of every stored session, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BridgeError> {
        let store = self.agent.store();
        let mut summaries = Vec::new();
        for id in store.list()? {
            match store.load(&id) {
                Ok(Some(record)) => summaries.push(record.summary()),
                Ok(None) => {}
                Err(e) => warn!(session_id = %id, error = %e, "skipping unreadable session"),
            }
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    pub async fn is_active(&self, session_id: &str) -> bool {
        self.active.read().await.contains_key(session_id)
    }

    async fn handle(&self, session_id: &str) -> Result<Arc<SessionHandle>, BridgeError> {
        self.active
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownSession(session_id.to_string()))
    }
}
