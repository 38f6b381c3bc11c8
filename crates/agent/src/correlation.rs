use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use outreach_tool_runtime::AdvanceOutcome;

use crate::manager::{BridgeError, SessionManager};

/// A batch of newly arrived external messages, e.g. from a mailbox push
/// notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Opaque position in the external history this batch was read from.
    #[serde(default)]
    pub history_pointer: Option<String>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique id of the external message; replays are detected by it.
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
}

impl InboundMessage {
    /// Text of the user turn injected for this message.
    pub fn render(&self) -> String {
        format!(
            "Reply received on thread {} from {}: {} / {}",
            self.thread_id,
            self.from.as_deref().unwrap_or("unknown sender"),
            self.subject.as_deref().unwrap_or("(no subject)"),
            self.body.trim(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Injection {
    pub message_id: String,
    pub session_id: String,
    pub outcome: AdvanceOutcome,
}

/// What happened to each message of an event.
#[derive(Debug, Clone, Default)]
pub struct CorrelationReport {
    pub history_pointer: Option<String>,
    pub injected: Vec<Injection>,
    /// Message ids whose thread is not in the outbound index.
    pub unmatched: Vec<String>,
    /// Message ids already processed by their session.
    pub duplicates: Vec<String>,
}

/// Routes inbound replies to the session that sent the original message.
pub struct Correlator {
    manager: Arc<SessionManager>,
}

impl Correlator {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Inject every matched, unseen message and run one invocation for each.
    pub async fn handle(&self, event: InboundEvent) -> Result<CorrelationReport, BridgeError> {
        let mut report = CorrelationReport {
            history_pointer: event.history_pointer.clone(),
            ..Default::default()
        };
        let store = self.manager.agent().store();

        for message in &event.messages {
            let Some(session_id) = store.session_for_thread(&message.thread_id)? else {
                warn!(
                    message_id = %message.id,
                    thread_id = %message.thread_id,
                    "No session for inbound thread, skipping"
                );
                report.unmatched.push(message.id.clone());
                continue;
            };

            match self
                .manager
                .deliver_inbound(&session_id, &message.id, &message.render())
                .await?
            {
                Some(outcome) => {
                    info!(
                        session_id = %session_id,
                        message_id = %message.id,
                        status = outcome.status.label(),
                        "Inbound reply processed"
                    );
                    report.injected.push(Injection {
                        message_id: message.id.clone(),
                        session_id,
                        outcome,
                    });
                }
                None => report.duplicates.push(message.id.clone()),
            }
        }

        Ok(report)
    }
}
