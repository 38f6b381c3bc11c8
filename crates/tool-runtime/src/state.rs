use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::output::{OutreachMessage, ScoredCandidate, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// Result of one dispatch, as shown back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFeedback {
    pub tool: String,
    pub inputs: Map<String, Value>,
    pub result: Value,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TurnContent {
    Text(String),
    /// The decoded model object, stored verbatim.
    Decision(Value),
    ToolFeedback(ToolFeedback),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: TurnContent,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user_text(text: &str) -> Self {
        Self {
            role: TurnRole::User,
            content: TurnContent::Text(text.to_string()),
            at: Utc::now(),
        }
    }

    pub fn assistant_decision(object: Value) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: TurnContent::Decision(object),
            at: Utc::now(),
        }
    }

    /// Raw model output that could not be decoded.
    pub fn assistant_text(text: &str) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: TurnContent::Text(text.to_string()),
            at: Utc::now(),
        }
    }

    /// Tool results re-enter the conversation as environment feedback from
    /// the user side.
    pub fn feedback(feedback: ToolFeedback) -> Self {
        Self {
            role: TurnRole::User,
            content: TurnContent::ToolFeedback(feedback),
            at: Utc::now(),
        }
    }
}

/// Durable lifecycle state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    AwaitingHumanInput { prompt: String },
    Terminated,
}

impl SessionStatus {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, SessionStatus::AwaitingHumanInput { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::AwaitingHumanInput { .. } => "awaiting_human_input",
            SessionStatus::Terminated => "terminated",
        }
    }
}

/// Everything persisted for one session.
///
/// History and errors are append-only; there is no API to rewrite or remove
/// past entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status: SessionStatus,
    raw_goal: Option<String>,
    conversation_history: Vec<Turn>,
    #[serde(default)]
    candidates: Vec<Value>,
    #[serde(default)]
    scored_candidates: Vec<ScoredCandidate>,
    #[serde(default)]
    ranking_summary: Option<String>,
    #[serde(default)]
    outreach_messages: IndexMap<String, OutreachMessage>,
    #[serde(default)]
    scheduled_meetings: Vec<Value>,
    #[serde(default)]
    budget_remaining: Option<f64>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    user_preferences: Map<String, Value>,
    #[serde(default)]
    sender_info: Map<String, Value>,
    #[serde(default)]
    outbound_threads: Vec<String>,
    #[serde(default)]
    processed_inbound: IndexSet<String>,
}

impl StateRecord {
    pub fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Running,
            raw_goal: None,
            conversation_history: Vec::new(),
            candidates: Vec::new(),
            scored_candidates: Vec::new(),
            ranking_summary: None,
            outreach_messages: IndexMap::new(),
            scheduled_meetings: Vec::new(),
            budget_remaining: None,
            errors: Vec::new(),
            user_preferences: Map::new(),
            sender_info: Map::new(),
            outbound_threads: Vec::new(),
            processed_inbound: IndexSet::new(),
        }
    }

    pub fn with_preferences(mut self, preferences: Map<String, Value>) -> Self {
        self.user_preferences = preferences;
        self
    }

    pub fn with_sender_info(mut self, sender_info: Map<String, Value>) -> Self {
        self.sender_info = sender_info;
        self
    }

    pub fn with_budget(mut self, budget: Option<f64>) -> Self {
        self.budget_remaining = budget;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn raw_goal(&self) -> Option<&str> {
        self.raw_goal.as_deref()
    }

    pub fn conversation_history(&self) -> &[Turn] {
        &self.conversation_history
    }

    pub fn candidates(&self) -> &[Value] {
        &self.candidates
    }

    pub fn scored_candidates(&self) -> &[ScoredCandidate] {
        &self.scored_candidates
    }

    pub fn ranking_summary(&self) -> Option<&str> {
        self.ranking_summary.as_deref()
    }

    pub fn outreach_messages(&self) -> &IndexMap<String, OutreachMessage> {
        &self.outreach_messages
    }

    pub fn scheduled_meetings(&self) -> &[Value] {
        &self.scheduled_meetings
    }

    pub fn budget_remaining(&self) -> Option<f64> {
        self.budget_remaining
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn user_preferences(&self) -> &Map<String, Value> {
        &self.user_preferences
    }

    pub fn sender_info(&self) -> &Map<String, Value> {
        &self.sender_info
    }

    pub fn outbound_threads(&self) -> &[String] {
        &self.outbound_threads
    }

    pub fn has_processed_inbound(&self, message_id: &str) -> bool {
        self.processed_inbound.contains(message_id)
    }

    /// Set the goal from the first user content. Later calls are ignored.
    pub fn record_goal(&mut self, text: &str) -> bool {
        if self.raw_goal.is_some() {
            return false;
        }
        self.raw_goal = Some(text.to_string());
        true
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.conversation_history.push(turn);
        self.touch();
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.touch();
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.touch();
    }

    /// Remember an inbound message id. Returns false if it was already seen.
    pub fn mark_inbound(&mut self, message_id: &str) -> bool {
        let inserted = self.processed_inbound.insert(message_id.to_string());
        if inserted {
            self.touch();
        }
        inserted
    }

    /// Fold a tool result into the task fields.
    ///
    /// Returns the thread handle when the output records a sent message, so
    /// the caller can index it for reply correlation.
    pub fn fold(&mut self, output: &ToolOutput) -> Option<String> {
        let mut sent = None;
        match output {
            ToolOutput::Records(records) => self.candidates.extend(records.iter().cloned()),
            ToolOutput::Scored(batch) => {
                self.scored_candidates = batch.candidates.clone();
                self.ranking_summary = Some(batch.ranking_summary.clone());
            }
            ToolOutput::Messages(messages) => self.outreach_messages = messages.clone(),
            ToolOutput::Budget(amount) => self.budget_remaining = Some(*amount),
            ToolOutput::Sent(receipt) => {
                if !self.outbound_threads.contains(&receipt.thread_id) {
                    self.outbound_threads.push(receipt.thread_id.clone());
                }
                sent = Some(receipt.thread_id.clone());
            }
            ToolOutput::Scheduled(meeting) => self.scheduled_meetings.push(meeting.clone()),
            ToolOutput::Notice(_)
            | ToolOutput::AwaitInput { .. }
            | ToolOutput::Text(_)
            | ToolOutput::Structured(_) => {}
        }
        self.touch();
        sent
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            raw_goal: self.raw_goal.clone(),
            status: self.status.clone(),
            candidates: self.candidates.len(),
            scored_candidates: self.scored_candidates.len(),
            outreach_messages: self.outreach_messages.len(),
            scheduled_meetings: self.scheduled_meetings.len(),
            errors: self.errors.len(),
            turns: self.conversation_history.len(),
            budget_remaining: self.budget_remaining,
            updated_at: self.updated_at,
        }
    }
}

/// Counts-only view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub raw_goal: Option<String>,
    pub status: SessionStatus,
    pub candidates: usize,
    pub scored_candidates: usize,
    pub outreach_messages: usize,
    pub scheduled_meetings: usize,
    pub errors: usize,
    pub turns: usize,
    pub budget_remaining: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Score, ScoredBatch, ScoringMethod, SentReceipt};
    use serde_json::json;

    fn scored(name: &str, score: u8) -> ScoredCandidate {
        ScoredCandidate {
            candidate: json!({"name": name}),
            score: Score::try_from(score).unwrap(),
            strengths: vec![],
            concerns: vec![],
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_goal_set_once() {
        let mut record = StateRecord::new("s1");
        assert!(record.record_goal("find podcast guests"));
        assert!(!record.record_goal("something else"));
        assert_eq!(record.raw_goal(), Some("find podcast guests"));
    }

    #[test]
    fn test_fold_records_appends_duplicates() {
        let mut record = StateRecord::new("s1");
        let batch = ToolOutput::Records(vec![json!({"name": "a"})]);
        record.fold(&batch);
        record.fold(&batch);
        assert_eq!(record.candidates().len(), 2);
    }

    #[test]
    fn test_fold_scored_replaces() {
        let mut record = StateRecord::new("s1");
        record.fold(&ToolOutput::Scored(ScoredBatch {
            candidates: vec![scored("a", 90), scored("b", 40)],
            ranking_summary: "first".into(),
            method: ScoringMethod::Llm,
        }));
        record.fold(&ToolOutput::Scored(ScoredBatch {
            candidates: vec![scored("c", 70)],
            ranking_summary: "second".into(),
            method: ScoringMethod::Basic,
        }));
        assert_eq!(record.scored_candidates().len(), 1);
        assert_eq!(record.scored_candidates()[0].candidate["name"], "c");
        assert_eq!(record.ranking_summary(), Some("second"));
    }

    #[test]
    fn test_fold_budget_and_sent() {
        let mut record = StateRecord::new("s1");
        assert_eq!(record.fold(&ToolOutput::Budget(250.0)), None);
        assert_eq!(record.budget_remaining(), Some(250.0));

        let receipt = ToolOutput::Sent(SentReceipt {
            thread_id: "thread-9".into(),
            detail: json!({"status": "sent"}),
        });
        assert_eq!(record.fold(&receipt), Some("thread-9".to_string()));
        record.fold(&receipt);
        assert_eq!(record.outbound_threads(), ["thread-9".to_string()]);
    }

    #[test]
    fn test_fold_feedback_only_variants_leave_fields() {
        let mut record = StateRecord::new("s1");
        let before = record.summary();
        record.fold(&ToolOutput::Text("hello".into()));
        record.fold(&ToolOutput::Structured(json!({"a": 1})));
        record.fold(&ToolOutput::Notice("hi".into()));
        let after = record.summary();
        assert_eq!(before.candidates, after.candidates);
        assert_eq!(before.turns, after.turns);
    }

    #[test]
    fn test_mark_inbound_is_idempotent() {
        let mut record = StateRecord::new("s1");
        assert!(record.mark_inbound("msg-1"));
        assert!(!record.mark_inbound("msg-1"));
        assert!(record.has_processed_inbound("msg-1"));
    }

    #[test]
    fn test_serde_roundtrip_equal() {
        let mut record = StateRecord::new("s1").with_budget(Some(1000.0));
        record.record_goal("goal");
        record.push_turn(Turn::user_text("goal"));
        record.push_turn(Turn::assistant_decision(json!({"thought": "t"})));
        record.push_turn(Turn::feedback(ToolFeedback {
            tool: "google_search".into(),
            inputs: Map::new(),
            result: json!([1, 2]),
            is_error: false,
        }));
        record.set_status(SessionStatus::AwaitingHumanInput { prompt: "budget?".into() });
        record.mark_inbound("m1");
        record.record_error("Error executing x: boom");

        let json = serde_json::to_string_pretty(&record).unwrap();
        let loaded: StateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_summary_counts() {
        let mut record = StateRecord::new("s1");
        record.push_turn(Turn::user_text("hi"));
        record.record_error("oops");
        let summary = record.summary();
        assert_eq!(summary.turns, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.status, SessionStatus::Running);
        assert_eq!(record.status().label(), "running");
    }
}
