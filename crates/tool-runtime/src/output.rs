//! Typed tool results.
//!
//! Every tool returns one [`ToolOutput`] variant. The loop folds the variant
//! into the session's state record with an exhaustive match, so adding a
//! result shape forces every consumer to decide what to do with it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    /// Discovered entities, appended to `candidates`.
    Records(Vec<Value>),
    /// A full scoring run, replacing `scored_candidates`.
    Scored(ScoredBatch),
    /// Drafted messages keyed by candidate, replacing `outreach_messages`.
    Messages(IndexMap<String, OutreachMessage>),
    /// New remaining budget.
    Budget(f64),
    /// A message went out; the thread handle feeds correlation.
    Sent(SentReceipt),
    /// A meeting was created.
    Scheduled(Value),
    /// Shown to the human; the loop keeps going.
    Notice(String),
    /// Suspend the session until the human answers.
    AwaitInput { prompt: String },
    Text(String),
    Structured(Value),
}

impl ToolOutput {
    /// JSON form of the result as it appears in the feedback turn.
    pub fn feedback_value(&self) -> Value {
        match self {
            ToolOutput::Records(records) => Value::Array(records.clone()),
            ToolOutput::Scored(batch) => serde_json::to_value(batch).unwrap_or(Value::Null),
            ToolOutput::Messages(messages) => {
                serde_json::to_value(messages).unwrap_or(Value::Null)
            }
            ToolOutput::Budget(amount) => {
                Value::String(format!("Available budget updated to {amount}"))
            }
            ToolOutput::Sent(receipt) => receipt.detail.clone(),
            ToolOutput::Scheduled(meeting) => meeting.clone(),
            ToolOutput::Notice(message) => Value::String(message.clone()),
            ToolOutput::AwaitInput { prompt } => Value::String(prompt.clone()),
            ToolOutput::Text(text) => Value::String(text.clone()),
            ToolOutput::Structured(value) => value.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ToolOutput::Records(_) => "records",
            ToolOutput::Scored(_) => "scored",
            ToolOutput::Messages(_) => "messages",
            ToolOutput::Budget(_) => "budget",
            ToolOutput::Sent(_) => "sent",
            ToolOutput::Scheduled(_) => "scheduled",
            ToolOutput::Notice(_) => "notice",
            ToolOutput::AwaitInput { .. } => "await_input",
            ToolOutput::Text(_) => "text",
            ToolOutput::Structured(_) => "structured",
        }
    }
}

/// Candidate score, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 100;

    pub fn clamped(raw: f64) -> Self {
        if raw.is_nan() {
            return Score(0);
        }
        Score(raw.round().clamp(0.0, Self::MAX as f64) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            Err(format!("score {value} exceeds {}", Self::MAX))
        } else {
            Ok(Score(value))
        }
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Value,
    pub score: Score,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    Llm,
    Basic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBatch {
    pub candidates: Vec<ScoredCandidate>,
    pub ranking_summary: String,
    pub method: ScoringMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftMethod {
    Llm,
    Template,
}

/// One drafted outreach message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachMessage {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub key_personalization: String,
    #[serde(default)]
    pub call_to_action: String,
    pub candidate: Value,
    pub candidate_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_email: Option<String>,
    pub method: DraftMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentReceipt {
    pub thread_id: String,
    /// Raw confirmation returned by the sender.
    pub detail: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_clamped() {
        assert_eq!(Score::clamped(150.0).value(), 100);
        assert_eq!(Score::clamped(-4.0).value(), 0);
        assert_eq!(Score::clamped(72.4).value(), 72);
        assert_eq!(Score::clamped(f64::NAN).value(), 0);
    }

    #[test]
    fn test_score_rejects_out_of_range_on_load() {
        let ok: Score = serde_json::from_value(json!(88)).unwrap();
        assert_eq!(ok.value(), 88);
        assert!(serde_json::from_value::<Score>(json!(101)).is_err());
    }

    #[test]
    fn test_feedback_value_per_variant() {
        assert_eq!(
            ToolOutput::Records(vec![json!({"name": "a"})]).feedback_value(),
            json!([{"name": "a"}])
        );
        assert_eq!(
            ToolOutput::Budget(500.0).feedback_value(),
            json!("Available budget updated to 500")
        );
        let receipt = SentReceipt {
            thread_id: "t-1".into(),
            detail: json!({"status": "sent", "thread_id": "t-1"}),
        };
        assert_eq!(
            ToolOutput::Sent(receipt).feedback_value()["thread_id"],
            "t-1"
        );
        assert_eq!(ToolOutput::Text("hi".into()).feedback_value(), json!("hi"));
    }

    #[test]
    fn test_output_tagging() {
        let out = ToolOutput::AwaitInput { prompt: "budget?".into() };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["kind"], "await_input");
        assert_eq!(json["value"]["prompt"], "budget?");
        assert_eq!(out.kind(), "await_input");
    }
}
