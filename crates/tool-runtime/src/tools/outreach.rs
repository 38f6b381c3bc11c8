//! Personalized outreach drafting, one model call per candidate.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::context::ToolContext;
use crate::output::{DraftMethod, OutreachMessage, ToolOutput};
use crate::parser::extract_json_object;
use crate::provider::CompletionModel;
use crate::tool::{required_str, ParamKind, ParamSpec, Tool, ToolCategory, ToolDescriptor, ToolError};

pub struct PrepareOutreachTool {
    model: Arc<dyn CompletionModel>,
    draft_timeout: Duration,
    time_budget: Duration,
}

impl PrepareOutreachTool {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            draft_timeout: Duration::from_secs(30),
            time_budget: Duration::from_secs(90),
        }
    }

    /// Limit on a single candidate's drafting call.
    pub fn with_draft_timeout(mut self, timeout: Duration) -> Self {
        self.draft_timeout = timeout;
        self
    }

    /// Total model time for one run. Candidates left once it is spent get
    /// the template without a model call.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    async fn draft_with_model(
        &self,
        candidate: &Value,
        query: &str,
        preferences: &Map<String, Value>,
        sender: &Map<String, Value>,
        deadline: Instant,
    ) -> Option<Draft> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("Outreach time budget spent, using template");
            return None;
        }
        let limit = self.draft_timeout.min(remaining);
        let prompt = outreach_prompt(candidate, query, preferences, sender);
        let raw = match tokio::time::timeout(limit, self.model.complete(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "Outreach model call failed, using template");
                return None;
            }
            Err(_) => {
                warn!(timeout = ?limit, "Outreach model call timed out, using template");
                return None;
            }
        };
        let draft: Draft = serde_json::from_str(extract_json_object(&raw)?).ok()?;
        if draft.subject.trim().is_empty() || draft.body.trim().is_empty() {
            return None;
        }
        Some(draft)
    }
}

#[derive(Debug, Deserialize)]
struct Draft {
    subject: String,
    body: String,
    #[serde(default)]
    key_personalization: String,
    #[serde(default)]
    call_to_action: String,
}

fn text_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn outreach_prompt(
    candidate: &Value,
    query: &str,
    preferences: &Map<String, Value>,
    sender: &Map<String, Value>,
) -> String {
    let sender_json = serde_json::to_string_pretty(sender).unwrap_or_default();
    let prefs_json = serde_json::to_string_pretty(preferences).unwrap_or_default();
    let candidate_json = serde_json::to_string_pretty(candidate).unwrap_or_default();
    format!(
        "You are an expert outreach specialist. Write a personalized outreach email.\n\n\
         USER QUERY: {query}\n\n\
         SENDER INFORMATION:\n{sender_json}\n\n\
         USER PREFERENCES:\n{prefs_json}\n\n\
         CANDIDATE DETAILS:\n{candidate_json}\n\n\
         Reference specific details of the candidate's work, explain the opportunity and its value, \
         mention compensation if a budget is known, keep it to 2-3 paragraphs and end with a clear \
         call to action.\n\n\
         Return only JSON of the form:\n\
         {{\"subject\": \"...\", \"body\": \"...\", \"key_personalization\": \"...\", \"call_to_action\": \"...\"}}"
    )
}

/// Generic message used when the model cannot draft one.
pub fn template_draft(
    candidate: &Value,
    query: &str,
    preferences: &Map<String, Value>,
    sender: &Map<String, Value>,
) -> (String, String) {
    let sender_name = sender.get("name").and_then(Value::as_str).unwrap_or("Our Team");
    let company = sender.get("company").and_then(Value::as_str).unwrap_or("Our Company");
    let budget = match preferences.get("budget") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "Competitive compensation".to_string(),
    };
    let name = text_field(candidate, "name").unwrap_or("there");

    let subject = format!("Collaboration Opportunity - {query}");
    let body = format!(
        "Hi {name},\n\n\
         I hope this email finds you well. I came across your work and was impressed by your \
         expertise in {query}.\n\n\
         I'm {sender_name} from {company}, and I'm reaching out about an opportunity that I believe \
         would be a great fit for your background.\n\n\
         We're offering {budget} and would love to discuss this further with you.\n\n\
         Would you be interested in a brief conversation to explore this opportunity?\n\n\
         Best regards,\n{sender_name}\n{company}"
    );
    (subject, body)
}

#[async_trait]
impl Tool for PrepareOutreachTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "prepare_outreach",
            "Draft a personalized outreach email for each candidate. Replaces previously drafted messages.",
            ToolCategory::Information,
        )
        .param(ParamSpec::required("candidates", ParamKind::Array, "Candidates to contact"))
        .param(ParamSpec::required("user_query", ParamKind::String, "What the outreach is about"))
        .param(ParamSpec::optional("user_preferences", ParamKind::Object, "Budget, tone, location"))
        .param(ParamSpec::optional("sender_info", ParamKind::Object, "Sender name and company"))
    }

    async fn execute(
        &self,
        inputs: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let candidates = inputs
            .get("candidates")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidInput("missing 'candidates' field".into()))?;
        if candidates.is_empty() {
            return Err(ToolError::InvalidInput("No candidates provided".into()));
        }
        let query = required_str(&inputs, "user_query")?;
        let preferences = inputs
            .get("user_preferences")
            .and_then(Value::as_object)
            .unwrap_or(&context.user_preferences);
        let sender = inputs
            .get("sender_info")
            .and_then(Value::as_object)
            .unwrap_or(&context.sender_info);

        let deadline = Instant::now() + self.time_budget;
        let mut messages = IndexMap::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let candidate_name = text_field(candidate, "name").unwrap_or("Unknown").to_string();
            debug!(session_id = %context.session_id, candidate = %candidate_name, "Drafting outreach");

            let message = match self
                .draft_with_model(candidate, query, preferences, sender, deadline)
                .await
            {
                Some(draft) => OutreachMessage {
                    subject: draft.subject,
                    body: draft.body,
                    key_personalization: draft.key_personalization,
                    call_to_action: draft.call_to_action,
                    candidate: candidate.clone(),
                    candidate_name: candidate_name.clone(),
                    candidate_email: text_field(candidate, "email").map(str::to_string),
                    method: DraftMethod::Llm,
                },
                None => {
                    let (subject, body) = template_draft(candidate, query, preferences, sender);
                    OutreachMessage {
                        subject,
                        body,
                        key_personalization: "Basic template with candidate name and expertise area"
                            .into(),
                        call_to_action: "Brief conversation to explore opportunity".into(),
                        candidate: candidate.clone(),
                        candidate_name: candidate_name.clone(),
                        candidate_email: text_field(candidate, "email").map(str::to_string),
                        method: DraftMethod::Template,
                    }
                }
            };

            let key = text_field(candidate, "name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("Candidate_{}", i + 1));
            messages.insert(key, message);
        }

        info!(session_id = %context.session_id, drafted = messages.len(), "Prepared outreach messages");
        Ok(ToolOutput::Messages(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::ScriptedModel;
    use crate::provider::ModelError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    /// Answers with a valid draft, but only after `delay`.
    struct SluggishModel {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SluggishModel {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CompletionModel for SluggishModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(r#"{"subject": "late", "body": "too late"}"#.to_string())
        }

        fn model_name(&self) -> &str {
            "sluggish"
        }
    }

    fn two_candidates() -> Map<String, Value> {
        inputs(json!({
            "candidates": [{"name": "Ana"}, {"name": "Bo"}],
            "user_query": "AI podcast guests"
        }))
    }

    #[tokio::test]
    async fn test_drafts_with_model_and_template_fallback() {
        let model = Arc::new(ScriptedModel::with_responses([
            r#"{"subject": "Loved your ML episode", "body": "Hi Ana...", "key_personalization": "episode 12", "call_to_action": "15 min call"}"#,
            "sorry, cannot help",
        ]));
        let tool = PrepareOutreachTool::new(model.clone());
        let ctx = ToolContext::new("s")
            .with_sender_info(inputs(json!({"name": "Sam", "company": "Acme"})));
        let out = tool
            .execute(
                inputs(json!({
                    "candidates": [
                        {"name": "Ana", "email": "ana@example.com"},
                        {"description": "no name here"}
                    ],
                    "user_query": "AI podcast guests"
                })),
                &ctx,
            )
            .await
            .unwrap();

        let ToolOutput::Messages(messages) = out else { panic!("expected messages") };
        let keys: Vec<&String> = messages.keys().collect();
        assert_eq!(keys, vec!["Ana", "Candidate_2"]);

        let ana = &messages["Ana"];
        assert_eq!(ana.method, DraftMethod::Llm);
        assert_eq!(ana.subject, "Loved your ML episode");
        assert_eq!(ana.candidate_email.as_deref(), Some("ana@example.com"));

        let fallback = &messages["Candidate_2"];
        assert_eq!(fallback.method, DraftMethod::Template);
        assert_eq!(fallback.subject, "Collaboration Opportunity - AI podcast guests");
        assert!(fallback.body.starts_with("Hi there,"));
        assert!(fallback.body.contains("I'm Sam from Acme"));
        assert!(fallback.body.contains("Competitive compensation"));
        assert_eq!(model.call_count(), 2);
    }

    #[test]
    fn test_template_uses_budget_preference() {
        let (_, body) = template_draft(
            &json!({"name": "Bo"}),
            "design",
            &inputs(json!({"budget": "$2,000"})),
            &Map::new(),
        );
        assert!(body.starts_with("Hi Bo,"));
        assert!(body.contains("We're offering $2,000"));
        assert!(body.contains("I'm Our Team from Our Company"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_draft_falls_back_to_template() {
        let model = Arc::new(SluggishModel::new(Duration::from_secs(60)));
        let tool = PrepareOutreachTool::new(model.clone())
            .with_draft_timeout(Duration::from_secs(5))
            .with_time_budget(Duration::from_secs(100));
        let started = Instant::now();
        let out = tool
            .execute(two_candidates(), &ToolContext::new("s"))
            .await
            .unwrap();

        let ToolOutput::Messages(messages) = out else { panic!("expected messages") };
        assert_eq!(messages.len(), 2);
        assert!(messages.values().all(|m| m.method == DraftMethod::Template));
        assert_eq!(messages["Bo"].subject, "Collaboration Opportunity - AI podcast guests");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spent_budget_skips_remaining_model_calls() {
        let model = Arc::new(SluggishModel::new(Duration::from_secs(60)));
        let tool = PrepareOutreachTool::new(model.clone())
            .with_draft_timeout(Duration::from_secs(30))
            .with_time_budget(Duration::from_secs(10));
        let out = tool
            .execute(two_candidates(), &ToolContext::new("s"))
            .await
            .unwrap();

        let ToolOutput::Messages(messages) = out else { panic!("expected messages") };
        assert!(messages.values().all(|m| m.method == DraftMethod::Template));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_candidates_rejected() {
        let tool = PrepareOutreachTool::new(Arc::new(ScriptedModel::new()));
        let err = tool
            .execute(inputs(json!({"candidates": [], "user_query": "x"})), &ToolContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(m) if m == "No candidates provided"));
    }
}
