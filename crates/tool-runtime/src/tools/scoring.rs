//! Candidate scoring: model-ranked, with a keyword/audience fallback.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::ToolContext;
use crate::output::{Score, ScoredBatch, ScoredCandidate, ScoringMethod, ToolOutput};
use crate::parser::extract_json_object;
use crate::provider::CompletionModel;
use crate::tool::{required_str, ParamKind, ParamSpec, Tool, ToolCategory, ToolDescriptor, ToolError};

pub const BASIC_SUMMARY: &str = "Basic scoring applied due to LLM unavailability";

pub struct ScoreCandidatesTool {
    model: Arc<dyn CompletionModel>,
    max_scored: usize,
}

impl ScoreCandidatesTool {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            max_scored: 10,
        }
    }

    /// Cap used when the preferences carry no `max_candidates`.
    pub fn with_max_scored(mut self, max: usize) -> Self {
        self.max_scored = max;
        self
    }

    async fn score_with_model(
        &self,
        candidates: &[Value],
        query: &str,
        preferences: &Map<String, Value>,
    ) -> Option<ScoredBatch> {
        let prompt = scoring_prompt(candidates, query, preferences);
        let raw = match self.model.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Scoring model call failed, using basic scoring");
                return None;
            }
        };
        let reply: ScoringReply = match extract_json_object(&raw).map(serde_json::from_str) {
            Some(Ok(reply)) => reply,
            _ => {
                warn!("Scoring reply not decodable, using basic scoring");
                return None;
            }
        };

        let scored: Vec<ScoredCandidate> = reply
            .scored_candidates
            .into_iter()
            .filter_map(|s| {
                let index = usize::try_from(s.candidate_index).ok()?;
                let candidate = candidates.get(index)?;
                Some(ScoredCandidate {
                    candidate: candidate.clone(),
                    score: Score::clamped(s.score),
                    strengths: s.strengths,
                    concerns: s.concerns,
                    reasoning: s.reasoning,
                })
            })
            .collect();
        if scored.is_empty() {
            warn!("Scoring reply referenced no valid candidate, using basic scoring");
            return None;
        }

        Some(ScoredBatch {
            candidates: scored,
            ranking_summary: reply.ranking_summary.unwrap_or_default(),
            method: ScoringMethod::Llm,
        })
    }
}

#[derive(Deserialize)]
struct ScoringReply {
    scored_candidates: Vec<ReplyEntry>,
    #[serde(default)]
    ranking_summary: Option<String>,
}

#[derive(Deserialize)]
struct ReplyEntry {
    candidate_index: i64,
    score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

fn scoring_prompt(candidates: &[Value], query: &str, preferences: &Map<String, Value>) -> String {
    let candidates_json = serde_json::to_string_pretty(candidates).unwrap_or_default();
    let prefs_json = serde_json::to_string_pretty(preferences).unwrap_or_default();
    format!(
        "You are an expert talent evaluator. Score the candidates below against the user's requirements.\n\n\
         USER QUERY: {query}\n\n\
         USER PREFERENCES:\n{prefs_json}\n\n\
         CANDIDATES TO SCORE:\n{candidates_json}\n\n\
         For each candidate give a relevance score from 0 to 100, key strengths, concerns and a brief \
         reasoning. Weigh relevance to the query, expertise, audience size, location and budget fit.\n\n\
         Return only JSON of the form:\n\
         {{\"scored_candidates\": [{{\"candidate_index\": 0, \"score\": 85, \"strengths\": [\"...\"], \
         \"concerns\": [\"...\"], \"reasoning\": \"...\"}}], \"ranking_summary\": \"...\"}}"
    )
}

/// Keyword and audience-size heuristic used when the model cannot score.
pub fn basic_score(candidate: &Value, query: &str) -> Score {
    let field = |key: &str| {
        candidate
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase()
    };
    let name = field("name");
    let description = field("description");

    let mut score: u32 = 50;
    for word in query.to_lowercase().split_whitespace() {
        if name.contains(word) || description.contains(word) {
            score += 10;
        }
    }

    let subscribers = candidate
        .get("subscribers")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    score += if subscribers > 100_000.0 {
        20
    } else if subscribers > 10_000.0 {
        15
    } else if subscribers > 1_000.0 {
        10
    } else {
        0
    };

    Score::clamped(score as f64)
}

pub fn basic_batch(candidates: &[Value], query: &str) -> ScoredBatch {
    ScoredBatch {
        candidates: candidates
            .iter()
            .map(|c| ScoredCandidate {
                candidate: c.clone(),
                score: basic_score(c, query),
                strengths: vec!["Basic scoring applied".into()],
                concerns: vec!["Limited analysis available".into()],
                reasoning: "Basic scoring based on keyword matching and audience size".into(),
            })
            .collect(),
        ranking_summary: BASIC_SUMMARY.into(),
        method: ScoringMethod::Basic,
    }
}

/// Sort best-first (stable for ties) and keep at most `limit` (0 keeps all).
fn rank(batch: &mut ScoredBatch, limit: usize) {
    batch.candidates.sort_by(|a, b| b.score.cmp(&a.score));
    if limit > 0 {
        batch.candidates.truncate(limit);
    }
}

#[async_trait]
impl Tool for ScoreCandidatesTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "score_candidates",
            "Score and rank candidates (0-100) against the user's query and preferences. \
             Replaces any previous scoring.",
            ToolCategory::Information,
        )
        .param(ParamSpec::required("candidates", ParamKind::Array, "Candidate records to score"))
        .param(ParamSpec::required("user_query", ParamKind::String, "What the user is looking for"))
        .param(ParamSpec::optional(
            "user_preferences",
            ParamKind::Object,
            "Preferences such as budget, location, max_candidates",
        ))
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
        let query = required_str(&inputs, "user_query")?;
        let preferences = inputs
            .get("user_preferences")
            .and_then(Value::as_object)
            .unwrap_or(&context.user_preferences);

        if candidates.is_empty() {
            return Ok(ToolOutput::Scored(ScoredBatch {
                candidates: Vec::new(),
                ranking_summary: "No candidates to score".into(),
                method: ScoringMethod::Basic,
            }));
        }

        let limit = preferences
            .get("max_candidates")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.max_scored);

        debug!(session_id = %context.session_id, count = candidates.len(), "Scoring candidates");
        let mut batch = match self.score_with_model(candidates, query, preferences).await {
            Some(batch) => batch,
            None => basic_batch(candidates, query),
        };
        rank(&mut batch, limit);
        info!(
            session_id = %context.session_id,
            scored = batch.candidates.len(),
            method = ?batch.method,
            "Scored candidates"
        );
        Ok(ToolOutput::Scored(batch))
    }
}
