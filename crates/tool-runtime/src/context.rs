//! Per-dispatch session context handed to tools.

use serde_json::{Map, Value};

/// Read-only view of the session a tool is running for.
///
/// Built fresh by the loop for each dispatch; tools never see the mutable
/// state record itself.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: String,
    pub raw_goal: Option<String>,
    pub user_preferences: Map<String, Value>,
    pub sender_info: Map<String, Value>,
    /// Credential snapshot for this session, if a source is configured.
    pub credentials: Option<Value>,
}

impl ToolContext {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_goal(mut self, goal: Option<&str>) -> Self {
        self.raw_goal = goal.map(str::to_string);
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

    pub fn with_credentials(mut self, credentials: Option<Value>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Lookup of per-session credentials.
///
/// Shared across sessions and only ever read during an invocation.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self, session_id: &str) -> Option<Value>;
}

/// Source that never has credentials.
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn credentials(&self, _session_id: &str) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_builder() {
        let mut prefs = Map::new();
        prefs.insert("max_candidates".into(), json!(3));
        let ctx = ToolContext::new("s-1")
            .with_goal(Some("find guests"))
            .with_preferences(prefs)
            .with_credentials(Some(json!({"token": "abc"})));
        assert_eq!(ctx.session_id, "s-1");
        assert_eq!(ctx.raw_goal.as_deref(), Some("find guests"));
        assert_eq!(ctx.user_preferences["max_candidates"], 3);
        assert!(ctx.sender_info.is_empty());
        assert_eq!(ctx.credentials.unwrap()["token"], "abc");
    }

    #[test]
    fn test_no_credentials() {
        assert!(NoCredentials.credentials("anything").is_none());
    }
}
