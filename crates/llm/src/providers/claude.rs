use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{send_json, split_system, text_at, LlmError, LlmProvider, Message};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    fn build_request_body(&self, messages: &[Message], temperature: f32, max_tokens: u32) -> Value {
        // System prompt goes in its own field
        let (system, rest) = split_system(messages);
        let mut body = json!({
            "model": self.model,
            "messages": rest,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = self.build_request_body(&messages, temperature, max_tokens);
        debug!(model = %self.model, "Anthropic request");

        let request = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);
        let resp = send_json(request, &body).await?;
        text_at(&resp, "/content/0/text")
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_moves_to_top_level() {
        let provider = ClaudeProvider::new("k".into(), "claude-sonnet".into());
        let body = provider.build_request_body(
            &[Message::system("be brief"), Message::user("hello")],
            0.0,
            256,
        );
        assert_eq!(body["system"], "be brief");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }
}
