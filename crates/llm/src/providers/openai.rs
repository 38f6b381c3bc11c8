use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{send_json, text_at, LlmError, LlmProvider, Message};

/// OpenAI chat completions, or any compatible server via `base_url`.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, messages: &[Message], temperature: f32, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&messages, temperature, max_tokens);
        debug!(model = %self.model, %url, "OpenAI request");

        let request = self.client.post(&url).bearer_auth(&self.api_key);
        let resp = send_json(request, &body).await?;
        text_at(&resp, "/choices/0/message/content")
    }

    fn model(&self) -> &str {
        &self.model
    }
}
