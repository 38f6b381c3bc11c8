use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{send_json, text_at, LlmError, LlmProvider, Message};

/// Local models served by Ollama's chat endpoint.
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn build_request_body(&self, messages: &[Message], temperature: f32, max_tokens: u32) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.url);
        let body = self.build_request_body(&messages, temperature, max_tokens);
        debug!(model = %self.model, %url, "Ollama request");

        let resp = send_json(self.client.post(&url), &body).await?;
        text_at(&resp, "/message/content")
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let provider = OllamaProvider::new("http://localhost:11434/".into(), "llama3.2".into());
        let body = provider.build_request_body(&[Message::user("hi")], 0.3, 1000);
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["options"]["num_predict"], 1000);
        assert_eq!(provider.url, "http://localhost:11434");
    }
}
