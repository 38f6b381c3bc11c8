use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::{send_json, split_system, text_at, LlmError, LlmProvider, Message, Role};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    json_output: bool,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            json_output: false,
        }
    }

    /// Ask the API to constrain output to JSON (`responseMimeType`).
    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }

    fn endpoint(&self) -> String {
        format!("{BASE_URL}/models/{}:generateContent", self.model)
    }

    /// Build the request body for the Gemini generateContent API.
    fn build_request_body(
        messages: &[Message],
        temperature: f32,
        max_tokens: u32,
        json_output: bool,
    ) -> Value {
        let (system, rest) = split_system(messages);

        let contents: Vec<Value> = rest
            .iter()
            .map(|m| {
                // Gemini calls the assistant side "model"
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut generation = json!({
            "temperature": temperature,
            "maxOutputTokens": max_tokens,
        });
        if json_output {
            generation["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if let Some(system) = system {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = Self::build_request_body(&messages, temperature, max_tokens, self.json_output);
        debug!(model = %self.model, "Gemini request");

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        let resp = send_json(request, &body).await?;
        text_at(&resp, "/candidates/0/content/parts/0/text")
    }

    fn model(&self) -> &str {
        &self.model
    }
}
