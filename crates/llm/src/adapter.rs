use async_trait::async_trait;
use tracing::debug;

use outreach_tool_runtime::{CompletionModel, ModelError};

use crate::provider::{LlmError, LlmProvider, Message};

/// Exposes a chat provider as the single-prompt model the agent consumes.
///
/// The rendered prompt goes in as one user message, optionally preceded by
/// a fixed system message.
pub struct LlmCompletionAdapter {
    provider: Box<dyn LlmProvider>,
    system: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmCompletionAdapter {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self {
            provider,
            system: None,
            temperature: 0.2,
            max_tokens: 8192,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn messages(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));
        messages
    }
}

impl From<LlmError> for ModelError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ApiError { status, body } => ModelError::Api { status, message: body },
            LlmError::HttpError(e) => ModelError::Network(e.to_string()),
            LlmError::ParseError(msg) => ModelError::InvalidResponse(msg),
            LlmError::NotConfigured(msg) => ModelError::NotConfigured(msg),
        }
    }
}

#[async_trait]
impl CompletionModel for LlmCompletionAdapter {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(model = self.provider.model(), prompt_len = prompt.len(), "completion");
        let text = self
            .provider
            .complete(self.messages(prompt), self.temperature, self.max_tokens)
            .await?;
        Ok(text)
    }

    fn model_name(&self) -> &str {
        self.provider.model()
    }
}
