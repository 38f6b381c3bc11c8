use async_trait::async_trait;

/// Text-in/text-out model used by the agent loop and model-backed tools.
///
/// Defined here, by the consumer. Concrete providers live in the llm crate
/// and are adapted to this trait there.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Model not configured: {0}")]
    NotConfigured(String),
    #[error("Model call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Scripted model for exercising the loop without network calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Response returned once the script runs out: a decision with no action.
    pub const DONE_RESPONSE: &str = r#"{"thought":"done","function_calls":{}}"#;

    enum Scripted {
        Text(String),
        Fail(String),
    }

    /// Returns queued responses in order and records every prompt it sees.
    #[derive(Default)]
    pub struct ScriptedModel {
        responses: Mutex<VecDeque<Scripted>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Build a model that answers with each response in turn.
        pub fn with_responses<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let model = Self::new();
            for r in responses {
                model.queue_text(r);
            }
            model
        }

        pub fn queue_text(&self, text: impl Into<String>) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Scripted::Text(text.into()));
        }

        /// Queue a network failure.
        pub fn queue_failure(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Scripted::Fail(message.to_string()));
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.responses.lock().unwrap().pop_front() {
                Some(Scripted::Text(text)) => Ok(text),
                Some(Scripted::Fail(message)) => Err(ModelError::Network(message)),
                None => Ok(DONE_RESPONSE.to_string()),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
