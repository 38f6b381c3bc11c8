//! Tools that talk to the human driving the session.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ToolContext;
use crate::output::ToolOutput;
use crate::tool::{required_str, ParamKind, ParamSpec, Tool, ToolCategory, ToolDescriptor, ToolError};

pub const DISPLAY_TO_USER: &str = "display_to_user";
pub const ASK_HUMAN: &str = "display_to_user_and_wait_for_input";
pub const DEFAULT_INPUT_PROMPT: &str = "Please provide your response:";

/// Show a message without pausing the session.
pub struct DisplayToUserTool;

#[async_trait]
impl Tool for DisplayToUserTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            DISPLAY_TO_USER,
            "Display a progress message or result to the user. Does not wait for a reply.",
            ToolCategory::Interaction,
        )
        .param(ParamSpec::required("message", ParamKind::String, "Message to display"))
    }

    async fn execute(
        &self,
        inputs: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let message = required_str(&inputs, "message")?;
        Ok(ToolOutput::Notice(message.to_string()))
    }
}

/// Show a message and suspend the session until the user replies.
pub struct AskHumanTool;

#[async_trait]
impl Tool for AskHumanTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            ASK_HUMAN,
            "Display a message to the user and wait for their reply. Use when information \
             only the user can provide is needed (budget, preferences, approvals).",
            ToolCategory::Interaction,
        )
        .param(ParamSpec::required("message", ParamKind::String, "Message to display"))
        .param(
            ParamSpec::optional("prompt", ParamKind::String, "Input prompt shown after the message")
                .with_default(Value::String(DEFAULT_INPUT_PROMPT.into())),
        )
    }

    async fn execute(
        &self,
        inputs: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let message = required_str(&inputs, "message")?;
        let prompt = inputs
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_INPUT_PROMPT);
        Ok(ToolOutput::AwaitInput {
            prompt: format!("{message}\n\n{prompt}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_display_to_user() {
        let out = DisplayToUserTool
            .execute(inputs(json!({"message": "Found 4 channels"})), &ToolContext::new("s"))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Notice("Found 4 channels".into()));
    }

    #[tokio::test]
    async fn test_ask_human_default_prompt() {
        let out = AskHumanTool
            .execute(inputs(json!({"message": "Budget?"})), &ToolContext::new("s"))
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::AwaitInput {
                prompt: "Budget?\n\nPlease provide your response:".into()
            }
        );
    }

    #[tokio::test]
    async fn test_ask_human_custom_prompt() {
        let out = AskHumanTool
            .execute(
                inputs(json!({"message": "Pick one", "prompt": "Enter a number:"})),
                &ToolContext::new("s"),
            )
            .await
            .unwrap();
        assert_eq!(
            out,
            ToolOutput::AwaitInput {
                prompt: "Pick one\n\nEnter a number:".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_message() {
        let err = AskHumanTool
            .execute(Map::new(), &ToolContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
