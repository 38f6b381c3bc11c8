use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ToolContext;
use crate::output::ToolOutput;
use crate::tool::{Tool, ToolCategory, ToolDescriptor, ToolError};

pub const NO_CREDENTIALS: &str = "No credentials file found";

/// Hand the session's stored credentials to the model, for use as inputs to
/// the email and calendar tools.
pub struct FetchCredentialsTool;

#[async_trait]
impl Tool for FetchCredentialsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "fetch_credentials",
            "Fetch the OAuth credentials (access_token, refresh_token, client_id, \
             client_secret) stored for this session.",
            ToolCategory::Information,
        )
    }

    async fn execute(
        &self,
        _inputs: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        Ok(match &context.credentials {
            Some(credentials) => ToolOutput::Structured(credentials.clone()),
            None => ToolOutput::Text(NO_CREDENTIALS.to_string()),
        })
    }
}
