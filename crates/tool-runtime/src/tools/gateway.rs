//! External capabilities served by an HTTP tool gateway.
//!
//! Each tool POSTs its validated inputs as JSON to `{gateway_url}/{tool_name}`
//! and converts the response into the output variant it declares. A response
//! of the wrong shape is an error, never silently dropped.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::output::{SentReceipt, ToolOutput};
use crate::tool::{ParamKind, ParamSpec, Tool, ToolCategory, ToolDescriptor, ToolError};

/// Output variant a gateway tool promises to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// JSON array of records.
    Records,
    /// Any JSON object or array.
    Structured,
    /// JSON string.
    Text,
    /// Send confirmation; `status == "sent"` with a `thread_id` becomes a receipt.
    Receipt,
    /// Meeting confirmation object.
    Meeting,
}

impl OutputShape {
    pub fn convert(self, value: Value) -> Result<ToolOutput, ToolError> {
        if let Some(err) = value.get("error") {
            let message = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(ToolError::ExecutionFailed(message));
        }
        match (self, value) {
            (OutputShape::Records, Value::Array(records)) => Ok(ToolOutput::Records(records)),
            (OutputShape::Structured, v @ (Value::Object(_) | Value::Array(_))) => {
                Ok(ToolOutput::Structured(v))
            }
            (OutputShape::Text, Value::String(s)) => Ok(ToolOutput::Text(s)),
            (OutputShape::Receipt, Value::Object(obj)) => {
                let sent = obj.get("status").and_then(Value::as_str) == Some("sent");
                let thread_id = obj.get("thread_id").and_then(Value::as_str).map(str::to_string);
                match thread_id {
                    Some(thread_id) if sent => Ok(ToolOutput::Sent(SentReceipt {
                        thread_id,
                        detail: Value::Object(obj),
                    })),
                    _ => Ok(ToolOutput::Structured(Value::Object(obj))),
                }
            }
            (OutputShape::Meeting, v @ Value::Object(_)) => Ok(ToolOutput::Scheduled(v)),
            (shape, other) => Err(ToolError::UnexpectedShape {
                expected: shape.expected(),
                found: kind_of(&other).to_string(),
            }),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            OutputShape::Records => "array",
            OutputShape::Structured => "object or array",
            OutputShape::Text => "string",
            OutputShape::Receipt | OutputShape::Meeting => "object",
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A tool whose implementation lives behind the gateway.
pub struct GatewayTool {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    descriptor: ToolDescriptor,
    shape: OutputShape,
}

impl GatewayTool {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: Option<String>,
        descriptor: ToolDescriptor,
        shape: OutputShape,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            descriptor,
            shape,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, self.descriptor.name)
    }
}

#[async_trait]
impl Tool for GatewayTool {
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn execute(
        &self,
        inputs: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let url = self.endpoint();
        debug!(session_id = %context.session_id, %url, "Gateway request");

        let mut request = self
            .client
            .post(&url)
            .header("X-Session-Id", context.session_id.as_str())
            .json(&Value::Object(inputs));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("gateway request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed(format!(
                "gateway returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("gateway response not JSON: {e}")))?;

        self.shape.convert(value)
    }
}

fn oauth_params(desc: ToolDescriptor) -> ToolDescriptor {
    desc.param(ParamSpec::optional("refresh_token", ParamKind::String, "OAuth refresh token"))
        .param(ParamSpec::optional("client_id", ParamKind::String, "OAuth client id"))
        .param(ParamSpec::optional("client_secret", ParamKind::String, "OAuth client secret"))
}

/// Descriptors and output shapes of every gateway-backed tool.
pub fn external_catalog() -> Vec<(ToolDescriptor, OutputShape)> {
    vec![
        (
            ToolDescriptor::new(
                "google_search",
                "Search the web and return result records (title, link, snippet).",
                ToolCategory::Information,
            )
            .param(ParamSpec::required("query", ParamKind::String, "Search query"))
            .param(
                ParamSpec::optional("num_results", ParamKind::Integer, "Number of results")
                    .with_default(json!(5)),
            ),
            OutputShape::Records,
        ),
        (
            ToolDescriptor::new(
                "search_for_channels",
                "Search for video channels matching a query; returns channel records.",
                ToolCategory::Information,
            )
            .param(ParamSpec::required("query", ParamKind::String, "Search query"))
            .param(
                ParamSpec::optional("max_channels", ParamKind::Integer, "Maximum channels")
                    .with_default(json!(10)),
            ),
            OutputShape::Records,
        ),
        (
            ToolDescriptor::new(
                "scrapeWebsiteWithPrompt",
                "Scrape a web page and extract the information described by the prompt.",
                ToolCategory::Information,
            )
            .param(ParamSpec::required("url", ParamKind::String, "Page URL"))
            .param(ParamSpec::required("prompt", ParamKind::String, "What to extract")),
            OutputShape::Structured,
        ),
        (
            ToolDescriptor::new(
                "scrapeYoutubeAboutPage",
                "Scrape a channel's about page for contact details and description.",
                ToolCategory::Information,
            )
            .param(ParamSpec::required("url", ParamKind::String, "Channel URL")),
            OutputShape::Structured,
        ),
        (
            oauth_params(
                ToolDescriptor::new(
                    "send_email_with_token",
                    "Send an email with the user's OAuth token. Returns the thread id of the sent message.",
                    ToolCategory::Effectful,
                )
                .param(ParamSpec::required("access_token", ParamKind::String, "OAuth access token"))
                .param(ParamSpec::required("to_email", ParamKind::String, "Recipient address"))
                .param(ParamSpec::required("subject", ParamKind::String, "Subject line"))
                .param(ParamSpec::required("body_text", ParamKind::String, "Plain-text body")),
            ),
            OutputShape::Receipt,
        ),
        (
            oauth_params(
                ToolDescriptor::new(
                    "create_google_meet_meeting",
                    "Create a calendar event with a video meeting link and invite attendees.",
                    ToolCategory::Effectful,
                )
                .param(ParamSpec::required("access_token", ParamKind::String, "OAuth access token"))
                .param(ParamSpec::required("title", ParamKind::String, "Meeting title"))
                .param(ParamSpec::required("start_time", ParamKind::String, "ISO 8601 start time"))
                .param(
                    ParamSpec::optional("duration_minutes", ParamKind::Integer, "Duration")
                        .with_default(json!(60)),
                )
                .param(
                    ParamSpec::optional("description", ParamKind::String, "Event description")
                        .with_default(json!("")),
                )
                .param(ParamSpec::optional("attendees", ParamKind::Array, "Attendee emails"))
                .param(
                    ParamSpec::optional("timezone", ParamKind::String, "IANA timezone")
                        .with_default(json!("UTC")),
                ),
            ),
            OutputShape::Meeting,
        ),
        (
            ToolDescriptor::new(
                "make_crypto_actions",
                "Perform a wallet action (balance check, transfer) described in natural language.",
                ToolCategory::Effectful,
            )
            .param(ParamSpec::required("prompt", ParamKind::String, "Action to perform")),
            OutputShape::Text,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_shape() {
        let out = OutputShape::Records.convert(json!([{"title": "a"}])).unwrap();
        assert_eq!(out, ToolOutput::Records(vec![json!({"title": "a"})]));
    }

    #[test]
    fn test_records_shape_rejects_object() {
        let err = OutputShape::Records.convert(json!({"items": []})).unwrap_err();
        match err {
            ToolError::UnexpectedShape { expected, found } => {
                assert_eq!(expected, "array");
                assert_eq!(found, "object");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_receipt_shape() {
        let sent = OutputShape::Receipt
            .convert(json!({"status": "sent", "thread_id": "t-7", "message_id": "m"}))
            .unwrap();
        match sent {
            ToolOutput::Sent(receipt) => {
                assert_eq!(receipt.thread_id, "t-7");
                assert_eq!(receipt.detail["message_id"], "m");
            }
            other => panic!("unexpected {other:?}"),
        }

        let queued = OutputShape::Receipt.convert(json!({"status": "queued"})).unwrap();
        assert!(matches!(queued, ToolOutput::Structured(_)));
    }

    #[test]
    fn test_error_payload_is_failure() {
        let err = OutputShape::Meeting
            .convert(json!({"error": "invalid_grant"}))
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(m) if m == "invalid_grant"));
    }

    #[test]
    fn test_text_and_meeting_shapes() {
        assert_eq!(
            OutputShape::Text.convert(json!("done")).unwrap(),
            ToolOutput::Text("done".into())
        );
        assert!(OutputShape::Text.convert(json!({"a": 1})).is_err());
        assert!(matches!(
            OutputShape::Meeting.convert(json!({"meet_link": "x"})).unwrap(),
            ToolOutput::Scheduled(_)
        ));
        assert!(OutputShape::Structured.convert(Value::Null).is_err());
    }

    #[test]
    fn test_external_catalog_names_unique() {
        let catalog = external_catalog();
        let mut names: Vec<&str> = catalog.iter().map(|(d, _)| d.name.as_str()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 7);
    }

    #[test]
    fn test_endpoint() {
        let tool = GatewayTool::new(
            reqwest::Client::new(),
            "http://gateway.local/tools/",
            None,
            external_catalog().remove(0).0,
            OutputShape::Records,
        );
        assert_eq!(tool.endpoint(), "http://gateway.local/tools/google_search");
    }
}
