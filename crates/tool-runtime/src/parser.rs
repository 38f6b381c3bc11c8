//! Extraction of a model decision from raw completion text.

use serde_json::{Map, Value};

/// One model turn: a rationale plus at most one requested action.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub thought: String,
    pub action: Option<ActionRequest>,
    /// The decoded object exactly as the model produced it.
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub inputs: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseFailure {
    #[error("no JSON object found in model output")]
    NoObject,
    #[error("malformed JSON in model output: {0}")]
    Malformed(String),
    #[error("model output is not a JSON object")]
    NotAnObject,
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

/// Turns raw completion text into a [`Decision`].
///
/// Kept behind a trait so a structured-output mode can replace the
/// span-based extraction without touching the loop.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Decision, ParseFailure>;
}

/// Parses the substring between the first `{` and the last `}`.
///
/// The action is read from `function_calls` (or `action`); an absent, null
/// or empty object, or one without a name, means "no action".
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSpanParser;

impl ResponseParser for JsonSpanParser {
    fn parse(&self, raw: &str) -> Result<Decision, ParseFailure> {
        let span = extract_json_object(raw).ok_or(ParseFailure::NoObject)?;
        let object: Value =
            serde_json::from_str(span).map_err(|e| ParseFailure::Malformed(e.to_string()))?;
        let fields = object.as_object().ok_or(ParseFailure::NotAnObject)?;

        let thought = match fields.get("thought") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let action_value = fields.get("function_calls").or_else(|| fields.get("action"));
        let action = match action_value {
            None | Some(Value::Null) => None,
            Some(Value::Object(call)) => parse_action(call)?,
            Some(other) => {
                return Err(ParseFailure::InvalidAction(format!(
                    "expected object, got {other}"
                )))
            }
        };

        Ok(Decision {
            thought,
            action,
            object,
        })
    }
}

fn parse_action(call: &Map<String, Value>) -> Result<Option<ActionRequest>, ParseFailure> {
    let name = match call.get("name") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(ParseFailure::InvalidAction(format!(
                "name must be a string, got {other}"
            )))
        }
    };
    let inputs = match call.get("inputs").or_else(|| call.get("arguments")) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(m)) => m.clone(),
        Some(other) => {
            return Err(ParseFailure::InvalidAction(format!(
                "inputs for {name} must be an object, got {other}"
            )))
        }
    };
    Ok(Some(ActionRequest { name, inputs }))
}

/// Slice from the first `{` to the last `}` of `raw`, if both exist in order.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
