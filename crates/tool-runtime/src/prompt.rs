//! Prompt assembly: instructions, tool catalog and the full conversation.

use crate::registry::ToolRegistry;
use crate::state::{Turn, TurnContent, TurnRole};

pub const DEFAULT_INSTRUCTIONS: &str = "\
You are an outreach assistant. You find candidates for the user's goal, score \
them, draft personalized messages and coordinate meetings using the tools \
listed below.

Respond with exactly one JSON object and nothing else:
{\"thought\": \"<short reasoning>\", \"function_calls\": {\"name\": \"<tool name>\", \"inputs\": {...}}}

Call at most one tool per response. When the goal is complete, or you cannot \
make progress, respond with an empty \"function_calls\" object. Use \
display_to_user_and_wait_for_input whenever you need information only the user \
can provide.";

/// Render a single turn as a transcript line.
pub fn render_turn(turn: &Turn) -> String {
    let role = match turn.role {
        TurnRole::System => "system",
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    };
    let body = match &turn.content {
        TurnContent::Text(text) => text.clone(),
        TurnContent::Decision(object) => object.to_string(),
        TurnContent::ToolFeedback(fb) => {
            let inputs = serde_json::Value::Object(fb.inputs.clone());
            if fb.is_error {
                format!(
                    "Function {} with inputs {} failed: {}",
                    fb.tool, inputs, fb.result
                )
            } else {
                format!(
                    "Executed function: {} with inputs {} and received result: {}",
                    fb.tool, inputs, fb.result
                )
            }
        }
    };
    format!("{role}: {body}")
}

/// Build the single prompt string sent to the model for one iteration.
pub fn render(instructions: &str, registry: &ToolRegistry, history: &[Turn]) -> String {
    let mut prompt = String::with_capacity(instructions.len() + 256 * history.len());
    prompt.push_str(instructions);
    prompt.push_str("\n\n# Available tools\n");
    prompt.push_str(&registry.render_catalog());
    prompt.push_str("\n# Conversation so far\n");
    for turn in history {
        prompt.push_str(&render_turn(turn));
        prompt.push('\n');
    }
    prompt.push_str("\nRespond with the next JSON decision.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ToolFeedback;
    use crate::testing::EchoTool;
    use crate::tool::{ToolCategory, ToolDescriptor};
    use serde_json::{json, Map};

    #[test]
    fn test_render_includes_catalog_and_history() {
        let mut registry = ToolRegistry::new();
        registry
            .register(EchoTool::new(ToolDescriptor::new(
                "google_search",
                "Web search",
                ToolCategory::Information,
            )))
            .unwrap();
        let history = vec![
            Turn::user_text("find ai podcasts"),
            Turn::assistant_decision(json!({"thought": "search"})),
            Turn::feedback(ToolFeedback {
                tool: "google_search".into(),
                inputs: Map::new(),
                result: json!(["r1"]),
                is_error: false,
            }),
        ];
        let prompt = render(DEFAULT_INSTRUCTIONS, &registry, &history);
        assert!(prompt.starts_with("You are an outreach assistant."));
        assert!(prompt.contains("- google_search: Web search"));
        assert!(prompt.contains("user: find ai podcasts"));
        assert!(prompt.contains("assistant: {\"thought\":\"search\"}"));
        assert!(prompt.contains(
            "user: Executed function: google_search with inputs {} and received result: [\"r1\"]"
        ));
    }

    #[test]
    fn test_render_error_feedback() {
        let turn = Turn::feedback(ToolFeedback {
            tool: "frobnicate".into(),
            inputs: Map::new(),
            result: json!("Unknown function: frobnicate"),
            is_error: true,
        });
        assert_eq!(
            render_turn(&turn),
            "user: Function frobnicate with inputs {} failed: \"Unknown function: frobnicate\""
        );
    }
}
