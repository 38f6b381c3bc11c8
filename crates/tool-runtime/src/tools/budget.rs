use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::output::ToolOutput;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolCategory, ToolDescriptor, ToolError};

/// Set the remaining outreach budget.
pub struct UpdateBudgetTool;

#[async_trait]
impl Tool for UpdateBudgetTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "update_available_budget",
            "Update the remaining budget available for outreach.",
            ToolCategory::Effectful,
        )
        .param(ParamSpec::required("new_budget", ParamKind::Number, "New budget amount"))
    }

    async fn execute(
        &self,
        inputs: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let amount = inputs
            .get("new_budget")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::InvalidInput("missing 'new_budget' field".into()))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ToolError::InvalidInput(format!(
                "budget must be a non-negative number, got {amount}"
            )));
        }
        debug!(session_id = %context.session_id, amount, "Updating budget");
        Ok(ToolOutput::Budget(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_budget() {
        let inputs = json!({"new_budget": 1200.5}).as_object().cloned().unwrap();
        let out = UpdateBudgetTool
            .execute(inputs, &ToolContext::new("s"))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Budget(1200.5));
    }

    #[tokio::test]
    async fn test_negative_budget_rejected() {
        let inputs = json!({"new_budget": -5}).as_object().cloned().unwrap();
        let err = UpdateBudgetTool
            .execute(inputs, &ToolContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
