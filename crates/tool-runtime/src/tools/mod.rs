//! Built-in tool implementations for the outreach agent.
//!
//! Tools are divided into two groups:
//! - **Internal tools** (`human`, `budget`, `credentials`, `scoring`, `outreach`):
//!   implemented here, with the model-backed ones sharing the loop's model
//! - **Gateway tools** (`gateway`): search, scraping, email, calendar and wallet
//!   actions forwarded to an external HTTP gateway

pub mod budget;
pub mod credentials;
pub mod gateway;
pub mod human;
pub mod outreach;
pub mod scoring;

pub use budget::UpdateBudgetTool;
pub use credentials::FetchCredentialsTool;
pub use gateway::{external_catalog, GatewayTool, OutputShape};
pub use human::{AskHumanTool, DisplayToUserTool};
pub use outreach::PrepareOutreachTool;
pub use scoring::ScoreCandidatesTool;

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::provider::CompletionModel;
use crate::registry::{RegistryError, ToolRegistry};
use outreach_core::config::{AgentConfig, ToolGatewayConfig};

/// Register the tools that need no external service.
pub fn register_internal(
    registry: &mut ToolRegistry,
    model: Arc<dyn CompletionModel>,
    agent: &AgentConfig,
) -> Result<(), RegistryError> {
    registry.register(DisplayToUserTool)?;
    registry.register(AskHumanTool)?;
    registry.register(UpdateBudgetTool)?;
    registry.register(FetchCredentialsTool)?;
    registry.register(ScoreCandidatesTool::new(model.clone()).with_max_scored(agent.max_scored))?;
    registry.register(
        PrepareOutreachTool::new(model)
            .with_draft_timeout(Duration::from_secs(agent.draft_timeout_secs))
            .with_time_budget(Duration::from_secs(agent.call_timeout_secs) * 3 / 4),
    )?;
    Ok(())
}

/// Register gateway-backed tools. Does nothing when no gateway is configured.
pub fn register_gateway(
    registry: &mut ToolRegistry,
    gateway: &ToolGatewayConfig,
) -> Result<usize, RegistryError> {
    let Some(base_url) = gateway.gateway_url.as_deref() else {
        warn!("TOOL_GATEWAY_URL not set; search, scraping, email and calendar tools are disabled");
        return Ok(0);
    };
    let client = reqwest::Client::new();
    let mut count = 0;
    for (descriptor, shape) in external_catalog() {
        registry.register(GatewayTool::new(
            client.clone(),
            base_url,
            gateway.gateway_token.clone(),
            descriptor,
            shape,
        ))?;
        count += 1;
    }
    info!(count, gateway = base_url, "Registered gateway tools");
    Ok(count)
}

/// The full outreach catalog: internal tools followed by gateway tools.
pub fn outreach_registry(
    model: Arc<dyn CompletionModel>,
    agent: &AgentConfig,
    gateway: &ToolGatewayConfig,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    register_internal(&mut registry, model, agent)?;
    register_gateway(&mut registry, gateway)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::ScriptedModel;

    #[test]
    fn test_internal_only_without_gateway() {
        let gateway = ToolGatewayConfig { gateway_url: None, gateway_token: None };
        let registry = outreach_registry(
            Arc::new(ScriptedModel::new()),
            &AgentConfig::default(),
            &gateway,
        )
        .unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "display_to_user",
                "display_to_user_and_wait_for_input",
                "update_available_budget",
                "fetch_credentials",
                "score_candidates",
                "prepare_outreach",
            ]
        );
    }

    #[test]
    fn test_full_catalog_with_gateway() {
        let gateway = ToolGatewayConfig {
            gateway_url: Some("http://localhost:9000".into()),
            gateway_token: Some("secret".into()),
        };
        let registry = outreach_registry(
            Arc::new(ScriptedModel::new()),
            &AgentConfig::default(),
            &gateway,
        )
        .unwrap();
        assert_eq!(registry.len(), 13);
        assert!(registry.resolve("send_email_with_token").is_ok());
        assert!(registry.resolve("create_google_meet_meeting").is_ok());
    }
}
