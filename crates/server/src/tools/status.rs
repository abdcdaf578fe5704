//! layer_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use havn_client::{Registration, RegistrationStatus};

use super::json_result;

/// Output structure for layer_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerStatusOutput {
    /// Version currently intercepting requests.
    pub active: Option<String>,
    /// Installed version waiting for handoff.
    pub waiting: Option<String>,
    /// Open client sessions.
    pub sessions: usize,
    /// Generations present in the cache store, oldest first.
    pub generations: Vec<String>,
}

impl From<RegistrationStatus> for LayerStatusOutput {
    fn from(status: RegistrationStatus) -> Self {
        Self { active: status.active, waiting: status.waiting, sessions: status.sessions, generations: status.generations }
    }
}

/// Implementation of the layer_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let status = registration.status().await?;
    json_result(&LayerStatusOutput::from(status))
}
