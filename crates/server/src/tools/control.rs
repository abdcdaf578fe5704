//! layer_control tool implementation.
//!
//! Delivers a control message to the layer. Only `take-over-now` exists.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use havn_client::{ControlSignal, Registration};

use super::json_result;

/// Input parameters for layer_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerControlParams {
    /// Control message, e.g. "take-over-now".
    pub signal: String,
}

/// Output structure for layer_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerControlOutput {
    /// Version that took over, or null when no version was waiting.
    pub activated: Option<String>,
}

/// Implementation of the layer_control tool.
pub async fn control_impl(registration: &Registration, params: LayerControlParams) -> Result<CallToolResult, McpError> {
    let signal: ControlSignal = params.signal.parse()?;
    let activated = registration.post_message(signal).await?;

    json_result(&LayerControlOutput { activated })
}
