//! layer_install tool implementation.
//!
//! Installs a new version of the layer. It takes over at once when no
//! session holds the current version, otherwise it waits.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use havn_client::{LayerContext, LifecycleController, Manifest, Registration};
use havn_core::{AppConfig, Error};

use super::json_result;

/// Input parameters for layer_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerInstallParams {
    /// Version tag; names the `static-<version>` and `dynamic-<version>` generations.
    pub version: String,

    /// Resources to pre-populate. Defaults to the configured manifest.
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

/// Output structure for layer_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerInstallOutput {
    pub version: String,
    /// "active" if the version took over, "installed" if it is waiting.
    pub state: String,
}

/// Implementation of the layer_install tool.
pub async fn install_impl(
    registration: &Registration, context: &LayerContext, config: &AppConfig, params: LayerInstallParams,
) -> Result<CallToolResult, McpError> {
    let version = params.version.trim();
    if version.is_empty() || version.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!("invalid version: {:?}", params.version)).into());
    }

    let manifest = match params.manifest {
        Some(entries) => Manifest::new(entries)?,
        None => Manifest::from_config(config)?,
    };

    let controller = LifecycleController::new(version, manifest, context);
    let state = registration.register(controller).await?;

    json_result(&LayerInstallOutput { version: version.to_string(), state: state.to_string() })
}
