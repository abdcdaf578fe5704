//! layer_fetch tool implementation.
//!
//! Hands one request to the layer, as the host does on every outgoing fetch.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use havn_client::{InterceptedRequest, Registration, request::headers_to_pairs};

use super::json_result;

/// Input parameters for layer_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerFetchParams {
    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for layer_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LayerFetchOutput {
    pub status: u16,
    /// Response headers in wire order; repeated names appear more than once.
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    /// One of network, cache, fallback, offline or passthrough.
    pub source: String,
}

/// Implementation of the layer_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: LayerFetchParams,
) -> Result<CallToolResult, McpError> {
    let headers: Vec<(&str, &str)> = params
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let request = InterceptedRequest::parse(&params.method, &params.url, &headers, origin)?;

    let response = registration.fetch(request).await?;

    let output = LayerFetchOutput {
        status: response.status.as_u16(),
        headers: headers_to_pairs(&response.headers),
        body: response.body_text().into_owned(),
        source: response.source.as_str().to_string(),
    };

    json_result(&output)
}
