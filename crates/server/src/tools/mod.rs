//! MCP tool implementations.
//!
//! Each tool drives the shared `Registration`: interception, control
//! messages, installing versions and status reporting.

pub mod control;
pub mod fetch;
pub mod install;
pub mod status;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use havn_core::Error;

pub use control::{LayerControlParams, control_impl};
pub use fetch::{LayerFetchParams, fetch_impl};
pub use install::{LayerInstallParams, install_impl};
pub use status::status_impl;

/// Wrap a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
