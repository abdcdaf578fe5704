//! Versioned install/activate lifecycle of the offline layer.
//!
//! ### States
//! `Uninstalled → Installing → Installed (waiting) → Activating → Active`,
//! plus `Redundant` for a version whose install failed or that was superseded.
//!
//! ### Generations
//! - Install pre-populates `static-<version>` from the manifest, all-or-nothing.
//! - Activate deletes every generation outside `{static,dynamic}-<version>`.
//!
//! ### Handoff
//! A version installed while another one is serving open sessions waits until
//! the last session closes, or until the `take-over-now` control signal.

pub mod controller;
pub mod manifest;
pub mod registration;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use havn_core::{AppConfig, Error, RequestIdentity, SharedStore};

use crate::dispatch::RuleTable;
use crate::fetch::{SharedTransport, parse_request_uri};

pub use controller::LifecycleController;
pub use manifest::Manifest;
pub use registration::{Registration, RegistrationStatus};

/// Lifecycle state of one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    /// Installed and waiting for handoff.
    Installed,
    Activating,
    Active,
    /// Failed to install, or superseded by a newer version.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninstalled => "uninstalled",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// External control message. Only forced takeover exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlSignal {
    #[serde(rename = "take-over-now")]
    TakeOverNow,
}

impl ControlSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlSignal::TakeOverNow => "take-over-now",
        }
    }
}

impl FromStr for ControlSignal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "take-over-now" => Ok(ControlSignal::TakeOverNow),
            other => Err(Error::InvalidInput(format!("unknown control signal: {other}"))),
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators and settings shared by every version of the layer.
#[derive(Clone)]
pub struct LayerContext {
    pub store: SharedStore,
    pub transport: SharedTransport,
    pub rules: RuleTable,
    pub origin: Url,
    /// GET identity of the document served when a cache-first request is offline.
    pub fallback: RequestIdentity,
}

impl LayerContext {
    /// Build the context from configuration.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_URL` if the origin or fallback document cannot be parsed.
    pub fn from_config(config: &AppConfig, store: SharedStore, transport: SharedTransport) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let fallback =
            parse_request_uri(&config.fallback_document, &origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            store,
            transport,
            rules: RuleTable::from_config(config),
            fallback: RequestIdentity::get(fallback.as_str()),
            origin,
        })
    }
}
