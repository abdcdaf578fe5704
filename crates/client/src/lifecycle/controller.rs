//! One version of the offline layer and its lifecycle event handlers.

use tokio::sync::RwLock;
use url::Url;

use havn_core::{Error, Generation, GenerationRole, RequestIdentity, SharedStore, active_generation_names};

use super::{ControlSignal, LayerContext, LifecycleState, Manifest};
use crate::dispatch::{RuleTable, Strategy};
use crate::fetch::SharedTransport;
use crate::intercept::Interceptor;
use crate::request::{InterceptedRequest, InterceptedResponse, ResponseSource};

/// A versioned instance of the layer.
///
/// Events are delivered through `on_install`, `on_activate`, `on_request` and
/// `on_control_signal`; `Registration` decides when each one fires.
pub struct LifecycleController {
    version: String,
    manifest: Manifest,
    origin: Url,
    fallback: RequestIdentity,
    store: SharedStore,
    transport: SharedTransport,
    rules: RuleTable,
    interceptor: Interceptor,
    state: RwLock<LifecycleState>,
}

impl LifecycleController {
    pub fn new(version: impl Into<String>, manifest: Manifest, context: &LayerContext) -> Self {
        let version = version.into();
        let interceptor = Interceptor::new(
            context.store.clone(),
            context.transport.clone(),
            &version,
            context.fallback.clone(),
        );

        Self {
            version,
            manifest,
            origin: context.origin.clone(),
            fallback: context.fallback.clone(),
            store: context.store.clone(),
            transport: context.transport.clone(),
            rules: context.rules.clone(),
            interceptor,
            state: RwLock::new(LifecycleState::Uninstalled),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub(crate) async fn mark_redundant(&self) {
        *self.state.write().await = LifecycleState::Redundant;
        tracing::info!(version = %self.version, "version redundant");
    }

    /// Move from `from` to `to`, or fail if the current state is not `from`.
    async fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState(format!(
                "version {} cannot move to {to} from {}",
                self.version, *state
            )));
        }
        *state = to;
        Ok(())
    }

    /// Pre-populate `static-<version>` with every manifest resource.
    ///
    /// All resources are fetched before anything is written, then committed
    /// in one batch, so a failed install leaves no partial generation behind.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT`, leaving the version `Uninstalled`, if the
    /// manifest does not list the fallback document.
    ///
    /// Returns `INSTALL_FAILED` if any resource cannot be fetched, answers
    /// with a non-success status, or the batch write fails. The version is
    /// then `Redundant`.
    pub async fn on_install(&self) -> Result<(), Error> {
        self.require_fallback_in_manifest()?;
        self.transition(LifecycleState::Uninstalled, LifecycleState::Installing)
            .await?;
        tracing::info!(version = %self.version, resources = self.manifest.len(), "installing");

        match self.populate_static().await {
            Ok(()) => {
                self.transition(LifecycleState::Installing, LifecycleState::Installed)
                    .await?;
                tracing::info!(version = %self.version, "installed");
                Ok(())
            }
            Err(reason) => {
                self.mark_redundant().await;
                Err(Error::InstallFailed { version: self.version.clone(), reason: reason.to_string() })
            }
        }
    }

    /// CacheFirst falls back to this document offline, so it has to be
    /// pre-populated with the rest of the manifest.
    fn require_fallback_in_manifest(&self) -> Result<(), Error> {
        let urls = self.manifest.resolve(&self.origin)?;
        if urls.iter().any(|url| url.as_str() == self.fallback.uri()) {
            return Ok(());
        }
        Err(Error::InvalidInput(format!(
            "manifest for version {} must include the fallback document {}",
            self.version,
            self.fallback.uri()
        )))
    }

    async fn populate_static(&self) -> Result<(), Error> {
        let urls = self.manifest.resolve(&self.origin)?;
        let mut entries = Vec::with_capacity(urls.len());

        for url in urls {
            let request = InterceptedRequest::get(url);
            let response = self.transport.send(&request).await?;
            if !response.status.is_success() {
                return Err(Error::HttpError(format!("{} returned status {}", request.url, response.status.as_u16())));
            }
            entries.push((request.identity(), response.to_cached()));
        }

        let generation = Generation::lazy(self.store.clone(), GenerationRole::Static.name(&self.version));
        generation.put_all(&entries).await
    }

    /// Delete every generation outside this version's active set, then
    /// become `Active`. Returns the deleted generation names.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_STATE` unless the version is `Installed`. A store
    /// failure during the sweep puts the version back to `Installed`.
    pub async fn on_activate(&self) -> Result<Vec<String>, Error> {
        self.transition(LifecycleState::Installed, LifecycleState::Activating)
            .await?;

        match self.sweep().await {
            Ok(deleted) => {
                self.transition(LifecycleState::Activating, LifecycleState::Active)
                    .await?;
                tracing::info!(version = %self.version, deleted = ?deleted, "activated");
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(version = %self.version, error = %e, "activation sweep failed");
                *self.state.write().await = LifecycleState::Installed;
                Err(e)
            }
        }
    }

    async fn sweep(&self) -> Result<Vec<String>, Error> {
        let keep = active_generation_names(&self.version);
        let mut deleted = Vec::new();

        for name in self.store.generation_names().await? {
            if keep.contains(&name) {
                continue;
            }
            if self.store.delete(&name).await? {
                tracing::debug!(version = %self.version, generation = %name, "deleted stale generation");
                deleted.push(name);
            }
        }

        Generation::open(self.store.clone(), GenerationRole::Dynamic.name(&self.version)).await?;
        Ok(deleted)
    }

    /// Handle one intercepted request with the strategy the rule table picks.
    ///
    /// # Errors
    ///
    /// Only bypassed requests can fail; their transport error is returned
    /// untouched because the layer does not handle them.
    pub async fn on_request(&self, request: InterceptedRequest) -> Result<InterceptedResponse, Error> {
        let strategy = self.rules.classify(&request);
        tracing::debug!(
            version = %self.version,
            method = %request.method,
            url = %request.url,
            strategy = ?strategy,
            "intercepted"
        );

        match strategy {
            Strategy::Bypass => {
                let response = self.transport.send(&request).await?;
                Ok(InterceptedResponse::from_network(response, ResponseSource::Passthrough))
            }
            Strategy::NetworkFirst => Ok(self.interceptor.network_first(request).await),
            Strategy::CacheFirst => Ok(self.interceptor.cache_first(request).await),
        }
    }

    /// Returns true when the version is waiting and the signal asks it to
    /// take over.
    pub async fn on_control_signal(&self, signal: ControlSignal) -> bool {
        match signal {
            ControlSignal::TakeOverNow => {
                let waiting = self.state().await == LifecycleState::Installed;
                tracing::info!(version = %self.version, waiting, "take-over requested");
                waiting
            }
        }
    }

}
