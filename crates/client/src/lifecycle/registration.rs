//! Host-side owner of the active and waiting versions.
//!
//! Install and activate run under one transition lock, so an activation
//! sweep never races the install of another version. Request handling only
//! clones the active controller out of its slot and never takes that lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use havn_core::{Error, SharedStore};

use super::{ControlSignal, LifecycleController, LifecycleState};
use crate::fetch::SharedTransport;
use crate::request::{InterceptedRequest, InterceptedResponse, ResponseSource};

/// Snapshot of which versions are serving and waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub sessions: usize,
    pub generations: Vec<String>,
}

pub struct Registration {
    store: SharedStore,
    transport: SharedTransport,
    active: RwLock<Option<Arc<LifecycleController>>>,
    waiting: RwLock<Option<Arc<LifecycleController>>>,
    sessions: AtomicUsize,
    transition: Mutex<()>,
}

impl Registration {
    pub fn new(store: SharedStore, transport: SharedTransport) -> Self {
        Self {
            store,
            transport,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            sessions: AtomicUsize::new(0),
            transition: Mutex::new(()),
        }
    }

    /// Install a new version.
    ///
    /// It activates immediately when nothing is active or no client session
    /// is open; otherwise it waits for handoff, replacing any version that
    /// was already waiting.
    ///
    /// # Errors
    ///
    /// Returns the install error; the active version keeps serving.
    pub async fn register(&self, controller: LifecycleController) -> Result<LifecycleState, Error> {
        let _guard = self.transition.lock().await;
        let controller = Arc::new(controller);

        if let Err(e) = controller.on_install().await {
            tracing::error!(
                version = controller.version(),
                error = %e,
                "install failed; current version keeps serving"
            );
            return Err(e);
        }

        let has_active = self.active.read().await.is_some();
        if !has_active || self.sessions() == 0 {
            self.activate(controller).await?;
            return Ok(LifecycleState::Active);
        }

        let replaced = self.waiting.write().await.replace(controller.clone());
        if let Some(previous) = replaced {
            previous.mark_redundant().await;
        }
        tracing::info!(version = controller.version(), sessions = self.sessions(), "waiting for handoff");
        Ok(LifecycleState::Installed)
    }

    /// Activate `controller` and retire the previously active version.
    /// Callers hold the transition lock.
    async fn activate(&self, controller: Arc<LifecycleController>) -> Result<(), Error> {
        controller.on_activate().await?;
        let previous = self.active.write().await.replace(controller.clone());
        if let Some(previous) = previous {
            previous.mark_redundant().await;
            tracing::info!(from = previous.version(), to = controller.version(), "version superseded");
        }
        Ok(())
    }

    /// Promote the waiting version, putting it back if activation fails.
    async fn promote_waiting(&self, reason: &str) -> Result<Option<String>, Error> {
        let Some(waiting) = self.waiting.write().await.take() else {
            return Ok(None);
        };

        match self.activate(waiting.clone()).await {
            Ok(()) => {
                tracing::info!(version = waiting.version(), reason, "waiting version promoted");
                Ok(Some(waiting.version().to_string()))
            }
            Err(e) => {
                *self.waiting.write().await = Some(waiting);
                Err(e)
            }
        }
    }

    /// Deliver a control signal. Returns the version that became active, if any.
    pub async fn post_message(&self, signal: ControlSignal) -> Result<Option<String>, Error> {
        let _guard = self.transition.lock().await;

        let waiting = self.waiting.read().await.clone();
        let Some(waiting) = waiting else {
            tracing::debug!(%signal, "no waiting version; signal ignored");
            return Ok(None);
        };

        if !waiting.on_control_signal(signal).await {
            return Ok(None);
        }
        self.promote_waiting("take-over").await
    }

    /// A client session started using the active version.
    pub fn open_session(&self) -> usize {
        self.sessions.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A client session ended. When the last one closes, a waiting version
    /// takes over. Returns the version that became active, if any.
    pub async fn close_session(&self) -> Result<Option<String>, Error> {
        let remaining = match self
            .sessions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                tracing::debug!("close_session called with no open sessions");
                0
            }
        };

        if remaining > 0 {
            return Ok(None);
        }

        let _guard = self.transition.lock().await;
        if self.sessions() > 0 {
            return Ok(None);
        }
        self.promote_waiting("handoff").await
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub async fn active_version(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|c| c.version().to_string())
    }

    pub async fn waiting_version(&self) -> Option<String> {
        self.waiting.read().await.as_ref().map(|c| c.version().to_string())
    }

    /// Interception entry point.
    ///
    /// Requests go to the active version; with nothing active they go
    /// straight to the network.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<InterceptedResponse, Error> {
        let active = self.active.read().await.clone();
        match active {
            Some(controller) => controller.on_request(request).await,
            None => {
                let response = self.transport.send(&request).await?;
                Ok(InterceptedResponse::from_network(response, ResponseSource::Passthrough))
            }
        }
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        Ok(RegistrationStatus {
            active: self.active_version().await,
            waiting: self.waiting_version().await,
            sessions: self.sessions(),
            generations: self.store.generation_names().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LayerContext, Manifest};
    use crate::test_support::{ScriptedTransport, url};
    use havn_core::{AppConfig, CacheDb};
    use reqwest::StatusCode;
    use std::time::Duration;

    /// Wait until the transport has seen more than `baseline` calls.
    async fn until_calls_exceed(transport: &ScriptedTransport, baseline: usize) {
        while transport.calls() <= baseline {
            tokio::task::yield_now().await;
        }
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        context: LayerContext,
        registration: Registration,
    }

    impl Harness {
        async fn new() -> Self {
            let transport = Arc::new(
                ScriptedTransport::new()
                    .route("/", 200, "<shell v1>")
                    .route("/index.html", 200, "<shell v1>")
                    .route("/manifest.json", 200, "{}"),
            );
            let store: SharedStore = Arc::new(CacheDb::open_in_memory().await.unwrap());
            let context = LayerContext::from_config(&AppConfig::default(), store.clone(), transport.clone()).unwrap();
            let registration = Registration::new(store, transport.clone());
            Self { transport, context, registration }
        }

        fn version(&self, version: &str) -> LifecycleController {
            LifecycleController::new(version, Manifest::from_config(&AppConfig::default()).unwrap(), &self.context)
        }

        fn version_with_manifest(&self, version: &str, entries: &[&str]) -> LifecycleController {
            LifecycleController::new(version, Manifest::new(entries.iter().copied()).unwrap(), &self.context)
        }

        async fn sorted_generations(&self) -> Vec<String> {
            let mut names = self.registration.status().await.unwrap().generations;
            names.sort();
            names
        }
    }

    #[tokio::test]
    async fn test_first_version_activates_immediately() {
        let h = Harness::new().await;

        let state = h.registration.register(h.version("v1")).await.unwrap();
        assert_eq!(state, LifecycleState::Active);
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v1"));
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v1", "static-v1"]);
    }

    #[tokio::test]
    async fn test_without_sessions_new_version_replaces_active() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();

        let state = h.registration.register(h.version("v2")).await.unwrap();
        assert_eq!(state, LifecycleState::Active);
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v2"));
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v2", "static-v2"]);
    }

    #[tokio::test]
    async fn test_new_version_waits_while_sessions_open() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();

        let state = h.registration.register(h.version("v2")).await.unwrap();
        assert_eq!(state, LifecycleState::Installed);
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v1"));
        assert_eq!(h.registration.waiting_version().await.as_deref(), Some("v2"));
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v1", "static-v1", "static-v2"]);
    }

    #[tokio::test]
    async fn test_take_over_promotes_waiting_version() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();
        h.registration.register(h.version("v2")).await.unwrap();

        let activated = h.registration.post_message(ControlSignal::TakeOverNow).await.unwrap();
        assert_eq!(activated.as_deref(), Some("v2"));
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v2"));
        assert_eq!(h.registration.waiting_version().await, None);
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v2", "static-v2"]);

        let response = h.registration.fetch(InterceptedRequest::get(url("/"))).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_take_over_without_waiting_version_is_noop() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();

        let activated = h.registration.post_message(ControlSignal::TakeOverNow).await.unwrap();
        assert_eq!(activated, None);
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_last_session_closing_hands_off() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();
        h.registration.open_session();
        h.registration.register(h.version("v2")).await.unwrap();

        assert_eq!(h.registration.close_session().await.unwrap(), None);
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v1"));

        assert_eq!(h.registration.close_session().await.unwrap().as_deref(), Some("v2"));
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_close_session_without_open_sessions() {
        let h = Harness::new().await;
        assert_eq!(h.registration.close_session().await.unwrap(), None);
        assert_eq!(h.registration.sessions(), 0);
    }

    #[tokio::test]
    async fn test_failed_install_leaves_active_version_serving() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();

        let result = h
            .registration
            .register(h.version_with_manifest("v2", &["/", "/missing.js"]))
            .await;
        assert!(matches!(result, Err(Error::InstallFailed { .. })));
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v1"));
        assert_eq!(h.registration.waiting_version().await, None);
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v1", "static-v1"]);

        h.transport.set_offline(true);
        let response = h.registration.fetch(InterceptedRequest::get(url("/index.html"))).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_text(), "<shell v1>");
    }

    #[tokio::test]
    async fn test_newer_waiting_version_replaces_older_waiting() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();
        h.registration.register(h.version("v2")).await.unwrap();
        h.registration.register(h.version("v3")).await.unwrap();

        assert_eq!(h.registration.waiting_version().await.as_deref(), Some("v3"));
        let activated = h.registration.post_message(ControlSignal::TakeOverNow).await.unwrap();
        assert_eq!(activated.as_deref(), Some("v3"));
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v3", "static-v3"]);
    }

    #[tokio::test]
    async fn test_fetch_without_active_version_passes_through() {
        let h = Harness::new().await;

        let response = h.registration.fetch(InterceptedRequest::get(url("/"))).await.unwrap();
        assert_eq!(response.source, ResponseSource::Passthrough);
        assert!(h.registration.status().await.unwrap().generations.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_without_active_version_surfaces_network_error() {
        let h = Harness::new().await;
        h.transport.set_offline(true);

        let result = h.registration.fetch(InterceptedRequest::get(url("/"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_status_reports_versions_and_sessions() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();
        h.registration.register(h.version("v2")).await.unwrap();

        let status = h.registration.status().await.unwrap();
        assert_eq!(status.active.as_deref(), Some("v1"));
        assert_eq!(status.waiting.as_deref(), Some("v2"));
        assert_eq!(status.sessions, 1);
    }

    #[tokio::test]
    async fn test_request_outliving_its_version_leaves_no_generation_behind() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.transport.set_route("/api/slow", 200, "old-v1-data");
        h.transport.set_delay(Duration::from_millis(100));
        let baseline = h.transport.calls();

        let slow = h.registration.fetch(InterceptedRequest::get(url("/api/slow")));
        let upgrade = async {
            until_calls_exceed(&h.transport, baseline).await;
            h.transport.set_delay(Duration::ZERO);
            h.registration.register(h.version("v2")).await.unwrap()
        };
        let (old, state) = tokio::join!(slow, upgrade);

        assert_eq!(state, LifecycleState::Active);
        let old = old.unwrap();
        assert_eq!(old.source, ResponseSource::Network);
        assert_eq!(old.body_text(), "old-v1-data");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v2", "static-v2"]);

        h.transport.set_offline(true);
        let response = h.registration.fetch(InterceptedRequest::get(url("/api/slow"))).await.unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.source, ResponseSource::Offline);
    }

    #[tokio::test]
    async fn test_take_over_waits_for_install_in_progress() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();
        h.registration.register(h.version("v2")).await.unwrap();
        h.transport.set_delay(Duration::from_millis(30));
        let baseline = h.transport.calls();

        let install = h.registration.register(h.version("v3"));
        let take_over = async {
            until_calls_exceed(&h.transport, baseline).await;
            h.registration.post_message(ControlSignal::TakeOverNow).await
        };
        let (state, activated) = tokio::join!(install, take_over);

        assert_eq!(state.unwrap(), LifecycleState::Installed);
        assert_eq!(activated.unwrap().as_deref(), Some("v3"));
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v3"));
        assert_eq!(h.registration.waiting_version().await, None);
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v3", "static-v3"]);

        h.transport.set_offline(true);
        for path in ["/", "/index.html", "/manifest.json"] {
            let response = h.registration.fetch(InterceptedRequest::get(url(path))).await.unwrap();
            assert_eq!(response.source, ResponseSource::Cache, "{path} missing from static-v3");
        }
    }

    #[tokio::test]
    async fn test_last_session_closing_during_install() {
        let h = Harness::new().await;
        h.registration.register(h.version("v1")).await.unwrap();
        h.registration.open_session();
        h.transport.set_delay(Duration::from_millis(30));
        let baseline = h.transport.calls();

        let install = h.registration.register(h.version("v2"));
        let close = async {
            until_calls_exceed(&h.transport, baseline).await;
            h.registration.close_session().await
        };
        let (state, promoted) = tokio::join!(install, close);

        assert_eq!(state.unwrap(), LifecycleState::Active);
        assert_eq!(promoted.unwrap(), None);
        assert_eq!(h.registration.active_version().await.as_deref(), Some("v2"));
        assert_eq!(h.registration.waiting_version().await, None);
        assert_eq!(h.sorted_generations().await, vec!["dynamic-v2", "static-v2"]);
    }
}
