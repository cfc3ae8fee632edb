//! # Session Manager
//!
//! Facade wiring the subsystem together and exposing the host surface:
//! credential access, lifecycle calls, the interceptor hooks, the expiry
//! callback registration, and the event stream.
//!
//! ## Usage
//!
//! ```ignore
//! use core_session::{SessionConfig, SessionManager};
//! use host_traits::{SystemClock, MemoryStore};
//! use std::sync::Arc;
//!
//! let manager = SessionManager::new(
//!     http_client,
//!     Arc::new(SystemClock),
//!     Arc::new(MemoryStore::new()),
//!     SessionConfig::new("https://api.example.com"),
//! );
//!
//! manager.on_session_expired(|reason| {
//!     // e.g. navigate to the login screen
//! });
//!
//! let response = manager.send(request).await?;
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use host_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use host_traits::storage::KeyValueStore;
use host_traits::time::Clock;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{EventBus, Receiver, SessionEvent};
use crate::interceptor::AuthInterceptor;
use crate::invalidate::SessionInvalidator;
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// One authenticated session context.
///
/// Everything hangs off injected host capabilities; nothing in here touches
/// globals, so independent managers (tests, tenants) never share state.
pub struct SessionManager {
    config: Arc<SessionConfig>,
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    events: EventBus,
    invalidator: Arc<SessionInvalidator>,
    coordinator: Arc<RefreshCoordinator>,
    interceptor: AuthInterceptor,
}

impl SessionManager {
    /// Wire up a session context from host capabilities.
    ///
    /// Hydrates the credential store from `storage`; a credential persisted
    /// by a previous run of the same browser session is picked up here.
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        let config = Arc::new(config);
        let events = EventBus::new(config.event_capacity);
        let store = Arc::new(CredentialStore::load(storage, config.storage_key.clone()));
        let invalidator = Arc::new(SessionInvalidator::new(store.clone(), events.clone()));
        let coordinator = Arc::new(RefreshCoordinator::new(
            http.clone(),
            clock,
            store.clone(),
            invalidator.clone(),
            events.clone(),
            config.clone(),
        ));
        let interceptor = AuthInterceptor::new(http.clone(), store.clone(), coordinator.clone());

        Self {
            config,
            http,
            store,
            events,
            invalidator,
            coordinator,
            interceptor,
        }
    }

    /// Current access credential, if any.
    pub fn credential(&self) -> Option<String> {
        self.store.get()
    }

    /// Install a credential obtained outside this subsystem (initial
    /// hydration, tests).
    pub fn set_credential(&self, credential: &str) -> Result<()> {
        self.store.set(credential)
    }

    /// Drop the credential without calling the backend.
    pub fn clear_credential(&self) -> Result<()> {
        self.store.clear()
    }

    /// Whether a credential is present and not within the reactive expiry
    /// buffer.
    pub fn has_fresh_credential(&self) -> bool {
        self.store
            .get()
            .map_or(false, |c| !self.coordinator.is_expired(&c))
    }

    /// Register the callback fired when a renewal failure ends the session.
    pub fn on_session_expired<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.invalidator.on_session_expired(callback);
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The interceptor pair, for hosts wiring their own request pipeline.
    pub fn interceptor(&self) -> &AuthInterceptor {
        &self.interceptor
    }

    /// The refresh coordinator, for hosts that schedule proactive renewal
    /// themselves.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Send a request through the full outbound/inbound interceptor chain.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.interceptor.send(request).await
    }

    /// Log in with username and password.
    ///
    /// On success the returned access credential is stored; the long-lived
    /// renewal credential is set by the server as a cookie outside this
    /// subsystem's visibility.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let mut params = HashMap::new();
        params.insert("username", username);
        params.insert("password", password);
        let encoded = serde_urlencoded::to_string(&params)
            .map_err(|e| SessionError::Transport(format!("failed to encode login body: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.login_url())
            .form(encoded)
            .timeout(self.config.request_timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(SessionError::LoginFailed {
                status: response.status,
            });
        }

        let parsed: LoginResponse = response
            .json()
            .map_err(|e| SessionError::Transport(format!("unreadable login response: {}", e)))?;
        self.store.set(&parsed.access_token)?;
        let _ = self.events.emit(SessionEvent::SignedIn);
        info!("login succeeded");
        Ok(())
    }

    /// Log out: best-effort call to the logout endpoint, then drop the
    /// credential locally either way.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        // No proactive renewal here: the session is being terminated.
        let request = HttpRequest::new(HttpMethod::Post, self.config.logout_url())
            .timeout(self.config.request_timeout);
        let request = match self.store.get() {
            Some(credential) => request.bearer_token(credential),
            None => request,
        };

        if let Err(e) = self.http.execute(request).await {
            warn!(error = %e, "logout call failed; clearing local session anyway");
        }

        self.store.clear()?;
        let _ = self.events.emit(SessionEvent::SignedOut);
        info!("logged out");
        Ok(())
    }
}
