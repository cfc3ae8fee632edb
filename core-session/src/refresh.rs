//! Refresh coordination
//!
//! The core state machine keeping the access credential fresh. However many
//! requests discover an expired credential at once, exactly one renewal call
//! goes out per cycle; everyone else awaits the same in-flight outcome.
//!
//! The in-flight renewal is a single [`Shared`] future installed in a slot
//! guarded by a synchronous mutex. Checking the slot and installing the
//! future happen under one lock acquisition with no await point in between;
//! that is the whole single-flight guarantee, and it must stay that way.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use host_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use host_traits::time::Clock;

use crate::claims;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::events::{EventBus, SessionEvent};
use crate::invalidate::SessionInvalidator;
use crate::store::CredentialStore;

/// Coordinator state, observable for tests and host diagnostics.
///
/// Transitions are only ever `Idle -> Refreshing -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// An outbound call plus its retry bookkeeping.
///
/// `retried` is set at most once over the life of a logical request; a
/// request that has already been replayed after a renewal is never submitted
/// for renewal again.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub request: HttpRequest,
    pub retried: bool,
}

impl RequestAttempt {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }
}

/// Why a renewal cycle failed. All variants are fatal to the session; a
/// transport failure is not distinguished from an endpoint rejection.
#[derive(Error, Debug, Clone)]
pub(crate) enum RefreshError {
    #[error("renewal endpoint returned status {status}")]
    Endpoint { status: u16 },

    #[error("renewal endpoint returned an unreadable body: {0}")]
    Malformed(String),

    #[error("renewal transport failed: {0}")]
    Transport(String),

    #[error("renewal call timed out after {0:?}")]
    TimedOut(Duration),
}

type RefreshOutcome = std::result::Result<String, RefreshError>;
type SharedRenewal = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Single-flight renewal coordinator.
///
/// Instantiable, with injected transport and clock, so concurrent test runs
/// never share state. One coordinator exists per session context.
pub struct RefreshCoordinator {
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    store: Arc<CredentialStore>,
    invalidator: Arc<SessionInvalidator>,
    events: EventBus,
    config: Arc<SessionConfig>,
    in_flight: Arc<Mutex<Option<SharedRenewal>>>,
}

impl RefreshCoordinator {
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        store: Arc<CredentialStore>,
        invalidator: Arc<SessionInvalidator>,
        events: EventBus,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            http,
            clock,
            store,
            invalidator,
            events,
            config,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Current coordinator state.
    pub fn state(&self) -> RefreshState {
        let slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Whether `credential` falls within the proactive renewal window.
    pub fn is_near_expiry(&self, credential: &str) -> bool {
        claims::expires_within(
            credential,
            self.config.proactive_threshold,
            self.clock.as_ref(),
        )
    }

    /// Whether `credential` is expired under the reactive buffer.
    pub fn is_expired(&self, credential: &str) -> bool {
        claims::expires_within(credential, self.config.reactive_buffer, self.clock.as_ref())
    }

    /// Proactive renewal, called before dispatching a request.
    ///
    /// No-op when there is no credential or it is not near expiry. When a
    /// renewal is already in flight this returns immediately instead of
    /// waiting: the in-progress cycle will update the store shortly, and the
    /// caller's request proceeds with whatever credential is present. A
    /// failure here is not surfaced; the request is handled reactively if the
    /// backend rejects it.
    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self) {
        let Some(credential) = self.store.get() else {
            return;
        };
        if !self.is_near_expiry(&credential) {
            return;
        }

        let renewal = {
            let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_some() {
                debug!("renewal already in flight; not waiting");
                return;
            }
            let renewal = self.start_renewal();
            *slot = Some(renewal.clone());
            renewal
        };

        if let Err(e) = renewal.await {
            debug!(error = %e, "proactive renewal failed; session invalidated");
        }
    }

    /// Reactive coordination after a request came back 401.
    ///
    /// Joins (or starts) the current renewal cycle, then replays the request
    /// once with the new credential. Terminal failures carry the original
    /// response so the caller sees exactly what the backend rejected.
    #[instrument(skip(self, attempt, response), fields(path = %attempt.path()))]
    pub async fn coordinate_on_401(
        &self,
        attempt: &mut RequestAttempt,
        response: HttpResponse,
    ) -> Result<HttpResponse> {
        if attempt.retried {
            debug!("request already replayed once; rejecting");
            return Err(SessionError::RetryExhausted { response });
        }

        let path = attempt.path().to_string();
        if self.config.is_excluded(&path) {
            debug!(path = %path, "authorization failure on excluded path; renewal not attempted");
            return Err(SessionError::ExcludedPath { path, response });
        }

        match self.join_or_start().await {
            Ok(credential) => {
                attempt.retried = true;
                let replay = attempt.request.clone().bearer_token(credential.as_str());
                debug!("replaying request with renewed credential");
                self.http
                    .execute(replay)
                    .await
                    .map_err(|e| SessionError::Transport(e.to_string()))
            }
            Err(e) => Err(SessionError::RenewalFailed {
                reason: e.to_string(),
                response: Some(response),
            }),
        }
    }

    /// Join the in-flight renewal or start a new one.
    ///
    /// The slot is checked and filled under one synchronous lock: any await
    /// between the decision to renew and the installation of the future would
    /// let two callers race into two renewal calls.
    fn join_or_start(&self) -> SharedRenewal {
        let mut slot = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(renewal) = slot.as_ref() {
            debug!("joining in-flight renewal");
            return renewal.clone();
        }
        let renewal = self.start_renewal();
        *slot = Some(renewal.clone());
        renewal
    }

    /// Build the shared renewal future. The caller installs it in the slot;
    /// the future clears the slot itself once the outcome is settled, so the
    /// coordinator is back to `Idle` before any waiter observes the result.
    fn start_renewal(&self) -> SharedRenewal {
        let http = Arc::clone(&self.http);
        let store = Arc::clone(&self.store);
        let invalidator = Arc::clone(&self.invalidator);
        let events = self.events.clone();
        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.in_flight);

        async move {
            let _ = events.emit(SessionEvent::Refreshing);

            let outcome = renew_once(http, config).await;
            match &outcome {
                Ok(credential) => {
                    if let Err(e) = store.set(credential) {
                        warn!(error = %e, "renewed credential could not be persisted");
                    }
                    let expires_at = claims::decode(credential).ok().map(|c| c.exp);
                    let _ = events.emit(SessionEvent::Refreshed { expires_at });
                    info!("access credential renewed");
                }
                Err(e) => {
                    warn!(error = %e, "credential renewal failed");
                    invalidator.invalidate(&e.to_string());
                }
            }

            *slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
            outcome
        }
        .boxed()
        .shared()
    }
}

/// One call to the renewal endpoint. No body: the renewal credential lives in
/// the runtime's cookie jar, outside this subsystem's reach.
async fn renew_once(http: Arc<dyn HttpClient>, config: Arc<SessionConfig>) -> RefreshOutcome {
    let request = HttpRequest::new(HttpMethod::Post, config.refresh_url())
        .timeout(config.request_timeout);
    debug!(url = %request.url, "calling renewal endpoint");

    let response = match timeout(config.request_timeout, http.execute(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(RefreshError::Transport(e.to_string())),
        Err(_) => return Err(RefreshError::TimedOut(config.request_timeout)),
    };

    if !response.is_success() {
        return Err(RefreshError::Endpoint {
            status: response.status,
        });
    }

    let parsed: RefreshResponse = response
        .json()
        .map_err(|e| RefreshError::Malformed(e.to_string()))?;
    Ok(parsed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::{DateTime, Utc};
    use host_traits::storage::MemoryStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW: i64 = 1_700_000_000;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.0, 0).unwrap()
        }
    }

    fn make_token(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        format!("h.{}.s", payload)
    }

    /// Transport that counts calls and always answers 200 with a fresh token.
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for CountingTransport {
        async fn execute(&self, _request: HttpRequest) -> host_traits::error::Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = format!(r#"{{"access_token":"{}"}}"#, make_token(NOW + 3600));
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: body.into(),
            })
        }
    }

    fn coordinator(
        http: Arc<dyn HttpClient>,
        store: Arc<CredentialStore>,
    ) -> RefreshCoordinator {
        let events = EventBus::new(10);
        let invalidator = Arc::new(SessionInvalidator::new(store.clone(), events.clone()));
        RefreshCoordinator::new(
            http,
            Arc::new(FixedClock(NOW)),
            store,
            invalidator,
            events,
            Arc::new(SessionConfig::new("https://api.example.com")),
        )
    }

    #[tokio::test]
    async fn test_state_starts_and_ends_idle() {
        let http = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));
        store.set(&make_token(NOW + 100)).unwrap();

        let coordinator = coordinator(http.clone(), store.clone());
        assert_eq!(coordinator.state(), RefreshState::Idle);

        coordinator.ensure_fresh().await;
        assert_eq!(coordinator.state(), RefreshState::Idle);
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(), Some(make_token(NOW + 3600)));
    }

    #[tokio::test]
    async fn test_ensure_fresh_noop_without_credential() {
        let http = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));

        let coordinator = coordinator(http.clone(), store);
        coordinator.ensure_fresh().await;
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_fresh_noop_far_from_expiry() {
        let http = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));
        store.set(&make_token(NOW + 3600)).unwrap();

        let coordinator = coordinator(http.clone(), store.clone());
        coordinator.ensure_fresh().await;
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(), Some(make_token(NOW + 3600)));
    }

    #[tokio::test]
    async fn test_retried_attempt_is_rejected_without_renewal() {
        let http = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));
        let coordinator = coordinator(http.clone(), store);

        let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/invoices");
        let mut attempt = RequestAttempt::new(request);
        attempt.retried = true;

        let denied = HttpResponse {
            status: 401,
            headers: HashMap::new(),
            body: bytes::Bytes::new(),
        };
        let result = coordinator.coordinate_on_401(&mut attempt, denied).await;

        assert!(matches!(result, Err(SessionError::RetryExhausted { .. })));
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_excluded_path_is_rejected_without_renewal() {
        let http = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));
        let coordinator = coordinator(http.clone(), store);

        for path in ["/auth/refresh", "/auth/login", "/auth/register"] {
            let url = format!("https://api.example.com{}", path);
            let mut attempt = RequestAttempt::new(HttpRequest::new(HttpMethod::Post, url));
            let denied = HttpResponse {
                status: 401,
                headers: HashMap::new(),
                body: bytes::Bytes::new(),
            };

            let result = coordinator.coordinate_on_401(&mut attempt, denied).await;
            match result {
                Err(SessionError::ExcludedPath { path: p, .. }) => assert_eq!(p, path),
                other => panic!("expected ExcludedPath, got {:?}", other.map(|r| r.status)),
            }
            assert!(!attempt.retried);
        }
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reactive_renewal_replays_with_new_credential() {
        let http = Arc::new(CountingTransport {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));
        store.set(&make_token(NOW - 10)).unwrap();
        let coordinator = coordinator(http.clone(), store.clone());

        let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/invoices")
            .bearer_token("stale");
        let mut attempt = RequestAttempt::new(request);
        let denied = HttpResponse {
            status: 401,
            headers: HashMap::new(),
            body: bytes::Bytes::new(),
        };

        let replayed = coordinator
            .coordinate_on_401(&mut attempt, denied)
            .await
            .unwrap();

        // One renewal call plus one replay through the same transport.
        assert_eq!(http.calls.load(Ordering::SeqCst), 2);
        assert_eq!(replayed.status, 200);
        assert!(attempt.retried);
        assert_eq!(store.get(), Some(make_token(NOW + 3600)));
        assert_eq!(coordinator.state(), RefreshState::Idle);
    }
}
