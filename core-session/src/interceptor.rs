//! Request interceptors
//!
//! The outbound hook attaches the credential and triggers proactive renewal;
//! the inbound hook turns a 401 into a coordinated renewal plus a single
//! replay. Callers of [`AuthInterceptor::send`] never observe that a renewal
//! happened on the success path.

use std::sync::Arc;
use tracing::debug;

use host_traits::http::{HttpClient, HttpRequest, HttpResponse};

use crate::error::{Result, SessionError};
use crate::refresh::{RefreshCoordinator, RefreshState, RequestAttempt};
use crate::store::CredentialStore;

/// Outbound/inbound interceptor pair around a host transport.
pub struct AuthInterceptor {
    http: Arc<dyn HttpClient>,
    store: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthInterceptor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            http,
            store,
            coordinator,
        }
    }

    /// Outbound hook: renew proactively when the credential is near expiry
    /// and nothing is already in flight, then attach the bearer header.
    /// Requests without a credential are dispatched unauthenticated.
    pub async fn prepare(&self, request: HttpRequest) -> HttpRequest {
        let Some(credential) = self.store.get() else {
            return request;
        };

        if self.coordinator.is_near_expiry(&credential)
            && self.coordinator.state() == RefreshState::Idle
        {
            // Bounded by the renewal call's own timeout. Best-effort: if it
            // fails, the request goes out as-is and is handled reactively.
            self.coordinator.ensure_fresh().await;
        }

        // The renewal may have replaced (or a failed one cleared) the
        // credential while we waited; read it again.
        match self.store.get() {
            Some(current) => request.bearer_token(current),
            None => request,
        }
    }

    /// Inbound hook: pass non-401 responses through unchanged; hand 401s to
    /// the refresh coordinator for a bounded, single retry.
    pub async fn handle(
        &self,
        attempt: &mut RequestAttempt,
        response: HttpResponse,
    ) -> Result<HttpResponse> {
        if !response.is_unauthorized() {
            return Ok(response);
        }

        debug!(path = %attempt.path(), "authorization failure; coordinating renewal");
        let replayed = self.coordinator.coordinate_on_401(attempt, response).await?;

        if replayed.is_unauthorized() {
            // The attempt is marked retried by now, so this resolves to
            // RetryExhausted instead of looping.
            return self.coordinator.coordinate_on_401(attempt, replayed).await;
        }
        Ok(replayed)
    }

    /// Full round trip: prepare, dispatch, handle.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let prepared = self.prepare(request).await;
        let mut attempt = RequestAttempt::new(prepared);

        let response = self
            .http
            .execute(attempt.request.clone())
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        self.handle(&mut attempt, response).await
    }
}
