use host_traits::http::HttpResponse;
use thiserror::Error;

/// Terminal outcomes of the authenticated-request flow.
///
/// The 401-propagation variants carry the original (or final) response so the
/// caller can inspect exactly what the backend rejected with.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The renewal endpoint failed or timed out. The session has been
    /// invalidated by the time this is returned.
    #[error("Credential renewal failed: {reason}")]
    RenewalFailed {
        reason: String,
        response: Option<HttpResponse>,
    },

    /// The request was already replayed once after a renewal and was rejected
    /// again. It is never resubmitted for renewal.
    #[error("Authorization rejected after renewal; not retrying again")]
    RetryExhausted { response: HttpResponse },

    /// An authorization failure on a path for which renewal is never
    /// attempted (the renewal endpoint itself, login, registration).
    #[error("Authorization rejected on excluded path {path}")]
    ExcludedPath {
        path: String,
        response: HttpResponse,
    },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Login failed with status {status}")]
    LoginFailed { status: u16 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
