//! Session configuration
//!
//! All timing knobs and endpoint paths live here so hosts and tests can tune
//! them; nothing in the subsystem hardcodes a duration or a URL.

use std::time::Duration;

/// Buffer under which a credential is treated as already expired (reactive).
pub const DEFAULT_REACTIVE_BUFFER: Duration = Duration::from_secs(30);

/// Window under which a credential counts as near expiry (proactive renewal).
pub const DEFAULT_PROACTIVE_THRESHOLD: Duration = Duration::from_secs(300);

/// Bound on the renewal and lifecycle HTTP calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Storage key the access credential is persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "session.access_token";

/// Session subsystem configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the identity provider, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Path of the renewal endpoint.
    pub refresh_path: String,
    /// Path of the login endpoint.
    pub login_path: String,
    /// Path of the registration endpoint.
    pub register_path: String,
    /// Path of the logout endpoint.
    pub logout_path: String,
    /// A credential within this buffer of its expiry is treated as expired.
    pub reactive_buffer: Duration,
    /// A credential within this window of its expiry triggers proactive renewal.
    pub proactive_threshold: Duration,
    /// Timeout for the renewal, login and logout calls.
    pub request_timeout: Duration,
    /// Key the access credential is persisted under.
    pub storage_key: String,
    /// Buffer capacity of the session event bus.
    pub event_capacity: usize,
}

impl SessionConfig {
    /// Configuration with default paths and timings against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn refresh_url(&self) -> String {
        format!("{}{}", self.base_url, self.refresh_path)
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, self.login_path)
    }

    pub fn logout_url(&self) -> String {
        format!("{}{}", self.base_url, self.logout_path)
    }

    /// Whether an authorization failure on `path` must never trigger renewal.
    ///
    /// The renewal endpoint itself is excluded to prevent infinite recursion;
    /// login and registration are excluded because there is no session to
    /// renew on their behalf.
    pub fn is_excluded(&self, path: &str) -> bool {
        path == self.refresh_path || path == self.login_path || path == self.register_path
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/auth/login".to_string(),
            register_path: "/auth/register".to_string(),
            logout_path: "/auth/logout".to_string(),
            reactive_buffer: DEFAULT_REACTIVE_BUFFER,
            proactive_threshold: DEFAULT_PROACTIVE_THRESHOLD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            event_capacity: 100,
        }
    }
}
