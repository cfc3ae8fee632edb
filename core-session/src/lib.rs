//! # Session Core
//!
//! Authenticated-request coordination: keeps a short-lived access credential
//! fresh while application code issues concurrent requests against a
//! protected backend.
//!
//! ## Overview
//!
//! A credential expires; the subsystem renews it exactly once no matter how
//! many requests are in flight when expiry is discovered, and every affected
//! request either succeeds transparently after the renewal or fails exactly
//! once with a terminal error. Renewal happens proactively (before dispatch,
//! when the credential is near expiry) and reactively (after a 401, with a
//! single bounded replay).
//!
//! ## Features
//!
//! - Single-flight renewal: one call to the renewal endpoint per cycle,
//!   shared by every waiter
//! - Proactive and reactive renewal with independent, configurable windows
//! - Retry-once replay of rejected requests; excluded paths (login,
//!   registration, the renewal endpoint itself) never trigger renewal
//! - Session invalidation through an injected callback and an event bus,
//!   not a hardcoded side effect
//! - Injectable transport, clock and persistence for deterministic tests

pub mod claims;
pub mod config;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod invalidate;
pub mod manager;
pub mod refresh;
pub mod store;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use events::{EventBus, SessionEvent};
pub use interceptor::AuthInterceptor;
pub use invalidate::SessionInvalidator;
pub use manager::SessionManager;
pub use refresh::{RefreshCoordinator, RefreshState, RequestAttempt};
pub use store::CredentialStore;
