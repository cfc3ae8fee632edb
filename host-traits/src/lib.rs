//! # Host Traits
//!
//! Host abstraction traits consumed by the session core.
//!
//! ## Overview
//!
//! This crate defines the contract between the session core and the host
//! application. Each trait represents a capability the core needs but that is
//! provided differently per host (desktop, web view, tests):
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport
//! - [`KeyValueStore`](storage::KeyValueStore) - Synchronous small-state persistence
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All traits use the [`HostError`](error::HostError) type. Host
//! implementations should convert their platform-specific errors into
//! `HostError` with actionable messages.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so implementations can be shared across
//! async tasks behind `Arc<dyn Trait>`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::HostError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{KeyValueStore, MemoryStore};
pub use time::{Clock, SystemClock};
