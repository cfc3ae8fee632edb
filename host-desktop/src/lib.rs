//! # Desktop Host
//!
//! Desktop implementations of the host capability traits: a reqwest-backed
//! HTTP client and a JSON-file-backed key-value store.

pub mod http;
pub mod storage;

pub use http::ReqwestHttpClient;
pub use storage::FileStore;
