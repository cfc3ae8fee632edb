//! Credential store
//!
//! Process-wide holder of the current access credential, cached in memory and
//! written through to the host's key-value store under a fixed key so the
//! credential survives a restart within the same authenticated session. The
//! renewal credential is never stored here.

use host_traits::storage::KeyValueStore;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// Holder of the current access credential.
///
/// Reads are served from the in-memory cache and are infallible; writes go
/// through to persistence. Created at session setup, populated at login or
/// hydration, replaced on each successful renewal, emptied at logout or
/// renewal failure.
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    cached: RwLock<Option<String>>,
}

impl CredentialStore {
    /// Create the store and hydrate the cache from persistence.
    ///
    /// A persistence read failure degrades to an empty store; the session
    /// simply starts unauthenticated.
    pub fn load(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let cached = match storage.get(&key) {
            Ok(value) => {
                if value.is_some() {
                    debug!("hydrated access credential from storage");
                }
                value
            }
            Err(e) => {
                warn!(error = %e, "could not read persisted credential; starting empty");
                None
            }
        };

        Self {
            storage,
            key,
            cached: RwLock::new(cached),
        }
    }

    /// Current access credential, if any.
    pub fn get(&self) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the credential, writing through to persistence.
    pub fn set(&self, credential: &str) -> Result<()> {
        {
            let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
            *cached = Some(credential.to_string());
        }
        self.storage
            .set(&self.key, credential)
            .map_err(|e| SessionError::Storage(e.to_string()))
    }

    /// Drop the credential from cache and persistence.
    pub fn clear(&self) -> Result<()> {
        {
            let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
            *cached = None;
        }
        self.storage
            .remove(&self.key)
            .map_err(|e| SessionError::Storage(e.to_string()))
    }
}

// The credential never appears in logs.
impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self
            .cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some();
        f.debug_struct("CredentialStore")
            .field("key", &self.key)
            .field("credential", &if present { "[REDACTED]" } else { "[NONE]" })
            .finish()
    }
}
