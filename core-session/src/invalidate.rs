//! Session invalidation
//!
//! Reacts to a failed renewal: the credential is dropped and the host is told
//! the session is over. What happens next (redirect to a login screen,
//! tearing down state) is the host's decision, delivered through the injected
//! callback and the event bus rather than a hardcoded side effect.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::events::{EventBus, SessionEvent};
use crate::store::CredentialStore;

type ExpiredCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Clears the credential store and notifies the host when a session dies.
pub struct SessionInvalidator {
    store: Arc<CredentialStore>,
    events: EventBus,
    on_expired: Mutex<Option<ExpiredCallback>>,
}

impl SessionInvalidator {
    pub fn new(store: Arc<CredentialStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            on_expired: Mutex::new(None),
        }
    }

    /// Register the host callback invoked when the session expires.
    /// Replaces any previously registered callback.
    pub fn on_session_expired<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut slot = self.on_expired.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Box::new(callback));
    }

    /// End the session: clear the store, emit `SessionExpired`, invoke the
    /// host callback. The caller (the refresh coordinator) invokes this
    /// exactly once per failed renewal cycle, however many requests queued.
    pub fn invalidate(&self, reason: &str) {
        info!(reason = %reason, "invalidating session");

        // The session is over either way; a persistence error only means a
        // stale credential may linger on disk until the next write.
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted credential");
        }

        let _ = self.events.emit(SessionEvent::SessionExpired {
            reason: reason.to_string(),
        });

        let slot = self.on_expired.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(callback) = slot.as_ref() {
            callback(reason);
        }
    }
}

impl fmt::Debug for SessionInvalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInvalidator")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_traits::storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn invalidator() -> (SessionInvalidator, Arc<CredentialStore>, EventBus) {
        let store = Arc::new(CredentialStore::load(Arc::new(MemoryStore::new()), "k"));
        let events = EventBus::new(10);
        (
            SessionInvalidator::new(store.clone(), events.clone()),
            store,
            events,
        )
    }

    #[tokio::test]
    async fn test_invalidate_clears_store_and_notifies() {
        let (invalidator, store, events) = invalidator();
        store.set("tok").unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        invalidator.on_session_expired(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut rx = events.subscribe();
        invalidator.invalidate("renewal endpoint returned status 500");

        assert_eq!(store.get(), None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::SessionExpired {
                reason: "renewal endpoint returned status 500".to_string()
            }
        );
    }

    #[test]
    fn test_invalidate_without_callback_or_subscribers() {
        let (invalidator, store, _events) = invalidator();
        store.set("tok").unwrap();

        // Nothing registered; must still clear quietly.
        invalidator.invalidate("timeout");
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_callback_registration_replaces_previous() {
        let (invalidator, _store, _events) = invalidator();

        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c = first.clone();
        invalidator.on_session_expired(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let c = second.clone();
        invalidator.on_session_expired(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        invalidator.invalidate("gone");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
