//! # Session Event Bus
//!
//! Typed session lifecycle events over `tokio::sync::broadcast`, so hosts can
//! react to renewals and expiry without the subsystem hardcoding a side
//! effect (navigation, UI state) anywhere.
//!
//! ## Usage
//!
//! ```rust
//! use core_session::events::{EventBus, SessionEvent};
//!
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::SignedIn).ok();
//! assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedIn);
//! ```
//!
//! Subscribers that fall behind receive `RecvError::Lagged` and can keep
//! consuming newer events; `RecvError::Closed` signals shutdown.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Session lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A login completed and an access credential is in place.
    SignedIn,
    /// The session ended through an explicit logout.
    SignedOut,
    /// A renewal call is in flight.
    Refreshing,
    /// A renewal completed and the stored credential was replaced.
    Refreshed {
        /// Expiry hint of the new credential (Unix epoch seconds), when it
        /// could be decoded.
        expires_at: Option<i64>,
    },
    /// A renewal failed and the session was invalidated. Emitted exactly once
    /// per failed renewal cycle, however many requests were queued on it.
    SessionExpired {
        /// Human-readable failure reason.
        reason: String,
    },
}

impl SessionEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            SessionEvent::SignedIn => "User signed in",
            SessionEvent::SignedOut => "User signed out",
            SessionEvent::Refreshing => "Renewing access credential",
            SessionEvent::Refreshed { .. } => "Access credential renewed",
            SessionEvent::SessionExpired { .. } => "Session expired",
        }
    }
}

/// Broadcast bus for [`SessionEvent`]s.
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when there are none. Emission with no listeners is not a failure of
    /// the session flow; callers ignore the result.
    pub fn emit(&self, event: SessionEvent) -> Result<usize, SendError<SessionEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber receiving events emitted from now on.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
