//! Connection status and status-change listeners.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::identifiers::ListenerId;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Lifecycle state of a [`ConnectionManager`](super::ConnectionManager).
///
/// ```text
/// disconnected ──connect──► connecting ──welcome──► connected
///       ▲                        │                      │
///       └──────disconnect────────┴──────────────────────┤
///                                                       │
///                  error ◄──── transport failure ───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Transport is being established; requests are buffered.
    Connecting,
    /// `welcome` received; requests are sent immediately.
    Connected,
    /// Explicitly disconnected; requests are rejected.
    Disconnected,
    /// Transport failed; requests are rejected.
    Error,
}

impl ConnectionStatus {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }

    /// Returns `true` if requests are accepted in this state.
    #[inline]
    #[must_use]
    pub const fn accepts_requests(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// StatusListeners
// ============================================================================

/// Status-change callback.
pub type StatusListener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Set of registered status listeners.
#[derive(Default)]
pub(crate) struct StatusListeners {
    listeners: Mutex<FxHashMap<ListenerId, StatusListener>>,
}

impl StatusListeners {
    /// Registers a listener.
    pub(crate) fn subscribe(&self, listener: StatusListener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().insert(id, listener);
        id
    }

    /// Removes a listener. Returns `true` if it was registered.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Calls every listener with the new status.
    ///
    /// Listeners run outside the lock so they may (un)subscribe.
    pub(crate) fn notify(&self, status: ConnectionStatus) {
        let listeners: Vec<StatusListener> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(status);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_status_names() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Disconnected).expect("json"),
            "\"disconnected\""
        );
    }

    #[test]
    fn test_accepts_requests() {
        assert!(ConnectionStatus::Connecting.accepts_requests());
        assert!(ConnectionStatus::Connected.accepts_requests());
        assert!(!ConnectionStatus::Disconnected.accepts_requests());
        assert!(!ConnectionStatus::Error.accepts_requests());
    }

    #[test]
    fn test_subscribe_notify_unsubscribe() {
        let listeners = StatusListeners::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = listeners.subscribe(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        listeners.notify(ConnectionStatus::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));

        listeners.notify(ConnectionStatus::Error);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
