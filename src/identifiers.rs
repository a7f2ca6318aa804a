//! Type-safe identifiers.
//!
//! Newtype wrappers keep subscription, application and message identifiers
//! from being mixed up at compile time.
//!
//! | Type | Scope | Format |
//! |------|-------|--------|
//! | [`SubscriptionId`] | Registry-wide | `sub_{uuid-v7}` |
//! | [`AppId`] | Requesting tab | `app_{12 hex}` |
//! | [`MessageId`] | Client-local | `{TYPE}_{millis}_{9 hex}` |
//! | [`ConnectionId`] | Coordinator-local | monotonically increasing `u64` |
//! | [`ListenerId`] | Client-local | monotonically increasing `u64` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Time
// ============================================================================

/// Returns the current time as milliseconds since the Unix epoch.
#[inline]
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Returns `len` random lowercase hex characters.
fn random_suffix(len: usize) -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(len);
    suffix
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Identifier of a subscription in the coordinator registry.
///
/// Generated ids carry a time-ordered UUIDv7, so no two calls collide within
/// a coordinator's lifetime. Callers may also supply their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Generates a new unique subscription ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sub_{}", Uuid::now_v7().simple()))
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubscriptionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SubscriptionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// AppId
// ============================================================================

/// Identifier of the tab or application instance issuing a request.
///
/// Does not participate in subscription equivalence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Generates a random application ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("app_{}", random_suffix(12)))
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AppId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AppId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AppId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// MessageId
// ============================================================================

/// Client-side bookkeeping ID for a pending request.
///
/// Never transmitted; the wire envelope has no correlation field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Derives a message ID from the request type, current time and a random suffix.
    #[must_use]
    pub fn generate(message_type: &str) -> Self {
        Self(format!(
            "{message_type}_{}_{}",
            now_millis(),
            random_suffix(9)
        ))
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Global counter for connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Coordinator-side identifier of one accepted tab connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next connection ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Global counter for listener IDs.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned when subscribing to connection status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates the next listener ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Tests
// ============================================================================
