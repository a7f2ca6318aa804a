//! Client connection options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use subscription_hub::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_app_id("studio-tab-1")
//!     .with_request_timeout(Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::identifiers::AppId;

// ============================================================================
// Constants
// ============================================================================

/// Default time a request waits for its response (30s).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed to open the WebSocket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of unanswered requests.
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Options for a [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Time a request waits for a matching response.
    pub request_timeout: Duration,

    /// Time allowed for the TCP connect and WebSocket handshake.
    pub connect_timeout: Duration,

    /// Pending requests allowed before new ones are rejected.
    pub max_pending_requests: usize,

    /// Identity stamped on requests built through the manager.
    pub app_id: AppId,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionOptions {
    /// Creates options with default timeouts and a random [`AppId`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            app_id: AppId::generate(),
        }
    }

    /// Sets the request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the pending request limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Sets the application ID.
    #[inline]
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<AppId>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout or the pending limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        if self.max_pending_requests == 0 {
            return Err(Error::config("max_pending_requests must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
