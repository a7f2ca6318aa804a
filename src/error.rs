//! Error types for the subscription hub.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use subscription_hub::{Result, SubscriptionRequest};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     let request = SubscriptionRequest::builder("query", "p1", "production").build()?;
//!     let registered = manager.register_subscription(request).await?;
//!     manager.unregister_subscription(&registered.subscription_id).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Connection | [`Error::NotConnected`], [`Error::TransportFailed`], [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnknownMessageType`], [`Error::MessageTooLarge`], [`Error::UnexpectedResponse`] |
//! | Coordinator | [`Error::Subscription`], [`Error::Coordinator`] |
//! | Execution | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::MessageId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when coordinator or connection configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument.
    ///
    /// Returned when a subscription request is missing required fields.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The connection manager was explicitly disconnected.
    ///
    /// Requests issued in this state are rejected without being buffered.
    #[error("Not connected to coordinator")]
    NotConnected,

    /// The transport reported a failure and the manager is in the error state.
    #[error("Transport failed: {message}")]
    TransportFailed {
        /// Reason recorded when the transport failed.
        message: String,
    },

    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout waiting for the coordinator.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed while a request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or malformed envelope.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Envelope type is not part of the protocol.
    #[error("Unknown message type: {message_type}")]
    UnknownMessageType {
        /// The unrecognized `type` field.
        message_type: String,
    },

    /// Inbound frame exceeds the coordinator's size limit.
    #[error("Message too large: {size} bytes exceeds {max} byte limit")]
    MessageTooLarge {
        /// Size of the rejected frame in bytes.
        size: usize,
        /// Configured limit in bytes.
        max: usize,
    },

    /// Response type does not fit the request that was sent.
    #[error("Unexpected response type: {message_type}")]
    UnexpectedResponse {
        /// The response type that was received.
        message_type: String,
    },

    // ========================================================================
    // Coordinator Errors
    // ========================================================================
    /// The coordinator rejected a subscription operation.
    ///
    /// Carries the message from a `SUBSCRIPTION_ERROR` response.
    #[error("Subscription error: {message}")]
    Subscription {
        /// Error message reported by the coordinator.
        message: String,
    },

    /// The coordinator answered with a generic `ERROR` envelope.
    #[error("Coordinator error: {message}")]
    Coordinator {
        /// Error message reported by the coordinator.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// No matching response arrived in time.
    #[error("Message timeout: {message_id} unanswered after {timeout_ms}ms")]
    RequestTimeout {
        /// The pending message that timed out.
        message_id: MessageId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Endpoint URL could not be parsed.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a transport failure error.
    #[inline]
    pub fn transport_failed(message: impl Into<String>) -> Self {
        Self::TransportFailed {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unknown message type error.
    #[inline]
    pub fn unknown_message_type(message_type: impl Into<String>) -> Self {
        Self::UnknownMessageType {
            message_type: message_type.into(),
        }
    }

    /// Creates a message-too-large error.
    #[inline]
    pub fn message_too_large(size: usize, max: usize) -> Self {
        Self::MessageTooLarge { size, max }
    }

    /// Creates an unexpected response error.
    #[inline]
    pub fn unexpected_response(message_type: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message_type: message_type.into(),
        }
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }

    /// Creates a coordinator error.
    #[inline]
    pub fn coordinator(message: impl Into<String>) -> Self {
        Self::Coordinator {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(message_id: MessageId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            message_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::TransportFailed { .. }
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry. Retrying is left to the caller.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(
            Error::NotConnected.to_string(),
            "Not connected to coordinator"
        );
    }

    #[test]
    fn test_request_timeout_display() {
        let id = MessageId::from("REGISTER_SUBSCRIPTION_1_abc");
        let err = Error::request_timeout(id, 30_000);
        assert_eq!(
            err.to_string(),
            "Message timeout: REGISTER_SUBSCRIPTION_1_abc unanswered after 30000ms"
        );
    }

    #[test]
    fn test_message_too_large_display() {
        assert_eq!(
            Error::message_too_large(723, 200).to_string(),
            "Message too large: 723 bytes exceeds 200 byte limit"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::request_timeout(MessageId::from("x"), 10);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::transport_failed("reset").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::subscription("boom").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        let timeout_err = Error::request_timeout(MessageId::from("x"), 10);
        let config_err = Error::config("test");

        assert!(timeout_err.is_recoverable());
        assert!(!config_err.is_recoverable());
        assert!(!Error::NotConnected.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::AddrInUse, "port taken");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
