//! Coordinator configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::net::{IpAddr, Ipv4Addr};
//! use subscription_hub::CoordinatorConfig;
//!
//! let config = CoordinatorConfig::new()
//!     .with_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
//!     .with_port(7400)
//!     .with_max_message_size(64 * 1024);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (localhost).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default maximum inbound text frame size (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

// ============================================================================
// CoordinatorConfig
// ============================================================================

/// Coordinator server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// IP address to bind to.
    pub ip: IpAddr,

    /// Port to bind to (0 = OS-assigned).
    pub port: u16,

    /// Largest text frame the coordinator will dispatch.
    pub max_message_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorConfig {
    /// Creates a configuration bound to `127.0.0.1` on a random port.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ip: DEFAULT_BIND_IP,
            port: 0,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Sets the bind IP.
    #[inline]
    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = ip;
        self
    }

    /// Sets the bind port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the maximum inbound text frame size in bytes.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Returns the socket address to bind.
    #[inline]
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_message_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(Error::config("max_message_size must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.ip, DEFAULT_BIND_IP);
        assert_eq!(config.port, 0);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = CoordinatorConfig::new()
            .with_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .with_port(7400)
            .with_max_message_size(2048);

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:7400");
        assert_eq!(config.max_message_size, 2048);
    }

    #[test]
    fn test_zero_message_size_rejected() {
        let err = CoordinatorConfig::new()
            .with_max_message_size(0)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_message_size"));
    }
}
