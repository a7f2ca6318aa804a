//! Tab-side connection to the coordinator.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Buffered request/response channel to one coordinator |
//! | [`ConnectionRegistry`] | One manager per endpoint |
//! | [`ConnectionOptions`] | Timeouts, limits and app identity |
//! | [`ConnectionStatus`] | Manager lifecycle state |

// ============================================================================
// Submodules
// ============================================================================

/// Connection manager and its event loop.
pub mod connection;

/// Connection options.
pub mod options;

/// Per-endpoint manager registry.
pub mod registry;

/// Connection status and listeners.
pub mod status;

mod pending;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::ConnectionManager;
pub use options::ConnectionOptions;
pub use registry::ConnectionRegistry;
pub use status::{ConnectionStatus, StatusListener};
