//! The coordinator: singleton owner of the subscription registry.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Coordinator`] | WebSocket server accepting tab connections |
//! | [`CoordinatorConfig`] | Bind address and limits |
//! | [`Dispatcher`] | Envelope router over the registry |

// ============================================================================
// Submodules
// ============================================================================

/// Coordinator configuration.
pub mod config;

/// Envelope dispatch.
pub mod dispatch;

/// WebSocket server and per-tab sessions.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::CoordinatorConfig;
pub use dispatch::Dispatcher;
pub use server::Coordinator;
