//! Wire protocol between tabs and the coordinator.
//!
//! # Protocol Overview
//!
//! | Request | Response | Failure |
//! |---------|----------|---------|
//! | `REGISTER_SUBSCRIPTION` | `SUBSCRIPTION_REGISTERED` | `SUBSCRIPTION_ERROR` |
//! | `UNREGISTER_SUBSCRIPTION` | `SUBSCRIPTION_UNREGISTERED` | `SUBSCRIPTION_ERROR` |
//! | `GET_SUBSCRIPTION_COUNT` | `SUBSCRIPTION_COUNT` | `ERROR` |
//! | `GET_ALL_SUBSCRIPTIONS` | `ALL_SUBSCRIPTIONS` | `ERROR` |
//!
//! The coordinator sends `welcome` once per new connection, before any
//! response. Unknown request types are answered with `ERROR`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Raw `{type, data}` unit and [`MessageType`] |
//! | `message` | Typed [`ClientMessage`] and [`CoordinatorMessage`] |

// ============================================================================
// Submodules
// ============================================================================

/// Raw envelope and message types.
pub mod envelope;

/// Typed messages and payloads.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, MessageType};
pub use message::{
    AllSubscriptionsPayload, ClientMessage, CoordinatorMessage, CountPayload, ErrorPayload,
    SubscriptionErrorPayload, SubscriptionIdPayload, WelcomePayload,
};
