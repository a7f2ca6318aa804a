//! Subscription Hub - shared live subscriptions for many browser tabs.
//!
//! Many tabs of one application each want the same live query results.
//! Instead of every tab opening its own upstream subscription, tabs ask a
//! single coordinator to register subscriptions on their behalf. The
//! coordinator deduplicates equivalent requests so identical queries from
//! different tabs share one subscription ID.
//!
//! # Architecture
//!
//! - **Coordinator**: owns the registry and answers tab requests over WebSocket
//! - **Tab (client)**: a [`ConnectionManager`] that buffers, sends and
//!   correlates requests
//!
//! Key design principles:
//!
//! - Two requests are equivalent when store, project, dataset and params
//!   (key order ignored) match; the first registration wins
//! - The wire format is a bare `{ "type", "data" }` envelope; responses are
//!   matched to requests by type family in FIFO order
//! - Requests issued while connecting are flushed once, in order, on `welcome`
//!
//! # Quick Start
//!
//! ```no_run
//! use subscription_hub::{ConnectionManager, ConnectionOptions, Coordinator, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let coordinator = Coordinator::new().await?;
//!
//!     let tab = ConnectionManager::connect(&coordinator.ws_url(), ConnectionOptions::new())?;
//!     let request = tab
//!         .create_subscription_request("query", "p1", "production")
//!         .param("type", "book")
//!         .build()?;
//!
//!     let registered = tab.register_subscription(request).await?;
//!     println!("Subscribed as {}", registered.subscription_id);
//!
//!     tab.disconnect();
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Tab-side [`ConnectionManager`] and [`ConnectionRegistry`] |
//! | [`coordinator`] | [`Coordinator`] server and [`Dispatcher`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope and message types |
//! | [`subscription`] | Requests, equivalence and the [`SubscriptionRegistry`] |

// ============================================================================
// Modules
// ============================================================================

/// Tab-side connection management.
///
/// - [`ConnectionManager`] - Request/response channel to the coordinator
/// - [`ConnectionRegistry`] - One manager per endpoint
pub mod client;

/// Coordinator server and envelope dispatch.
pub mod coordinator;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol: envelopes and typed messages.
pub mod protocol;

/// Subscription requests, equivalence and registry.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ConnectionManager, ConnectionOptions, ConnectionRegistry, ConnectionStatus, StatusListener,
};

// Coordinator types
pub use coordinator::{Coordinator, CoordinatorConfig, Dispatcher};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{AppId, ConnectionId, ListenerId, MessageId, SubscriptionId};

// Protocol types
pub use protocol::{ClientMessage, CoordinatorMessage, Envelope, MessageType};

// Subscription types
pub use subscription::{
    ActiveSubscription, SubscriptionRegistry, SubscriptionRequest, SubscriptionRequestBuilder,
    are_equivalent,
};
