//! Subscription data model, equivalence and registry.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SubscriptionRequest`] | Logical description of a subscription |
//! | [`ActiveSubscription`] | Registry-owned record of a live subscription |
//! | [`SubscriptionRegistry`] | Deduplicating in-memory registry |
//! | [`SubscriptionKey`] | Hashable equivalence class of a request |

// ============================================================================
// Submodules
// ============================================================================

/// Canonicalization and equivalence checks.
pub mod equivalence;

/// Deduplicating registry of active subscriptions.
pub mod registry;

/// Request and record types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use equivalence::{
    SubscriptionKey, are_equivalent, canonicalize, group_by_params, params_signature,
};
pub use registry::SubscriptionRegistry;
pub use request::{ActiveSubscription, SubscriptionRequest, SubscriptionRequestBuilder};
