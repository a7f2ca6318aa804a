//! In-memory registry of active subscriptions.
//!
//! The registry is the single source of truth for which subscriptions are
//! live. It is owned exclusively by the coordinator; clients only ever see
//! [`SubscriptionId`]s and snapshots.
//!
//! # Deduplication
//!
//! Registering a request equivalent to an already active one returns the
//! existing ID and discards the new request, so each equivalence class has at
//! most one record at a time. Lookups go through an index keyed by
//! [`SubscriptionKey`] instead of scanning every record.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::identifiers::SubscriptionId;

use super::equivalence::{SubscriptionKey, group_by_params};
use super::{ActiveSubscription, SubscriptionRequest};

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Map of subscription identity to active record.
///
/// All operations are synchronous and total.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Records by their own subscription ID.
    subscriptions: FxHashMap<SubscriptionId, ActiveSubscription>,
    /// Equivalence index, one entry per record.
    by_key: FxHashMap<SubscriptionKey, SubscriptionId>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request, reusing an equivalent active subscription if one exists.
    ///
    /// Returns the ID of the record that now represents the request.
    pub fn register_subscription(&mut self, request: SubscriptionRequest) -> SubscriptionId {
        let key = SubscriptionKey::of(&request);

        if let Some(existing) = self.by_key.get(&key)
            && self.has_subscription(existing)
        {
            debug!(
                subscription_id = %existing,
                discarded = %request.subscription_id,
                app_id = %request.app_id,
                "Reusing equivalent subscription"
            );
            return existing.clone();
        }

        let subscription_id = request.subscription_id.clone();

        // A caller-supplied ID may collide with a record of another class.
        if let Some(previous) = self.subscriptions.remove(&subscription_id) {
            self.by_key.remove(&SubscriptionKey::of(&previous.request));
        }

        debug!(
            subscription_id = %subscription_id,
            store_name = %request.store_name,
            app_id = %request.app_id,
            "Subscription registered"
        );

        self.by_key.insert(key, subscription_id.clone());
        self.subscriptions
            .insert(subscription_id.clone(), ActiveSubscription::activate(request));

        subscription_id
    }

    /// Removes a subscription. A no-op if the ID is unknown.
    ///
    /// Returns `true` if a record was removed.
    pub fn unregister_subscription(&mut self, subscription_id: &SubscriptionId) -> bool {
        let Some(removed) = self.subscriptions.remove(subscription_id) else {
            debug!(subscription_id = %subscription_id, "Unregister for unknown subscription");
            return false;
        };

        let key = SubscriptionKey::of(&removed.request);
        if self.by_key.get(&key) == Some(subscription_id) {
            self.by_key.remove(&key);
        }

        debug!(subscription_id = %subscription_id, "Subscription unregistered");
        true
    }

    /// Returns `true` if an active record exists for the ID.
    #[inline]
    #[must_use]
    pub fn has_subscription(&self, subscription_id: &SubscriptionId) -> bool {
        self.subscriptions
            .get(subscription_id)
            .is_some_and(|s| s.is_active)
    }

    /// Returns the number of active records.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.values().filter(|s| s.is_active).count()
    }

    /// Returns a snapshot of all active records.
    ///
    /// Ordered by creation time, then ID.
    #[must_use]
    pub fn all_subscriptions(&self) -> Vec<ActiveSubscription> {
        let mut active: Vec<_> = self
            .subscriptions
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.request
                .created_at
                .cmp(&b.request.created_at)
                .then_with(|| a.subscription_id().cmp(b.subscription_id()))
        });
        active
    }

    /// Groups active subscription IDs by parameter signature.
    #[must_use]
    pub fn group_by_params(&self) -> BTreeMap<String, Vec<SubscriptionId>> {
        let active = self.all_subscriptions();
        group_by_params(active.iter().map(|s| &s.request))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn request(store: &str, project: &str, dataset: &str, kind: &str) -> SubscriptionRequest {
        SubscriptionRequest::builder(store, project, dataset)
            .param("type", kind)
            .build()
            .expect("build")
    }

    #[test]
    fn test_register_new_subscription() {
        let mut registry = SubscriptionRegistry::new();
        let req = request("query", "p1", "d1", "book");
        let expected = req.subscription_id.clone();

        let id = registry.register_subscription(req);

        assert_eq!(id, expected);
        assert!(registry.has_subscription(&id));
        assert_eq!(registry.subscription_count(), 1);
    }

    #[test]
    fn test_equivalent_requests_deduplicate() {
        let mut registry = SubscriptionRegistry::new();

        let first = registry.register_subscription(request("query", "p1", "d1", "book"));
        let second_req = SubscriptionRequest::builder("query", "p1", "d1")
            .params(
                json!({ "type": "book" })
                    .as_object()
                    .cloned()
                    .expect("object"),
            )
            .app_id("tab-b")
            .build()
            .expect("build");
        let discarded = second_req.subscription_id.clone();
        let second = registry.register_subscription(second_req);

        assert_eq!(first, second);
        assert_eq!(registry.subscription_count(), 1);
        assert!(!registry.has_subscription(&discarded));
    }

    #[test]
    fn test_distinct_requests_counted_independently() {
        let mut registry = SubscriptionRegistry::new();

        let ids = [
            registry.register_subscription(request("query", "p1", "d1", "book")),
            registry.register_subscription(request("document", "p1", "d1", "book")),
            registry.register_subscription(request("query", "p2", "d1", "book")),
            registry.register_subscription(request("query", "p1", "d2", "book")),
            registry.register_subscription(request("query", "p1", "d1", "author")),
        ];

        let unique: rustc_hash::FxHashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(registry.subscription_count(), 5);
    }

    #[test]
    fn test_unregister_then_has_is_false() {
        let mut registry = SubscriptionRegistry::new();
        let id = registry.register_subscription(request("query", "p1", "d1", "book"));

        assert!(registry.unregister_subscription(&id));
        assert!(!registry.has_subscription(&id));
        assert_eq!(registry.subscription_count(), 0);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = SubscriptionRegistry::new();
        let keep = registry.register_subscription(request("query", "p1", "d1", "book"));
        let drop = registry.register_subscription(request("query", "p1", "d1", "author"));

        assert!(registry.unregister_subscription(&drop));
        assert!(!registry.unregister_subscription(&drop));
        assert!(!registry.unregister_subscription(&SubscriptionId::from("sub_never")));

        assert_eq!(registry.subscription_count(), 1);
        assert!(registry.has_subscription(&keep));
    }

    #[test]
    fn test_register_after_unregister_creates_new_record() {
        let mut registry = SubscriptionRegistry::new();
        let first = registry.register_subscription(request("query", "p1", "d1", "book"));
        registry.unregister_subscription(&first);

        let second = registry.register_subscription(request("query", "p1", "d1", "book"));

        assert_ne!(first, second);
        assert_eq!(registry.subscription_count(), 1);
    }

    #[test]
    fn test_all_subscriptions_snapshot() {
        let mut registry = SubscriptionRegistry::new();
        registry.register_subscription(request("query", "p1", "d1", "book"));
        registry.register_subscription(request("query", "p1", "d1", "author"));

        let all = registry.all_subscriptions();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| s.is_active));
        assert!(all.iter().all(|s| s.last_update.is_some()));
    }

    #[test]
    fn test_reused_id_replaces_stale_index_entry() {
        let mut registry = SubscriptionRegistry::new();
        let book = SubscriptionRequest::builder("query", "p1", "d1")
            .subscription_id("sub_fixed")
            .param("type", "book")
            .build()
            .expect("build");
        let author = SubscriptionRequest::builder("query", "p1", "d1")
            .subscription_id("sub_fixed")
            .param("type", "author")
            .build()
            .expect("build");

        registry.register_subscription(book);
        registry.register_subscription(author);
        assert_eq!(registry.subscription_count(), 1);

        let fresh = registry.register_subscription(request("query", "p1", "d1", "book"));
        assert_ne!(fresh.as_str(), "sub_fixed");
        assert_eq!(registry.subscription_count(), 2);
    }

    #[test]
    fn test_group_by_params() {
        let mut registry = SubscriptionRegistry::new();
        registry.register_subscription(request("query", "p1", "d1", "book"));
        registry.register_subscription(request("document", "p1", "d1", "book"));
        registry.register_subscription(request("query", "p1", "d1", "author"));

        let groups = registry.group_by_params();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[r#"{"type":"book"}"#].len(), 2);
    }
}
