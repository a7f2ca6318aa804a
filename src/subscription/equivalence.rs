//! Subscription equivalence.
//!
//! Parameters are canonicalized before comparison: object keys are sorted
//! recursively and integral floats collapse to integers. Two requests built
//! with the same keys in a different insertion order therefore compare equal
//! no matter how `serde_json` orders its maps.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::identifiers::SubscriptionId;

use super::SubscriptionRequest;

/// Largest float that still converts to `i64` without loss of integrality.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ============================================================================
// Canonicalization
// ============================================================================

/// Returns the canonical form of a JSON value.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(canonicalize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Number(number) => Value::Number(canonicalize_number(number)),
        other => other.clone(),
    }
}

/// Canonicalizes every value of an object and re-inserts keys in sorted order.
fn canonicalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    let sorted: BTreeMap<&String, Value> = map
        .iter()
        .map(|(key, value)| (key, canonicalize(value)))
        .collect();

    sorted
        .into_iter()
        .map(|(key, value)| (key.clone(), value))
        .collect()
}

fn canonicalize_number(number: &Number) -> Number {
    if number.is_f64()
        && let Some(float) = number.as_f64()
        && float.fract() == 0.0
        && float.abs() <= MAX_SAFE_INTEGER
    {
        return Number::from(float as i64);
    }
    number.clone()
}

/// Returns a stable string signature for a parameter map.
///
/// Equal signatures mean equal canonical parameters.
#[must_use]
pub fn params_signature(params: &Map<String, Value>) -> String {
    Value::Object(canonicalize_map(params)).to_string()
}

// ============================================================================
// Equivalence
// ============================================================================

/// Hashable identity of an equivalence class of requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    store_name: String,
    project_id: String,
    dataset: String,
    params: String,
}

impl SubscriptionKey {
    /// Derives the key of a request.
    #[must_use]
    pub fn of(request: &SubscriptionRequest) -> Self {
        Self {
            store_name: request.store_name.clone(),
            project_id: request.project_id.clone(),
            dataset: request.dataset.clone(),
            params: params_signature(&request.params),
        }
    }
}

/// Returns `true` if two requests are interchangeable.
///
/// `subscription_id`, `created_at` and `app_id` are ignored.
#[must_use]
pub fn are_equivalent(a: &SubscriptionRequest, b: &SubscriptionRequest) -> bool {
    a.store_name == b.store_name
        && a.project_id == b.project_id
        && a.dataset == b.dataset
        && canonicalize_map(&a.params) == canonicalize_map(&b.params)
}

/// Groups subscription IDs by parameter signature.
///
/// Used for diagnostics only.
#[must_use]
pub fn group_by_params<'a, I>(requests: I) -> BTreeMap<String, Vec<SubscriptionId>>
where
    I: IntoIterator<Item = &'a SubscriptionRequest>,
{
    let mut groups: BTreeMap<String, Vec<SubscriptionId>> = BTreeMap::new();
    for request in requests {
        groups
            .entry(params_signature(&request.params))
            .or_default()
            .push(request.subscription_id.clone());
    }
    groups
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    fn request(store: &str, params: Value) -> SubscriptionRequest {
        let Value::Object(params) = params else {
            panic!("params must be an object");
        };
        SubscriptionRequest::builder(store, "p1", "d1")
            .params(params)
            .build()
            .expect("build")
    }

    #[test]
    fn test_equivalent_ignores_identity_fields() {
        let a = SubscriptionRequest::builder("query", "p1", "d1")
            .app_id("tab-a")
            .created_at(1)
            .param("type", "book")
            .build()
            .expect("build");
        let b = SubscriptionRequest::builder("query", "p1", "d1")
            .app_id("tab-b")
            .created_at(2)
            .param("type", "book")
            .build()
            .expect("build");

        assert_ne!(a.subscription_id, b.subscription_id);
        assert!(are_equivalent(&a, &b));
    }

    #[test]
    fn test_not_equivalent_when_any_field_differs() {
        let base = request("query", json!({ "type": "book" }));

        let mut other = base.clone();
        other.store_name = "document".into();
        assert!(!are_equivalent(&base, &other));

        let mut other = base.clone();
        other.project_id = "p2".into();
        assert!(!are_equivalent(&base, &other));

        let mut other = base.clone();
        other.dataset = "d2".into();
        assert!(!are_equivalent(&base, &other));

        let other = request("query", json!({ "type": "author" }));
        assert!(!are_equivalent(&base, &other));
    }

    #[test]
    fn test_nested_key_order_is_irrelevant() {
        let a = request("query", json!({ "filter": { "a": 1, "b": [ { "x": 1, "y": 2 } ] } }));
        let b = request("query", json!({ "filter": { "b": [ { "y": 2, "x": 1 } ], "a": 1 } }));
        assert!(are_equivalent(&a, &b));
        assert_eq!(params_signature(&a.params), params_signature(&b.params));
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = request("query", json!({ "ids": [1, 2] }));
        let b = request("query", json!({ "ids": [2, 1] }));
        assert!(!are_equivalent(&a, &b));
    }

    #[test]
    fn test_integral_floats_match_integers() {
        let a = request("query", json!({ "limit": 10 }));
        let b = request("query", json!({ "limit": 10.0 }));
        assert!(are_equivalent(&a, &b));

        let c = request("query", json!({ "limit": 10.5 }));
        assert!(!are_equivalent(&a, &c));
    }

    #[test]
    fn test_empty_params_signature() {
        assert_eq!(params_signature(&Map::new()), "{}");
    }

    #[test]
    fn test_group_by_params() {
        let a = request("query", json!({ "type": "book" }));
        let b = request("document", json!({ "type": "book" }));
        let c = request("query", json!({ "type": "author" }));

        let groups = group_by_params([&a, &b, &c]);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[r#"{"type":"book"}"#],
            vec![a.subscription_id.clone(), b.subscription_id.clone()]
        );
        assert_eq!(groups[r#"{"type":"author"}"#], vec![c.subscription_id]);
    }

    #[test]
    fn test_subscription_key_matches_equivalence() {
        let a = request("query", json!({ "a": 1, "b": 2 }));
        let b = request("query", json!({ "b": 2, "a": 1 }));
        assert_eq!(SubscriptionKey::of(&a), SubscriptionKey::of(&b));
    }

    proptest! {
        #[test]
        fn prop_insertion_order_does_not_matter(
            entries in prop::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..8)
        ) {
            let forward: Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), json!({ "value": v, "tag": k })))
                .collect();
            let reverse: Map<String, Value> = entries
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), json!({ "tag": k, "value": f64::from(*v) })))
                .collect();

            let a = SubscriptionRequest::builder("query", "p1", "d1").params(forward).build().unwrap();
            let b = SubscriptionRequest::builder("query", "p1", "d1").params(reverse).build().unwrap();

            prop_assert!(are_equivalent(&a, &b));
            prop_assert_eq!(SubscriptionKey::of(&a), SubscriptionKey::of(&b));
        }
    }
}
