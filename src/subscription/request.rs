//! Subscription request and active-subscription records.
//!
//! # Format
//!
//! ```json
//! {
//!   "subscriptionId": "sub_0192...",
//!   "storeName": "query",
//!   "projectId": "p1",
//!   "dataset": "production",
//!   "params": { "type": "book" },
//!   "createdAt": 1760000000000,
//!   "appId": "app_3f2a9c0d1e7b"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{AppId, SubscriptionId, now_millis};

// ============================================================================
// SubscriptionRequest
// ============================================================================

/// Logical description of a desired subscription.
///
/// Two requests are equivalent when `store_name`, `project_id`, `dataset`
/// and `params` match. See [`are_equivalent`](super::are_equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// Caller-supplied or generated identifier.
    pub subscription_id: SubscriptionId,

    /// Logical subscription kind, e.g. `"query"` or `"document"`.
    pub store_name: String,

    /// Project the subscription reads from.
    pub project_id: String,

    /// Dataset within the project.
    pub dataset: String,

    /// Subscription parameters.
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Creation time in epoch milliseconds.
    #[serde(default = "now_millis")]
    pub created_at: u64,

    /// Requesting tab or application instance.
    pub app_id: AppId,
}

impl SubscriptionRequest {
    /// Creates a builder for a request of the given kind.
    #[inline]
    #[must_use]
    pub fn builder(
        store_name: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> SubscriptionRequestBuilder {
        SubscriptionRequestBuilder::new(store_name, project_id, dataset)
    }

    /// Checks that the fields taking part in equivalence are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        if self.subscription_id.as_str().is_empty() {
            return Err(Error::invalid_argument("subscriptionId must not be empty"));
        }
        if self.store_name.is_empty() {
            return Err(Error::invalid_argument("storeName must not be empty"));
        }
        if self.project_id.is_empty() {
            return Err(Error::invalid_argument("projectId must not be empty"));
        }
        if self.dataset.is_empty() {
            return Err(Error::invalid_argument("dataset must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// SubscriptionRequestBuilder
// ============================================================================

/// Builder for [`SubscriptionRequest`].
///
/// Missing optional fields are filled in by [`build`](Self::build):
/// a fresh [`SubscriptionId`], empty `params`, the current time and a
/// random [`AppId`].
#[derive(Debug, Clone)]
pub struct SubscriptionRequestBuilder {
    store_name: String,
    project_id: String,
    dataset: String,
    params: Map<String, Value>,
    subscription_id: Option<SubscriptionId>,
    app_id: Option<AppId>,
    created_at: Option<u64>,
}

impl SubscriptionRequestBuilder {
    /// Creates a builder with the required fields.
    #[must_use]
    pub fn new(
        store_name: impl Into<String>,
        project_id: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            project_id: project_id.into(),
            dataset: dataset.into(),
            params: Map::new(),
            subscription_id: None,
            app_id: None,
            created_at: None,
        }
    }

    /// Replaces all parameters.
    #[inline]
    #[must_use]
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Sets a single parameter.
    #[inline]
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Uses a caller-supplied subscription ID.
    #[inline]
    #[must_use]
    pub fn subscription_id(mut self, id: impl Into<SubscriptionId>) -> Self {
        self.subscription_id = Some(id.into());
        self
    }

    /// Sets the requesting application ID.
    #[inline]
    #[must_use]
    pub fn app_id(mut self, app_id: impl Into<AppId>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Overrides the creation timestamp (epoch milliseconds).
    #[inline]
    #[must_use]
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `store_name`, `project_id`,
    /// `dataset` or a supplied subscription ID is empty.
    pub fn build(self) -> Result<SubscriptionRequest> {
        let request = SubscriptionRequest {
            subscription_id: self
                .subscription_id
                .unwrap_or_else(SubscriptionId::generate),
            store_name: self.store_name,
            project_id: self.project_id,
            dataset: self.dataset,
            params: self.params,
            created_at: self.created_at.unwrap_or_else(now_millis),
            app_id: self.app_id.unwrap_or_default(),
        };
        request.validate()?;
        Ok(request)
    }
}

// ============================================================================
// ActiveSubscription
// ============================================================================

/// A registered subscription as held by the coordinator registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSubscription {
    /// The request that created this record.
    #[serde(flatten)]
    pub request: SubscriptionRequest,

    /// Whether the subscription is live.
    pub is_active: bool,

    /// Last time the registry touched this record (epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<u64>,
}

impl ActiveSubscription {
    /// Wraps a freshly accepted request as an active record.
    #[must_use]
    pub fn activate(request: SubscriptionRequest) -> Self {
        Self {
            request,
            is_active: true,
            last_update: Some(now_millis()),
        }
    }

    /// Returns the subscription ID.
    #[inline]
    #[must_use]
    pub fn subscription_id(&self) -> &SubscriptionId {
        &self.request.subscription_id
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let request = SubscriptionRequest::builder("query", "p1", "d1")
            .build()
            .expect("build");

        assert!(request.subscription_id.as_str().starts_with("sub_"));
        assert!(request.params.is_empty());
        assert!(request.created_at > 0);
        assert!(request.app_id.as_str().starts_with("app_"));
    }

    #[test]
    fn test_builder_keeps_supplied_fields() {
        let request = SubscriptionRequest::builder("document", "p1", "d1")
            .subscription_id("sub_custom")
            .app_id("studio")
            .created_at(42)
            .param("id", "doc-1")
            .build()
            .expect("build");

        assert_eq!(request.subscription_id.as_str(), "sub_custom");
        assert_eq!(request.app_id.as_str(), "studio");
        assert_eq!(request.created_at, 42);
        assert_eq!(request.params.get("id"), Some(&json!("doc-1")));
    }

    #[test]
    fn test_builder_rejects_empty_fields() {
        let err = SubscriptionRequest::builder("", "p1", "d1")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("storeName"));

        let err = SubscriptionRequest::builder("query", "p1", "")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("dataset"));
    }

    #[test]
    fn test_request_wire_format() {
        let request = SubscriptionRequest::builder("query", "p1", "d1")
            .subscription_id("sub_1")
            .app_id("app_a")
            .created_at(7)
            .param("type", "book")
            .build()
            .expect("build");

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "subscriptionId": "sub_1",
                "storeName": "query",
                "projectId": "p1",
                "dataset": "d1",
                "params": { "type": "book" },
                "createdAt": 7,
                "appId": "app_a"
            })
        );
    }

    #[test]
    fn test_request_params_default_when_absent() {
        let request: SubscriptionRequest = serde_json::from_value(json!({
            "subscriptionId": "sub_1",
            "storeName": "query",
            "projectId": "p1",
            "dataset": "d1",
            "appId": "app_a"
        }))
        .expect("deserialize");

        assert!(request.params.is_empty());
        assert!(request.created_at > 0);
    }

    #[test]
    fn test_active_subscription_flattens_request() {
        let request = SubscriptionRequest::builder("query", "p1", "d1")
            .subscription_id("sub_1")
            .build()
            .expect("build");
        let active = ActiveSubscription::activate(request);

        let value = serde_json::to_value(&active).expect("serialize");
        assert_eq!(value["subscriptionId"], json!("sub_1"));
        assert_eq!(value["isActive"], json!(true));
        assert!(value["lastUpdate"].is_u64());
    }
}
