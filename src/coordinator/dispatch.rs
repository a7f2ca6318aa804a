//! Envelope dispatch against the subscription registry.
//!
//! The dispatcher is the only owner of the [`SubscriptionRegistry`]. Every
//! inbound envelope is handled to completion under one lock, so registry
//! mutations from different tabs are serialized.
//!
//! Dispatch is total: every input, including malformed JSON and unknown
//! types, produces exactly one response envelope.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{
    AllSubscriptionsPayload, ClientMessage, CoordinatorMessage, CountPayload, Envelope,
    MessageType, SubscriptionIdPayload,
};
use crate::subscription::{ActiveSubscription, SubscriptionRegistry};

// ============================================================================
// Envelope Head
// ============================================================================

/// The routing fields of an envelope, read without keeping the payload.
#[derive(Deserialize)]
struct EnvelopeHead {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    data: Option<HeadData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadData {
    #[serde(default)]
    subscription_id: Option<Value>,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes request envelopes to registry operations.
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Mutex<SubscriptionRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a text frame and dispatches it.
    #[must_use]
    pub fn dispatch_text(&self, text: &str) -> Envelope {
        match Envelope::from_json(text) {
            Ok(envelope) => self.dispatch(envelope),
            Err(e) => {
                warn!(error = %e, "Malformed envelope");
                CoordinatorMessage::error(format!("Malformed envelope: {e}")).to_envelope()
            }
        }
    }

    /// Dispatches an envelope and returns the response envelope.
    #[must_use]
    pub fn dispatch(&self, envelope: Envelope) -> Envelope {
        let kind = match envelope.kind() {
            Ok(kind) if kind.is_request() => kind,
            _ => {
                warn!(message_type = %envelope.message_type, "Unknown message type");
                return CoordinatorMessage::error(format!(
                    "Unknown message type: {}",
                    envelope.message_type
                ))
                .to_envelope();
            }
        };

        // Read before conversion consumes the envelope.
        let named_id = envelope
            .data
            .get("subscriptionId")
            .and_then(Value::as_str)
            .map(SubscriptionId::from);

        let result = ClientMessage::try_from(envelope).and_then(|message| self.handle(message));

        match result {
            Ok(response) => response.to_envelope(),
            Err(e) => {
                warn!(message_type = %kind, error = %e, "Request failed");
                Self::failure(kind, &e, named_id).to_envelope()
            }
        }
    }

    /// Executes a typed request.
    fn handle(&self, message: ClientMessage) -> Result<CoordinatorMessage> {
        match message {
            ClientMessage::RegisterSubscription(request) => {
                request.validate()?;
                let subscription_id = self.registry.lock().register_subscription(request);
                Ok(CoordinatorMessage::SubscriptionRegistered(
                    SubscriptionIdPayload { subscription_id },
                ))
            }

            ClientMessage::UnregisterSubscription(payload) => {
                if payload.subscription_id.as_str().is_empty() {
                    return Err(Error::invalid_argument("subscriptionId must not be empty"));
                }
                self.registry
                    .lock()
                    .unregister_subscription(&payload.subscription_id);
                Ok(CoordinatorMessage::SubscriptionUnregistered(payload))
            }

            ClientMessage::GetSubscriptionCount => {
                let count = self.registry.lock().subscription_count();
                debug!(count, "Subscription count requested");
                Ok(CoordinatorMessage::SubscriptionCount(CountPayload { count }))
            }

            ClientMessage::GetAllSubscriptions => {
                let subscriptions = self.registry.lock().all_subscriptions();
                Ok(CoordinatorMessage::AllSubscriptions(
                    AllSubscriptionsPayload { subscriptions },
                ))
            }
        }
    }

    /// Answers a frame that is rejected before dispatch.
    ///
    /// Only the envelope's `type` and `data.subscriptionId` are read, so the
    /// failure reaches the request family that sent it. Frames whose type is
    /// not a request get `ERROR`.
    #[must_use]
    pub fn reject_text(text: &str, error: &Error) -> Envelope {
        let head = serde_json::from_str::<EnvelopeHead>(text).ok();
        let kind = head
            .as_ref()
            .and_then(|head| head.message_type.parse::<MessageType>().ok())
            .filter(MessageType::is_request);

        let Some(kind) = kind else {
            return CoordinatorMessage::error(error.to_string()).to_envelope();
        };

        let named_id = head
            .and_then(|head| head.data)
            .and_then(|data| data.subscription_id)
            .and_then(|id| id.as_str().map(SubscriptionId::from));

        Self::failure(kind, error, named_id).to_envelope()
    }

    /// Builds the failure response for a request type.
    fn failure(
        kind: MessageType,
        error: &Error,
        subscription_id: Option<SubscriptionId>,
    ) -> CoordinatorMessage {
        match kind {
            MessageType::RegisterSubscription | MessageType::UnregisterSubscription => {
                CoordinatorMessage::subscription_error(error.to_string(), subscription_id)
            }
            _ => CoordinatorMessage::error(error.to_string()),
        }
    }
}

// ============================================================================
// Dispatcher - Diagnostics
// ============================================================================

impl Dispatcher {
    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.registry.lock().subscription_count()
    }

    /// Returns `true` if the subscription is active.
    #[must_use]
    pub fn has_subscription(&self, subscription_id: &SubscriptionId) -> bool {
        self.registry.lock().has_subscription(subscription_id)
    }

    /// Returns a snapshot of active subscriptions.
    #[must_use]
    pub fn all_subscriptions(&self) -> Vec<ActiveSubscription> {
        self.registry.lock().all_subscriptions()
    }

    /// Groups active subscription IDs by parameter signature.
    #[must_use]
    pub fn group_by_params(&self) -> BTreeMap<String, Vec<SubscriptionId>> {
        self.registry.lock().group_by_params()
    }
}

// ============================================================================
// Tests
// ============================================================================
