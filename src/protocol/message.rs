//! Typed request and response messages.
//!
//! [`ClientMessage`] and [`CoordinatorMessage`] are closed unions over the
//! request and response types. Both convert to and from [`Envelope`] with an
//! exhaustive match, so adding a type means touching every dispatcher.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, json, to_value};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, SubscriptionId};
use crate::subscription::{ActiveSubscription, SubscriptionRequest};

use super::{Envelope, MessageType};

// ============================================================================
// Payloads
// ============================================================================

/// Payload naming a single subscription.
///
/// Used by `UNREGISTER_SUBSCRIPTION`, `SUBSCRIPTION_REGISTERED` and
/// `SUBSCRIPTION_UNREGISTERED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionIdPayload {
    /// The subscription concerned.
    pub subscription_id: SubscriptionId,
}

/// `SUBSCRIPTION_COUNT` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPayload {
    /// Number of active subscriptions.
    pub count: usize,
}

/// `ALL_SUBSCRIPTIONS` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllSubscriptionsPayload {
    /// Snapshot of active subscriptions.
    pub subscriptions: Vec<ActiveSubscription>,
}

/// `SUBSCRIPTION_ERROR` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionErrorPayload {
    /// Human-readable failure.
    pub error: String,

    /// Subscription the failed request named, if it could be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<SubscriptionId>,
}

/// `ERROR` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable failure.
    pub error: String,
}

/// `welcome` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    /// Coordinator-side ID of this connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
}

// ============================================================================
// ClientMessage
// ============================================================================

/// A request from a tab to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `REGISTER_SUBSCRIPTION`.
    RegisterSubscription(SubscriptionRequest),
    /// `UNREGISTER_SUBSCRIPTION`.
    UnregisterSubscription(SubscriptionIdPayload),
    /// `GET_SUBSCRIPTION_COUNT`.
    GetSubscriptionCount,
    /// `GET_ALL_SUBSCRIPTIONS`.
    GetAllSubscriptions,
}

impl ClientMessage {
    /// Creates an unregister request.
    #[inline]
    #[must_use]
    pub fn unregister(subscription_id: SubscriptionId) -> Self {
        Self::UnregisterSubscription(SubscriptionIdPayload { subscription_id })
    }

    /// Returns the wire type of this message.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::RegisterSubscription(_) => MessageType::RegisterSubscription,
            Self::UnregisterSubscription(_) => MessageType::UnregisterSubscription,
            Self::GetSubscriptionCount => MessageType::GetSubscriptionCount,
            Self::GetAllSubscriptions => MessageType::GetAllSubscriptions,
        }
    }

    /// Converts the message into a wire envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let data = match self {
            Self::RegisterSubscription(request) => to_value(request)?,
            Self::UnregisterSubscription(payload) => to_value(payload)?,
            Self::GetSubscriptionCount | Self::GetAllSubscriptions => Value::Null,
        };
        Ok(Envelope::new(self.message_type(), data))
    }
}

impl TryFrom<Envelope> for ClientMessage {
    type Error = Error;

    fn try_from(envelope: Envelope) -> Result<Self> {
        let kind = envelope.kind()?;
        match kind {
            MessageType::RegisterSubscription => {
                Ok(Self::RegisterSubscription(from_value(envelope.data)?))
            }
            MessageType::UnregisterSubscription => {
                Ok(Self::UnregisterSubscription(from_value(envelope.data)?))
            }
            MessageType::GetSubscriptionCount => Ok(Self::GetSubscriptionCount),
            MessageType::GetAllSubscriptions => Ok(Self::GetAllSubscriptions),
            MessageType::SubscriptionRegistered
            | MessageType::SubscriptionUnregistered
            | MessageType::SubscriptionCount
            | MessageType::AllSubscriptions
            | MessageType::SubscriptionError
            | MessageType::Error
            | MessageType::Welcome => Err(Error::unknown_message_type(kind.as_str())),
        }
    }
}

// ============================================================================
// CoordinatorMessage
// ============================================================================

/// A message from the coordinator to a tab.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorMessage {
    /// `SUBSCRIPTION_REGISTERED`.
    SubscriptionRegistered(SubscriptionIdPayload),
    /// `SUBSCRIPTION_UNREGISTERED`.
    SubscriptionUnregistered(SubscriptionIdPayload),
    /// `SUBSCRIPTION_COUNT`.
    SubscriptionCount(CountPayload),
    /// `ALL_SUBSCRIPTIONS`.
    AllSubscriptions(AllSubscriptionsPayload),
    /// `SUBSCRIPTION_ERROR`.
    SubscriptionError(SubscriptionErrorPayload),
    /// `ERROR`.
    Error(ErrorPayload),
    /// `welcome`.
    Welcome(WelcomePayload),
}

impl CoordinatorMessage {
    /// Creates a `SUBSCRIPTION_ERROR` message.
    #[must_use]
    pub fn subscription_error(
        error: impl Into<String>,
        subscription_id: Option<SubscriptionId>,
    ) -> Self {
        Self::SubscriptionError(SubscriptionErrorPayload {
            error: error.into(),
            subscription_id,
        })
    }

    /// Creates a generic `ERROR` message.
    #[must_use]
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            error: error.into(),
        })
    }

    /// Returns the wire type of this message.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::SubscriptionRegistered(_) => MessageType::SubscriptionRegistered,
            Self::SubscriptionUnregistered(_) => MessageType::SubscriptionUnregistered,
            Self::SubscriptionCount(_) => MessageType::SubscriptionCount,
            Self::AllSubscriptions(_) => MessageType::AllSubscriptions,
            Self::SubscriptionError(_) => MessageType::SubscriptionError,
            Self::Error(_) => MessageType::Error,
            Self::Welcome(_) => MessageType::Welcome,
        }
    }

    /// Converts the message into a wire envelope.
    ///
    /// Serialization of these payloads cannot fail; a failure still yields a
    /// well-formed `ERROR` envelope.
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        let data = match self {
            Self::SubscriptionRegistered(p) | Self::SubscriptionUnregistered(p) => to_value(p),
            Self::SubscriptionCount(p) => to_value(p),
            Self::AllSubscriptions(p) => to_value(p),
            Self::SubscriptionError(p) => to_value(p),
            Self::Error(p) => to_value(p),
            Self::Welcome(p) => to_value(p),
        };

        match data {
            Ok(data) => Envelope::new(self.message_type(), data),
            Err(e) => Envelope::new(
                MessageType::Error,
                json!({ "error": format!("Failed to encode response: {e}") }),
            ),
        }
    }
}

impl TryFrom<Envelope> for CoordinatorMessage {
    type Error = Error;

    fn try_from(envelope: Envelope) -> Result<Self> {
        let kind = envelope.kind()?;
        let data = envelope.data;
        match kind {
            MessageType::SubscriptionRegistered => {
                Ok(Self::SubscriptionRegistered(from_value(data)?))
            }
            MessageType::SubscriptionUnregistered => {
                Ok(Self::SubscriptionUnregistered(from_value(data)?))
            }
            MessageType::SubscriptionCount => Ok(Self::SubscriptionCount(from_value(data)?)),
            MessageType::AllSubscriptions => Ok(Self::AllSubscriptions(from_value(data)?)),
            MessageType::SubscriptionError => Ok(Self::SubscriptionError(from_value(data)?)),
            MessageType::Error => Ok(CoordinatorMessage::Error(from_value(data)?)),
            MessageType::Welcome if data.is_null() => Ok(Self::Welcome(WelcomePayload::default())),
            MessageType::Welcome => Ok(Self::Welcome(from_value(data)?)),
            MessageType::RegisterSubscription
            | MessageType::UnregisterSubscription
            | MessageType::GetSubscriptionCount
            | MessageType::GetAllSubscriptions => {
                Err(Error::unknown_message_type(kind.as_str()))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_envelope_carries_request() {
        let request = SubscriptionRequest::builder("query", "p1", "d1")
            .subscription_id("sub_1")
            .build()
            .expect("build");
        let envelope = ClientMessage::RegisterSubscription(request)
            .to_envelope()
            .expect("envelope");

        assert_eq!(envelope.message_type, "REGISTER_SUBSCRIPTION");
        assert_eq!(envelope.data["subscriptionId"], json!("sub_1"));
        assert_eq!(envelope.data["storeName"], json!("query"));
    }

    #[test]
    fn test_query_envelopes_have_no_data() {
        let json = ClientMessage::GetSubscriptionCount
            .to_envelope()
            .expect("envelope")
            .to_json()
            .expect("json");
        assert_eq!(json, r#"{"type":"GET_SUBSCRIPTION_COUNT","data":null}"#);
    }

    #[test]
    fn test_client_message_from_envelope() {
        let envelope = Envelope::from_json(
            r#"{"type":"UNREGISTER_SUBSCRIPTION","data":{"subscriptionId":"sub_9"}}"#,
        )
        .expect("parse");

        let message = ClientMessage::try_from(envelope).expect("convert");
        assert_eq!(message, ClientMessage::unregister("sub_9".into()));
    }

    #[test]
    fn test_client_message_rejects_response_types() {
        let envelope = Envelope::new(MessageType::Welcome, Value::Null);
        assert!(matches!(
            ClientMessage::try_from(envelope),
            Err(Error::UnknownMessageType { .. })
        ));
    }

    #[test]
    fn test_client_message_rejects_malformed_register() {
        let envelope = Envelope::new(
            MessageType::RegisterSubscription,
            json!({ "storeName": "query" }),
        );
        assert!(matches!(
            ClientMessage::try_from(envelope),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_subscription_error_wire_format() {
        let envelope =
            CoordinatorMessage::subscription_error("boom", Some("sub_1".into())).to_envelope();
        assert_eq!(
            envelope.to_json().expect("json"),
            r#"{"type":"SUBSCRIPTION_ERROR","data":{"error":"boom","subscriptionId":"sub_1"}}"#
        );
    }

    #[test]
    fn test_coordinator_message_from_envelope() {
        let envelope =
            Envelope::from_json(r#"{"type":"SUBSCRIPTION_COUNT","data":{"count":3}}"#)
                .expect("parse");
        assert_eq!(
            CoordinatorMessage::try_from(envelope).expect("convert"),
            CoordinatorMessage::SubscriptionCount(CountPayload { count: 3 })
        );
    }

    #[test]
    fn test_welcome_accepts_missing_data() {
        let envelope = Envelope::from_json(r#"{"type":"welcome"}"#).expect("parse");
        assert_eq!(
            CoordinatorMessage::try_from(envelope).expect("convert"),
            CoordinatorMessage::Welcome(WelcomePayload::default())
        );
    }
}
