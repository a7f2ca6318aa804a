//! Raw wire envelope and the closed set of message types.
//!
//! # Format
//!
//! ```json
//! { "type": "REGISTER_SUBSCRIPTION", "data": { ... } }
//! ```
//!
//! The envelope carries no correlation ID and no version field.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::{Error, Result};

// ============================================================================
// MessageType
// ============================================================================

/// Every `type` value the protocol knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Requests (tab → coordinator)
    /// Register or reuse a subscription.
    #[serde(rename = "REGISTER_SUBSCRIPTION")]
    RegisterSubscription,
    /// Remove a subscription.
    #[serde(rename = "UNREGISTER_SUBSCRIPTION")]
    UnregisterSubscription,
    /// Count active subscriptions.
    #[serde(rename = "GET_SUBSCRIPTION_COUNT")]
    GetSubscriptionCount,
    /// List active subscriptions.
    #[serde(rename = "GET_ALL_SUBSCRIPTIONS")]
    GetAllSubscriptions,

    // Responses (coordinator → tab)
    /// Registration accepted.
    #[serde(rename = "SUBSCRIPTION_REGISTERED")]
    SubscriptionRegistered,
    /// Unregistration accepted.
    #[serde(rename = "SUBSCRIPTION_UNREGISTERED")]
    SubscriptionUnregistered,
    /// Active subscription count.
    #[serde(rename = "SUBSCRIPTION_COUNT")]
    SubscriptionCount,
    /// Active subscription list.
    #[serde(rename = "ALL_SUBSCRIPTIONS")]
    AllSubscriptions,
    /// A subscription operation failed.
    #[serde(rename = "SUBSCRIPTION_ERROR")]
    SubscriptionError,
    /// Generic failure, e.g. an unknown request type.
    #[serde(rename = "ERROR")]
    Error,

    // Lifecycle
    /// Sent once when a connection becomes active.
    #[serde(rename = "welcome")]
    Welcome,
}

impl MessageType {
    /// Returns the wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterSubscription => "REGISTER_SUBSCRIPTION",
            Self::UnregisterSubscription => "UNREGISTER_SUBSCRIPTION",
            Self::GetSubscriptionCount => "GET_SUBSCRIPTION_COUNT",
            Self::GetAllSubscriptions => "GET_ALL_SUBSCRIPTIONS",
            Self::SubscriptionRegistered => "SUBSCRIPTION_REGISTERED",
            Self::SubscriptionUnregistered => "SUBSCRIPTION_UNREGISTERED",
            Self::SubscriptionCount => "SUBSCRIPTION_COUNT",
            Self::AllSubscriptions => "ALL_SUBSCRIPTIONS",
            Self::SubscriptionError => "SUBSCRIPTION_ERROR",
            Self::Error => "ERROR",
            Self::Welcome => "welcome",
        }
    }

    /// Returns `true` for types a tab may send.
    #[inline]
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(
            self,
            Self::RegisterSubscription
                | Self::UnregisterSubscription
                | Self::GetSubscriptionCount
                | Self::GetAllSubscriptions
        )
    }

    /// Response types that may answer a request of this type.
    ///
    /// Empty for non-request types.
    #[must_use]
    pub const fn expected_responses(&self) -> &'static [MessageType] {
        match self {
            Self::RegisterSubscription => {
                &[Self::SubscriptionRegistered, Self::SubscriptionError]
            }
            Self::UnregisterSubscription => {
                &[Self::SubscriptionUnregistered, Self::SubscriptionError]
            }
            Self::GetSubscriptionCount => &[Self::SubscriptionCount, Self::Error],
            Self::GetAllSubscriptions => &[Self::AllSubscriptions, Self::Error],
            _ => &[],
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "REGISTER_SUBSCRIPTION" => Ok(Self::RegisterSubscription),
            "UNREGISTER_SUBSCRIPTION" => Ok(Self::UnregisterSubscription),
            "GET_SUBSCRIPTION_COUNT" => Ok(Self::GetSubscriptionCount),
            "GET_ALL_SUBSCRIPTIONS" => Ok(Self::GetAllSubscriptions),
            "SUBSCRIPTION_REGISTERED" => Ok(Self::SubscriptionRegistered),
            "SUBSCRIPTION_UNREGISTERED" => Ok(Self::SubscriptionUnregistered),
            "SUBSCRIPTION_COUNT" => Ok(Self::SubscriptionCount),
            "ALL_SUBSCRIPTIONS" => Ok(Self::AllSubscriptions),
            "SUBSCRIPTION_ERROR" => Ok(Self::SubscriptionError),
            "ERROR" => Ok(Self::Error),
            "welcome" => Ok(Self::Welcome),
            other => Err(Error::unknown_message_type(other)),
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The unit exchanged between a tab and the coordinator.
///
/// `message_type` stays a plain string so unknown types survive parsing and
/// can be reported back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope of a known type.
    #[inline]
    #[must_use]
    pub fn new(message_type: MessageType, data: Value) -> Self {
        Self {
            message_type: message_type.as_str().to_string(),
            data,
        }
    }

    /// Parses the `type` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMessageType`] for types outside the protocol.
    #[inline]
    pub fn kind(&self) -> Result<MessageType> {
        self.message_type.parse()
    }

    /// Parses an envelope from a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a `{type, data}` object.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(from_str(text)?)
    }

    /// Serializes the envelope for a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
