//! Pending-request bookkeeping and type-family correlation.
//!
//! Envelopes carry no correlation ID, so a response is matched to the oldest
//! pending request whose expected response types include the response's
//! type. Responses from one coordinator connection arrive in request order,
//! which makes this exact as long as no request of the same family has timed
//! out while its response was still in flight. A late response in that case
//! is matched to the next request of its family.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{CoordinatorMessage, MessageType};

// ============================================================================
// Types
// ============================================================================

/// Channel that completes a caller's request.
pub(crate) type Responder = oneshot::Sender<Result<CoordinatorMessage>>;

/// A serialized envelope waiting to be written.
#[derive(Debug, Clone)]
pub(crate) struct OutboundMessage {
    /// Pending request this envelope belongs to.
    pub message_id: MessageId,
    /// Envelope JSON.
    pub payload: String,
}

/// One request awaiting its response.
pub(crate) struct PendingRequest {
    message_id: MessageId,
    request_type: MessageType,
    responder: Responder,
}

impl PendingRequest {
    /// Returns `true` if `response_type` can answer this request.
    fn expects(&self, response_type: MessageType) -> bool {
        self.request_type
            .expected_responses()
            .contains(&response_type)
    }

    /// Completes the request with an error.
    pub(crate) fn reject(self, error: Error) {
        let _ = self.responder.send(Err(error));
    }
}

// ============================================================================
// PendingRequests
// ============================================================================

/// Pending requests in issue order.
#[derive(Default)]
pub(crate) struct PendingRequests {
    entries: VecDeque<PendingRequest>,
}

impl PendingRequests {
    /// Records a new pending request.
    pub(crate) fn push(
        &mut self,
        message_id: MessageId,
        request_type: MessageType,
        responder: Responder,
    ) {
        self.entries.push_back(PendingRequest {
            message_id,
            request_type,
            responder,
        });
    }

    /// Completes the oldest request that expects this response.
    ///
    /// Returns the ID of the completed request, or `None` if nothing matched.
    pub(crate) fn resolve(&mut self, response: CoordinatorMessage) -> Option<MessageId> {
        let response_type = response.message_type();
        let index = self
            .entries
            .iter()
            .position(|entry| entry.expects(response_type))?;
        let entry = self.entries.remove(index)?;

        // The caller may have stopped waiting; that is not an error here.
        let _ = entry.responder.send(Ok(response));
        Some(entry.message_id)
    }

    /// Removes a request without completing it.
    pub(crate) fn remove(&mut self, message_id: &MessageId) -> bool {
        match self.entries.iter().position(|e| &e.message_id == message_id) {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    /// Removes and returns every pending request.
    pub(crate) fn take_all(&mut self) -> Vec<PendingRequest> {
        self.entries.drain(..).collect()
    }

    /// Returns the number of pending requests.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::{CountPayload, SubscriptionIdPayload};

    fn registered(id: &str) -> CoordinatorMessage {
        CoordinatorMessage::SubscriptionRegistered(SubscriptionIdPayload {
            subscription_id: id.into(),
        })
    }

    #[test]
    fn test_resolve_oldest_of_family() {
        let mut pending = PendingRequests::default();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        pending.push(MessageId::from("r1"), MessageType::RegisterSubscription, tx1);
        pending.push(MessageId::from("r2"), MessageType::RegisterSubscription, tx2);

        assert_eq!(pending.resolve(registered("sub_1")), Some(MessageId::from("r1")));
        assert_eq!(rx1.try_recv().expect("sent").expect("ok"), registered("sub_1"));
        assert!(rx2.try_recv().is_err());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_resolve_skips_other_families() {
        let mut pending = PendingRequests::default();
        let (tx_count, mut rx_count) = oneshot::channel();
        let (tx_reg, mut rx_reg) = oneshot::channel();
        pending.push(MessageId::from("c"), MessageType::GetSubscriptionCount, tx_count);
        pending.push(MessageId::from("r"), MessageType::RegisterSubscription, tx_reg);

        assert_eq!(pending.resolve(registered("sub_1")), Some(MessageId::from("r")));
        assert!(rx_reg.try_recv().is_ok());
        assert!(rx_count.try_recv().is_err());

        let count = CoordinatorMessage::SubscriptionCount(CountPayload { count: 4 });
        assert_eq!(pending.resolve(count), Some(MessageId::from("c")));
        assert!(rx_count.try_recv().is_ok());
    }

    #[test]
    fn test_subscription_error_matches_oldest_register_or_unregister() {
        let mut pending = PendingRequests::default();
        let (tx_un, mut rx_un) = oneshot::channel();
        let (tx_reg, _rx_reg) = oneshot::channel();
        pending.push(MessageId::from("u"), MessageType::UnregisterSubscription, tx_un);
        pending.push(MessageId::from("r"), MessageType::RegisterSubscription, tx_reg);

        let error = CoordinatorMessage::subscription_error("boom", None);
        assert_eq!(pending.resolve(error), Some(MessageId::from("u")));
        assert!(rx_un.try_recv().is_ok());
    }

    #[test]
    fn test_unmatched_response_is_dropped() {
        let mut pending = PendingRequests::default();
        let (tx, _rx) = oneshot::channel();
        pending.push(MessageId::from("c"), MessageType::GetSubscriptionCount, tx);

        assert_eq!(pending.resolve(registered("sub_late")), None);
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_remove_and_take_all() {
        let mut pending = PendingRequests::default();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        pending.push(MessageId::from("a"), MessageType::GetAllSubscriptions, tx1);
        pending.push(MessageId::from("b"), MessageType::GetAllSubscriptions, tx2);

        assert!(pending.remove(&MessageId::from("a")));
        assert!(!pending.remove(&MessageId::from("a")));

        for entry in pending.take_all() {
            entry.reject(Error::ConnectionClosed);
        }
        assert_eq!(pending.len(), 0);
        assert!(matches!(
            rx2.try_recv().expect("sent"),
            Err(Error::ConnectionClosed)
        ));
    }
}
