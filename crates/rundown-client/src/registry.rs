//! The pending-call table.
//!
//! One owner (the connection driver) holds every in-flight call: id-keyed
//! entries for ordinary requests plus a single slot for the discovery
//! handshake, which is matched by message type because the Pong does not
//! echo the Ping's request id. Entries leave the table exactly once,
//! resolved by a matching reply, rejected by the expiration sweep, or
//! rejected en masse when the connection ends.

use crate::error::CallError;
use rundown_core::Envelope;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Delivers a call's outcome to the task awaiting it.
pub(crate) type ReplySender = oneshot::Sender<Result<Envelope, CallError>>;

/// One in-flight call.
struct PendingCall {
    /// The outbound envelope, kept for its expiration and message type.
    request: Envelope,
    reply_tx: ReplySender,
}

impl PendingCall {
    fn resolve(self, reply: Envelope) {
        // The caller may have dropped its receiver; that is not an error.
        let _ = self.reply_tx.send(Ok(reply));
    }

    fn reject(self, error: CallError) {
        let _ = self.reply_tx.send(Err(error));
    }

    fn expired(&self, now: u64) -> bool {
        self.request.expiration <= now
    }

    fn timeout(self) {
        let message_type = self.request.message_type.clone();
        self.reject(CallError::Timeout { message_type });
    }
}

/// All in-flight calls on one connection.
pub(crate) struct PendingTable {
    next_request_id: u64,
    by_id: HashMap<u64, PendingCall>,
    handshake: Option<PendingCall>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            next_request_id: 1,
            by_id: HashMap::new(),
            handshake: None,
        }
    }

    /// Allocate the next request id. Ids start at 1 and are never reused
    /// within a connection.
    pub(crate) fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub(crate) fn register(&mut self, request_id: u64, request: Envelope, reply_tx: ReplySender) {
        self.by_id.insert(request_id, PendingCall { request, reply_tx });
    }

    /// Install the handshake slot. At most one ping can be outstanding; a
    /// newer one rejects the ping it supersedes rather than stranding it.
    pub(crate) fn register_handshake(&mut self, request: Envelope, reply_tx: ReplySender) {
        if let Some(superseded) = self.handshake.replace(PendingCall { request, reply_tx }) {
            superseded.timeout();
        }
    }

    /// Fulfill the entry for `request_id`, if any. Unmatched ids are normal
    /// traffic (late replies, unrelated broadcasts) and return `false`.
    pub(crate) fn resolve(&mut self, request_id: u64, reply: Envelope) -> bool {
        match self.by_id.remove(&request_id) {
            Some(call) => {
                call.resolve(reply);
                true
            }
            None => false,
        }
    }

    pub(crate) fn resolve_handshake(&mut self, reply: Envelope) -> bool {
        match self.handshake.take() {
            Some(call) => {
                call.resolve(reply);
                true
            }
            None => false,
        }
    }

    /// Reject every entry whose expiration has passed. Each expired entry is
    /// removed before its caller is told, so later sweeps cannot reject it
    /// again.
    pub(crate) fn reject_expired(&mut self, now: u64) {
        let expired: Vec<u64> = self
            .by_id
            .iter()
            .filter(|(_, call)| call.expired(now))
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(call) = self.by_id.remove(&id) {
                tracing::debug!("request {} ({}) expired", id, call.request.message_type);
                call.timeout();
            }
        }
        if let Some(call) = self.handshake.take_if(|call| call.expired(now)) {
            tracing::debug!("handshake ({}) expired", call.request.message_type);
            call.timeout();
        }
    }

    /// Reject everything outstanding, id-keyed and handshake alike. Used
    /// when the connection closes or fails.
    pub(crate) fn reject_all(&mut self, error: CallError) {
        for (_, call) in self.by_id.drain() {
            call.reject(error.clone());
        }
        if let Some(call) = self.handshake.take() {
            call.reject(error);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len() + usize::from(self.handshake.is_some())
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rundown_core::types;
    use serde_json::Map;
    use tokio::sync::oneshot::error::TryRecvError;

    fn request(message_type: &str, request_id: u64, expires_at: u64) -> Envelope {
        Envelope::request(
            message_type,
            Map::new(),
            "SENDER",
            Vec::new(),
            request_id,
            expires_at,
            0,
        )
    }

    fn reply(request_id: u64) -> Envelope {
        Envelope::decode(&format!(
            r#"{{"MessageType":"/Script/Test.Reply","Message":{{"requestId":{request_id}}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn request_ids_count_up_from_one() {
        let mut table = PendingTable::new();
        assert_eq!(table.next_request_id(), 1);
        assert_eq!(table.next_request_id(), 2);
        assert_eq!(table.next_request_id(), 3);
    }

    #[test]
    fn resolve_delivers_and_removes() {
        let mut table = PendingTable::new();
        let (tx, mut rx) = oneshot::channel();
        table.register(1, request("/Script/Test.Load", 1, 100), tx);
        assert_eq!(table.len(), 1);

        assert!(table.resolve(1, reply(1)));
        assert!(table.is_empty());
        let delivered = rx.try_recv().unwrap().unwrap();
        assert_eq!(delivered.request_id(), Some(1));

        // The entry is gone; a duplicate reply finds nothing.
        assert!(!table.resolve(1, reply(1)));
    }

    #[test]
    fn unmatched_reply_changes_nothing() {
        let mut table = PendingTable::new();
        let (tx, mut rx) = oneshot::channel();
        table.register(1, request("/Script/Test.Load", 1, 100), tx);

        assert!(!table.resolve(42, reply(42)));
        assert_eq!(table.len(), 1);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn sweep_rejects_expired_exactly_once() {
        let mut table = PendingTable::new();
        let (tx_old, mut rx_old) = oneshot::channel();
        let (tx_live, mut rx_live) = oneshot::channel();
        table.register(1, request("/Script/Test.Load", 1, 100), tx_old);
        table.register(2, request("/Script/Test.Load", 2, 200), tx_live);

        table.reject_expired(150);
        assert_eq!(
            rx_old.try_recv().unwrap(),
            Err(CallError::Timeout {
                message_type: "/Script/Test.Load".to_string()
            })
        );
        assert!(matches!(rx_live.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(table.len(), 1);

        // A second sweep sees nothing new to reject.
        table.reject_expired(150);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn expiration_boundary_counts_as_expired() {
        let mut table = PendingTable::new();
        let (tx, mut rx) = oneshot::channel();
        table.register(1, request("/Script/Test.Load", 1, 100), tx);
        table.reject_expired(100);
        assert!(rx.try_recv().unwrap().is_err());
    }

    #[test]
    fn sweep_covers_the_handshake_slot() {
        let mut table = PendingTable::new();
        let (tx, mut rx) = oneshot::channel();
        table.register_handshake(request(types::PING, 1, 100), tx);

        table.reject_expired(99);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        table.reject_expired(100);
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(CallError::Timeout {
                message_type: types::PING.to_string()
            })
        );
        assert!(table.is_empty());
    }

    #[test]
    fn pong_resolves_only_a_pending_handshake() {
        let mut table = PendingTable::new();
        assert!(!table.resolve_handshake(reply(1)));

        let (tx, mut rx) = oneshot::channel();
        table.register_handshake(request(types::PING, 1, 100), tx);
        assert!(table.resolve_handshake(reply(1)));
        assert!(rx.try_recv().unwrap().is_ok());
        assert!(!table.resolve_handshake(reply(1)));
    }

    #[test]
    fn newer_handshake_rejects_the_superseded_one() {
        let mut table = PendingTable::new();
        let (tx_first, mut rx_first) = oneshot::channel();
        let (tx_second, mut rx_second) = oneshot::channel();
        table.register_handshake(request(types::PING, 1, 100), tx_first);
        table.register_handshake(request(types::PING, 2, 100), tx_second);

        assert_eq!(
            rx_first.try_recv().unwrap(),
            Err(CallError::Timeout {
                message_type: types::PING.to_string()
            })
        );
        assert!(table.resolve_handshake(reply(2)));
        assert!(rx_second.try_recv().unwrap().is_ok());
    }

    #[test]
    fn reject_all_drains_everything() {
        let mut table = PendingTable::new();
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        let (tx_hs, mut rx_hs) = oneshot::channel();
        table.register(1, request("/Script/Test.Load", 1, 100), tx_a);
        table.register(2, request("/Script/Test.GetPages", 2, 100), tx_b);
        table.register_handshake(request(types::PING, 3, 100), tx_hs);

        table.reject_all(CallError::ConnectionClosed);
        assert!(table.is_empty());
        for rx in [&mut rx_a, &mut rx_b, &mut rx_hs] {
            assert_eq!(rx.try_recv().unwrap(), Err(CallError::ConnectionClosed));
        }
    }
}
