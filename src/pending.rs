//! Table of RPCs waiting for their reply.
//!
//! Entries are registered before the request is written and removed exactly
//! once: by the read task when the reply arrives, by the caller on timeout,
//! or all together when the session ends. Dropping a sender wakes its
//! caller with a closed channel, which the client reports as
//! `ConnectionClosed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::{NetconfError, Result};
use crate::protocol::Message;

/// Completion handle for one outstanding request.
pub type ReplySender = oneshot::Sender<Message>;

/// Shared message-id → completion table.
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<DashMap<u64, ReplySender>>,
    /// Set by `fail_all`; no request is accepted afterwards.
    closed: Arc<AtomicBool>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `message_id` and return the receiving end.
    ///
    /// Fails with `ConnectionClosed` once the table has been failed.
    pub fn register(&self, message_id: u64) -> Result<oneshot::Receiver<Message>> {
        let (tx, rx) = oneshot::channel();
        self.inner.insert(message_id, tx);

        // Checked after the insert: either `fail_all` clears this entry or
        // we see the flag it set before clearing.
        if self.closed.load(Ordering::SeqCst) {
            self.inner.remove(&message_id);
            return Err(NetconfError::ConnectionClosed);
        }

        tracing::debug!(
            "Registered pending request {} (total: {})",
            message_id,
            self.inner.len()
        );
        Ok(rx)
    }

    /// Deliver `message` to the request with `message_id`.
    ///
    /// Returns the message back if no such request is waiting.
    pub fn resolve(&self, message_id: u64, message: Message) -> Option<Message> {
        match self.inner.remove(&message_id) {
            Some((_, tx)) => {
                if tx.send(message).is_err() {
                    tracing::debug!("Caller for request {} went away", message_id);
                }
                None
            }
            None => Some(message),
        }
    }

    /// Deliver `message` to the only outstanding request.
    ///
    /// Used for replies whose message-id cannot be read. Returns the message
    /// back unless exactly one request is waiting.
    pub fn resolve_sole(&self, message: Message) -> Option<Message> {
        if self.inner.len() != 1 {
            return Some(message);
        }
        let Some(message_id) = self.inner.iter().next().map(|entry| *entry.key()) else {
            return Some(message);
        };
        self.resolve(message_id, message)
    }

    /// Forget a request (timeout or cancellation).
    pub fn remove(&self, message_id: u64) -> bool {
        self.inner.remove(&message_id).is_some()
    }

    /// Drop every outstanding request and refuse new ones; waiting callers
    /// see a closed channel.
    pub fn fail_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let count = self.inner.len();
        if count > 0 {
            tracing::debug!("Failing {} pending requests", count);
        }
        self.inner.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn message(text: &'static str) -> Message {
        Message::new(Bytes::from_static(text.as_bytes()), 1)
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let pending = PendingRequests::new();
        let rx = pending.register(101).unwrap();
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(101, message("<rpc-reply/>")).is_none());
        assert_eq!(pending.len(), 0);
        assert_eq!(rx.await.unwrap().text().unwrap(), "<rpc-reply/>");
    }

    #[test]
    fn test_resolve_unknown_returns_message() {
        let pending = PendingRequests::new();
        let _rx = pending.register(101).unwrap();

        let returned = pending.resolve(999, message("<rpc-reply/>"));
        assert!(returned.is_some());
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_sole() {
        let pending = PendingRequests::new();
        assert!(pending.resolve_sole(message("<x/>")).is_some());

        let rx = pending.register(101).unwrap();
        assert!(pending.resolve_sole(message("<x/>")).is_none());
        assert!(rx.await.is_ok());

        let _a = pending.register(102).unwrap();
        let _b = pending.register(103).unwrap();
        assert!(pending.resolve_sole(message("<x/>")).is_some());
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_fail_all_closes_receivers() {
        let pending = PendingRequests::new();
        let a = pending.register(101).unwrap();
        let b = pending.register(102).unwrap();

        pending.fail_all();

        assert_eq!(pending.len(), 0);
        assert!(a.await.is_err());
        assert!(b.await.is_err());
    }

    #[test]
    fn test_register_after_fail_all() {
        let pending = PendingRequests::new();
        let reader_side = pending.clone();

        reader_side.fail_all();

        assert!(matches!(
            pending.register(101),
            Err(NetconfError::ConnectionClosed)
        ));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_concurrent_register_and_fail_all() {
        // Every registration either fails or is drained by `fail_all`;
        // none is left behind.
        for _ in 0..200 {
            let pending = PendingRequests::new();
            let reader_side = pending.clone();
            let closer = std::thread::spawn(move || reader_side.fail_all());

            let receivers: Vec<_> = (101..141)
                .filter_map(|id| pending.register(id).ok())
                .collect();
            closer.join().unwrap();

            assert_eq!(pending.len(), 0);
            for mut rx in receivers {
                assert!(matches!(
                    rx.try_recv(),
                    Err(oneshot::error::TryRecvError::Closed)
                ));
            }
        }
    }

    #[test]
    fn test_remove() {
        let pending = PendingRequests::new();
        let _rx = pending.register(101).unwrap();

        assert!(pending.remove(101));
        assert!(!pending.remove(101));
    }
}
