//! Sink struct definition
//!
//! A registry entry's outbound handle: "send a line to this client",
//! paired with the notice the registry fires when it evicts the entry.

use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, oneshot};

use crate::error::SendError;
use crate::types::SessionId;

/// Outbound handle for one registered session
#[derive(Debug)]
pub struct Sink {
    /// Session that owns this sink
    pub session_id: SessionId,
    /// Registry → writer task line channel
    pub sender: mpsc::Sender<String>,
    /// Fired when the registry drops this entry for failing delivery
    evicted: oneshot::Sender<()>,
}

impl Sink {
    /// Create a sink for the given session, with its eviction notice
    pub fn new(session_id: SessionId, sender: mpsc::Sender<String>) -> (Self, Eviction) {
        let (evicted, rx) = oneshot::channel();
        let sink = Self {
            session_id,
            sender,
            evicted,
        };
        (sink, Eviction { rx })
    }

    /// Queue a line, waiting at most `timeout` for channel capacity
    ///
    /// Returns an error if the channel is closed (peer gone) or stays full.
    pub async fn deliver(&self, line: String, timeout: Duration) -> Result<(), SendError> {
        self.sender
            .send_timeout(line, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SendError::Timeout,
                SendTimeoutError::Closed(_) => SendError::ChannelClosed,
            })
    }

    /// Tell the owning session its entry is gone
    pub fn evict(self) {
        let _ = self.evicted.send(());
    }
}

/// Session-side half of a sink's eviction notice
#[derive(Debug)]
pub struct Eviction {
    rx: oneshot::Receiver<()>,
}

impl Eviction {
    /// Wait until the registry releases the entry
    ///
    /// Returns `true` for an eviction, `false` if the entry was dropped
    /// without one (unregistered, or the registry stopped). Must not be
    /// awaited again after it returns.
    pub async fn released(&mut self) -> bool {
        (&mut self.rx).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_ok() {
        let (tx, mut rx) = mpsc::channel(4);
        let (sink, _eviction) = Sink::new(SessionId::new(), tx);

        sink.deliver("hi".into(), Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_deliver_closed() {
        let (tx, rx) = mpsc::channel(4);
        let (sink, _eviction) = Sink::new(SessionId::new(), tx);
        drop(rx);

        let result = sink.deliver("hi".into(), Duration::from_millis(50)).await;
        assert_eq!(result, Err(SendError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_deliver_times_out_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let (sink, _eviction) = Sink::new(SessionId::new(), tx);

        sink.deliver("one".into(), Duration::from_millis(50))
            .await
            .unwrap();
        let result = sink.deliver("two".into(), Duration::from_millis(50)).await;
        assert_eq!(result, Err(SendError::Timeout));
    }

    #[tokio::test]
    async fn test_evict_fires_notice() {
        let (tx, _rx) = mpsc::channel(1);
        let (sink, mut eviction) = Sink::new(SessionId::new(), tx);

        sink.evict();
        assert!(eviction.released().await);
    }

    #[tokio::test]
    async fn test_drop_without_evict_is_plain_release() {
        let (tx, _rx) = mpsc::channel(1);
        let (sink, mut eviction) = Sink::new(SessionId::new(), tx);

        drop(sink);
        assert!(!eviction.released().await);
    }
}
