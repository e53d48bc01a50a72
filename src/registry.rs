//! Registry Actor implementation
//!
//! The central actor owning the set of active sessions: name -> sink.
//! All commands are processed one at a time by a single task, so the
//! check-then-insert of `register` and the iterate-and-deliver of
//! `broadcast` never interleave.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::message::ACCEPTED;
use crate::sink::{Eviction, Sink};
use crate::types::SessionId;

/// Commands sent from sessions to the Registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim a name for a session
    Register {
        session_id: SessionId,
        name: String,
        sender: mpsc::Sender<String>,
        reply: oneshot::Sender<Result<Eviction, AppError>>,
    },
    /// Release a name held by a session
    Unregister {
        session_id: SessionId,
        name: String,
        reply: oneshot::Sender<bool>,
    },
    /// Deliver a line to every registered sink
    Broadcast {
        text: String,
        reply: oneshot::Sender<usize>,
    },
    /// List registered names
    Snapshot { reply: oneshot::Sender<Vec<String>> },
}

/// The Registry actor
///
/// Name-set and sink-set are the same map, so they cannot drift apart.
pub struct Registry {
    /// Active sessions: name -> Sink
    members: HashMap<String, Sink>,
    /// Per-sink delivery bound for broadcasts
    send_timeout: Duration,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl Registry {
    /// Create a new Registry with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>, send_timeout: Duration) -> Self {
        Self {
            members: HashMap::new(),
            send_timeout,
            receiver,
        }
    }

    /// Start a Registry task and return a handle to it
    pub fn spawn(capacity: usize, send_timeout: Duration) -> RegistryHandle {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(Registry::new(receiver, send_timeout).run());
        RegistryHandle { sender }
    }

    /// Run the Registry event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        info!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Registry shutting down");
    }

    /// Process a single command
    ///
    /// A dropped reply receiver only means the caller went away.
    async fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                session_id,
                name,
                sender,
                reply,
            } => {
                let result = self.handle_register(session_id, name, sender).await;
                let _ = reply.send(result);
            }
            RegistryCommand::Unregister {
                session_id,
                name,
                reply,
            } => {
                let _ = reply.send(self.handle_unregister(session_id, &name));
            }
            RegistryCommand::Broadcast { text, reply } => {
                let delivered = self.handle_broadcast(text).await;
                let _ = reply.send(delivered);
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(self.handle_snapshot());
            }
        }
    }

    /// Insert the entry and queue the acceptance line on its sink
    ///
    /// Queuing here, inside the same command, puts the acceptance ahead of
    /// any broadcast the new sink can receive.
    async fn handle_register(
        &mut self,
        session_id: SessionId,
        name: String,
        sender: mpsc::Sender<String>,
    ) -> Result<Eviction, AppError> {
        if name.is_empty() {
            return Err(AppError::InvalidName);
        }
        if self.members.contains_key(&name) {
            debug!("Session {} asked for taken name '{}'", session_id, name);
            return Err(AppError::NameConflict(name));
        }

        let (sink, eviction) = Sink::new(session_id, sender);
        sink.deliver(ACCEPTED.to_string(), self.send_timeout).await?;

        info!("Session {} registered as '{}'", session_id, name);
        self.members.insert(name, sink);
        debug!("Total members: {}", self.members.len());
        Ok(eviction)
    }

    /// Remove the entry if `session_id` still owns it
    fn handle_unregister(&mut self, session_id: SessionId, name: &str) -> bool {
        let owned = self
            .members
            .get(name)
            .is_some_and(|sink| sink.session_id == session_id);
        if !owned {
            return false;
        }

        self.members.remove(name);
        info!("Session {} unregistered '{}'", session_id, name);
        debug!("Total members: {}", self.members.len());
        true
    }

    /// Deliver to every sink; evict the ones that fail
    ///
    /// An evicted session is notified so it can close its connection.
    async fn handle_broadcast(&mut self, text: String) -> usize {
        info!("{}", text);

        let mut delivered = 0;
        let mut failed = Vec::new();

        for (name, sink) in &self.members {
            match sink.deliver(text.clone(), self.send_timeout).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Dropping sink for '{}': {}", name, e);
                    failed.push(name.clone());
                }
            }
        }

        for name in failed {
            if let Some(sink) = self.members.remove(&name) {
                sink.evict();
            }
        }

        delivered
    }

    fn handle_snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Cloneable handle used by sessions to talk to the Registry actor
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Wrap an existing command sender
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Claim `name` for `session_id`, routing broadcasts to `sender`
    ///
    /// On success the acceptance line is already queued on `sender`, and
    /// the returned `Eviction` resolves if the registry later drops the
    /// entry. Fails with `NameConflict` if another session holds the name.
    pub async fn register(
        &self,
        session_id: SessionId,
        name: impl Into<String>,
        sender: mpsc::Sender<String>,
    ) -> Result<Eviction, AppError> {
        let (reply, rx) = oneshot::channel();
        self.request(RegistryCommand::Register {
            session_id,
            name: name.into(),
            sender,
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::RegistryClosed)?
    }

    /// Release `name` if held by `session_id`
    ///
    /// Returns whether an entry was removed. Calling it twice is harmless.
    pub async fn unregister(
        &self,
        session_id: SessionId,
        name: impl Into<String>,
    ) -> Result<bool, AppError> {
        let (reply, rx) = oneshot::channel();
        self.request(RegistryCommand::Unregister {
            session_id,
            name: name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    /// Deliver `text` to every registered sink
    ///
    /// Returns the number of sinks that accepted the line.
    pub async fn broadcast(&self, text: impl Into<String>) -> Result<usize, AppError> {
        let (reply, rx) = oneshot::channel();
        self.request(RegistryCommand::Broadcast {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    /// Point-in-time list of registered names, sorted
    pub async fn snapshot(&self) -> Result<Vec<String>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.request(RegistryCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| AppError::RegistryClosed)
    }

    async fn request(&self, cmd: RegistryCommand) -> Result<(), AppError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| AppError::RegistryClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_registry() -> RegistryHandle {
        Registry::spawn(64, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_name() {
        let registry = spawn_registry();
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);

        registry.register(SessionId::new(), "alice", tx1).await.unwrap();
        let result = registry.register(SessionId::new(), "alice", tx2).await;

        assert!(matches!(result, Err(AppError::NameConflict(name)) if name == "alice"));
    }

    #[tokio::test]
    async fn test_names_are_case_sensitive() {
        let registry = spawn_registry();
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);

        registry.register(SessionId::new(), "alice", tx1).await.unwrap();
        registry.register(SessionId::new(), "Alice", tx2).await.unwrap();

        assert_eq!(registry.snapshot().await.unwrap(), vec!["Alice", "alice"]);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_name() {
        let registry = spawn_registry();
        let (tx, _rx) = mpsc::channel(8);

        let result = registry.register(SessionId::new(), "", tx).await;
        assert!(matches!(result, Err(AppError::InvalidName)));
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_register_single_winner() {
        let registry = spawn_registry();
        let mut tasks = Vec::new();
        let mut receivers = Vec::new();

        for _ in 0..32 {
            let (tx, rx) = mpsc::channel(8);
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(SessionId::new(), "alice", tx).await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => wins += 1,
                Err(AppError::NameConflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(conflicts, 31);
        assert_eq!(registry.snapshot().await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = spawn_registry();
        let id = SessionId::new();
        let (tx, _rx) = mpsc::channel(8);

        let mut eviction = registry.register(id, "alice", tx).await.unwrap();

        assert!(registry.unregister(id, "alice").await.unwrap());
        assert!(!eviction.released().await);
        assert!(!registry.unregister(id, "alice").await.unwrap());
        assert!(!registry.unregister(id, "nobody").await.unwrap());
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_ignores_other_owner() {
        let registry = spawn_registry();
        let owner = SessionId::new();
        let (tx, _rx) = mpsc::channel(8);

        registry.register(owner, "alice", tx).await.unwrap();

        assert!(!registry.unregister(SessionId::new(), "alice").await.unwrap());
        assert_eq!(registry.snapshot().await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_reregister_after_unregister() {
        let registry = spawn_registry();
        let first = SessionId::new();
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);

        registry.register(first, "alice", tx1).await.unwrap();
        registry.unregister(first, "alice").await.unwrap();

        registry.register(SessionId::new(), "alice", tx2).await.unwrap();
        assert_eq!(registry.snapshot().await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_sink_including_sender() {
        let registry = spawn_registry();
        let mut receivers = Vec::new();

        for name in ["alice", "bob", "carol"] {
            let (tx, rx) = mpsc::channel(8);
            registry.register(SessionId::new(), name, tx).await.unwrap();
            receivers.push(rx);
        }

        let delivered = registry.broadcast("alice says: hello").await.unwrap();
        assert_eq!(delivered, 3);

        for rx in &mut receivers {
            assert_eq!(rx.recv().await.as_deref(), Some(ACCEPTED));
            assert_eq!(rx.recv().await.as_deref(), Some("alice says: hello"));
        }
    }

    #[tokio::test]
    async fn test_broadcast_evicts_dead_sink_and_continues() {
        let registry = spawn_registry();
        let (tx_alice, mut rx_alice) = mpsc::channel(8);
        let (tx_bob, rx_bob) = mpsc::channel(8);
        let (tx_carol, mut rx_carol) = mpsc::channel(8);

        registry.register(SessionId::new(), "alice", tx_alice).await.unwrap();
        registry.register(SessionId::new(), "bob", tx_bob).await.unwrap();
        registry.register(SessionId::new(), "carol", tx_carol).await.unwrap();
        drop(rx_bob);

        assert_eq!(registry.broadcast("one").await.unwrap(), 2);
        assert_eq!(rx_alice.recv().await.as_deref(), Some(ACCEPTED));
        assert_eq!(rx_alice.recv().await.as_deref(), Some("one"));
        assert_eq!(rx_carol.recv().await.as_deref(), Some(ACCEPTED));
        assert_eq!(rx_carol.recv().await.as_deref(), Some("one"));
        assert_eq!(registry.snapshot().await.unwrap(), vec!["alice", "carol"]);

        assert_eq!(registry.broadcast("two").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_evicts_stalled_sink() {
        let registry = spawn_registry();
        // Room for the acceptance line and one broadcast.
        let (tx_slow, _rx_slow) = mpsc::channel(2);
        let (tx_fast, mut rx_fast) = mpsc::channel(8);

        let mut slow = registry
            .register(SessionId::new(), "slow", tx_slow)
            .await
            .unwrap();
        registry.register(SessionId::new(), "fast", tx_fast).await.unwrap();

        assert_eq!(registry.broadcast("one").await.unwrap(), 2);
        // "slow" never drains, so the second line cannot be queued.
        assert_eq!(registry.broadcast("two").await.unwrap(), 1);

        assert!(slow.released().await);
        assert_eq!(registry.snapshot().await.unwrap(), vec!["fast"]);
        assert_eq!(rx_fast.recv().await.as_deref(), Some(ACCEPTED));
        assert_eq!(rx_fast.recv().await.as_deref(), Some("one"));
        assert_eq!(rx_fast.recv().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_register_queues_acceptance() {
        let registry = spawn_registry();
        let (tx, mut rx) = mpsc::channel(8);

        registry.register(SessionId::new(), "alice", tx).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some(ACCEPTED));
    }

    #[tokio::test]
    async fn test_register_fails_for_closed_sink() {
        let registry = spawn_registry();
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let result = registry.register(SessionId::new(), "ghost", tx).await;
        assert!(matches!(result, Err(AppError::Send(_))));
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_fails_when_registry_stopped() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let registry = RegistryHandle::new(sender);

        assert!(matches!(
            registry.snapshot().await,
            Err(AppError::RegistryClosed)
        ));
    }
}
