//! Per-client session
//!
//! Drives one connection through the name handshake, the message loop and
//! teardown. Only the registry entry is shared with other sessions; all
//! other session state is owned by the session's task.

use std::time::{Duration, Instant};

use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::command::{self, Command, CommandContext, CommandOutcome};
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::AppError;
use crate::message::{Announcement, ChatMessage, UNAVAILABLE, WELCOME};
use crate::registry::{Registry, RegistryHandle};
use crate::sink::Eviction;
use crate::types::SessionId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Stream accepted, nothing exchanged yet
    Connecting,
    /// Negotiating a username
    Handshaking,
    /// Relaying messages and commands
    Active,
    /// Tearing down
    Closing,
    /// Terminal
    Closed,
}

/// State shared by every session on a server
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub registry: RegistryHandle,
    pub started_at: Instant,
    pub close_timeout: Duration,
}

impl ServerContext {
    /// Spawn a registry and record the server start time
    pub fn start(config: &ServerConfig) -> Self {
        Self {
            registry: Registry::spawn(config.registry_capacity, config.send_timeout),
            started_at: Instant::now(),
            close_timeout: config.close_timeout,
        }
    }
}

/// One connected client
pub struct Session<R> {
    id: SessionId,
    name: Option<String>,
    connection: Connection<R>,
    connected_at: Instant,
    state: SessionState,
    /// Set when the registry dropped this session's entry
    evicted: bool,
    context: ServerContext,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(connection: Connection<R>, context: ServerContext) -> Self {
        Self {
            id: SessionId::new(),
            name: None,
            connection,
            connected_at: Instant::now(),
            state: SessionState::Connecting,
            evicted: false,
            context,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Assigned name, `None` until the handshake completes
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion
    ///
    /// Every fault ends only this session. Returns the terminal state.
    pub async fn run(mut self) -> SessionState {
        info!(
            "Session {} started for {:?}",
            self.id,
            self.connection.peer_addr()
        );
        self.transition(SessionState::Handshaking);

        let result = match self.handshake().await {
            Ok(Some((name, mut eviction))) => {
                self.transition(SessionState::Active);
                match self.message_loop(&name, &mut eviction).await {
                    Ok(evicted) => {
                        self.evicted = evicted;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Ok(None) => {
                debug!("Session {} disconnected during handshake", self.id);
                Ok(())
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!("Session {} fault: {}", self.id, e);
        }

        self.transition(SessionState::Closing);
        self.teardown().await
    }

    /// Prompt for names until one registers or the peer goes away
    ///
    /// There is no attempt cap.
    async fn handshake(&mut self) -> Result<Option<(String, Eviction)>, AppError> {
        loop {
            self.connection.send_line(WELCOME).await?;

            let Some(candidate) = self.connection.read_line().await? else {
                return Ok(None);
            };

            let registered = self
                .context
                .registry
                .register(self.id, candidate.clone(), self.connection.sink())
                .await;

            match registered {
                Ok(eviction) => {
                    self.name = Some(candidate.clone());
                    self.context
                        .registry
                        .broadcast(Announcement::Joined(candidate.clone()).to_string())
                        .await?;
                    return Ok(Some((candidate, eviction)));
                }
                Err(AppError::NameConflict(_)) | Err(AppError::InvalidName) => {
                    self.connection.send_line(UNAVAILABLE).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read lines until EOF, `\quit`, eviction, or a connection fault
    ///
    /// Returns `true` when the loop ended because the registry evicted
    /// this session's entry.
    async fn message_loop(
        &mut self,
        name: &str,
        eviction: &mut Eviction,
    ) -> Result<bool, AppError> {
        let outbound = self.connection.sink();

        loop {
            let line = tokio::select! {
                line = self.connection.read_line() => line?,
                _ = outbound.closed() => {
                    debug!("Writer for session {} stopped", self.id);
                    return Ok(false);
                }
                evicted = eviction.released() => {
                    if evicted {
                        warn!("User {} evicted for not keeping up", name);
                    } else {
                        warn!("Registry released session {} without eviction", self.id);
                    }
                    return Ok(evicted);
                }
            };

            let Some(line) = line else {
                debug!("Session {} reached EOF", self.id);
                return Ok(false);
            };

            if line.is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Some(command) => {
                    debug!("Session {} ran {:?}", self.id, command);
                    let ctx = self.command_context();
                    match command::execute(&command, &ctx, &self.context.registry).await? {
                        CommandOutcome::Reply(lines) => self.connection.send_lines(lines).await?,
                        CommandOutcome::Quit => {
                            info!("User {} quit", name);
                            return Ok(false);
                        }
                    }
                }
                None => {
                    let message = ChatMessage::new(name, line);
                    self.context.registry.broadcast(message.to_string()).await?;
                }
            }
        }
    }

    fn command_context(&self) -> CommandContext {
        CommandContext {
            server_started: self.context.started_at,
            session_started: self.connected_at,
            local_addr: self.connection.local_addr(),
        }
    }

    /// Unregister, close the connection, announce the departure
    ///
    /// The departure is announced only if this session still held its
    /// entry or was evicted from it. Errors here are logged and swallowed.
    async fn teardown(self) -> SessionState {
        let Session {
            id,
            name,
            connection,
            evicted,
            context,
            ..
        } = self;

        let mut announce = evicted;
        if let Some(name) = &name {
            match context.registry.unregister(id, name.clone()).await {
                Ok(removed) => announce |= removed,
                Err(e) => warn!("Session {} could not unregister '{}': {}", id, name, e),
            }
        }

        connection.close(context.close_timeout).await;

        if let Some(name) = name.filter(|_| announce) {
            info!("User {} lost connection", name);
            if let Err(e) = context
                .registry
                .broadcast(Announcement::Left(name).to_string())
                .await
            {
                warn!("Session {} could not announce departure: {}", id, e);
            }
        }

        debug!("Session {} {:?} -> {:?}", id, SessionState::Closing, SessionState::Closed);
        SessionState::Closed
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}
