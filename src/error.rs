//! Error types for the chat relay
//!
//! Defines application-level errors and sink send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Session-level faults (`NameConflict`, `InvalidName`, `Connection`,
/// `Send`) are handled at the session boundary. `Listener` is fatal to the
/// process. `MalformedInput` only comes from interactive prompts.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested name is already registered
    #[error("Name already taken: {0}")]
    NameConflict(String),

    /// Requested name is empty
    #[error("Invalid name")]
    InvalidName,

    /// I/O error or undecodable input on a peer connection
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The listening socket itself failed (fatal)
    #[error("Listener error: {0}")]
    Listener(std::io::Error),

    /// Interactive input could not be parsed
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The registry actor has stopped
    #[error("Registry closed")]
    RegistryClosed,

    /// Outbound line could not be queued for the peer
    #[error("Send error: {0}")]
    Send(#[from] SendError),
}

/// Sink send errors
///
/// Occurs when a line cannot be queued on a session's outbound channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The writer task has stopped (peer gone)
    #[error("Channel closed")]
    ChannelClosed,

    /// The channel stayed full for longer than the send timeout
    #[error("Send timed out")]
    Timeout,
}
