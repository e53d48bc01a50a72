//! Line-oriented TCP Chat Relay Library
//!
//! A multi-client chat relay over plain newline-terminated UTF-8 text,
//! built on tokio using the Actor pattern for the shared session registry.
//!
//! # Features
//! - Unique username handshake with re-prompt on conflict
//! - Broadcast of every chat line to all connected clients
//! - Join / leave announcements
//! - Backslash commands: `\help`, `\quit`, `\uptime`, `\serverip`,
//!   `\clients`, `\clienttime`
//! - Disconnection handling and slow-peer eviction
//!
//! # Architecture
//! - `Registry` is the central actor owning name -> sink
//! - Each connection runs a `Session` task talking to the registry
//! - Each connection has a writer task draining its outbound channel
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use line_relay::{Listener, ServerConfig, ServerContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::with_port(4000);
//!     let context = ServerContext::start(&config);
//!     let listener = Listener::bind(&config, context).await.unwrap();
//!     listener.run_until_ctrl_c().await.unwrap();
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod listener;
pub mod message;
pub mod prompt;
pub mod registry;
pub mod session;
pub mod sink;
pub mod types;

// Re-export main types for convenience
pub use command::{Command, CommandOutcome};
pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{AppError, SendError};
pub use listener::Listener;
pub use message::{Announcement, ChatMessage};
pub use registry::{Registry, RegistryCommand, RegistryHandle};
pub use session::{ServerContext, Session, SessionState};
pub use sink::Sink;
pub use types::SessionId;
