//! Line protocol definitions
//!
//! Plain newline-terminated UTF-8 text. This module holds the fixed
//! handshake strings and the formats of relayed lines.

use std::fmt;

/// Sent to prompt the peer for a username
pub const WELCOME: &str = "Please type your username.";

/// Sent once a username has been registered
pub const ACCEPTED: &str = "Username accepted.";

/// Sent when a requested username cannot be used
pub const UNAVAILABLE: &str = "Username unavailable, try another.";

/// Lines starting with this character are commands
pub const COMMAND_PREFIX: char = '\\';

/// Rule line framing every command response
pub const RULE: &str =
    "--------------------------------------------------------------------------";

/// A chat line relayed to every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Name of the sending session
    pub sender: String,
    /// Text body as typed
    pub body: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} says: {}", self.sender, self.body)
    }
}

/// Join / leave notices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// Session finished the handshake
    Joined(String),
    /// Session was torn down
    Left(String),
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::Joined(name) => write!(f, "{} has joined the chat.", name),
            Announcement::Left(name) => write!(f, "{} has left the chat.", name),
        }
    }
}

/// Frame response body lines between two rule lines
pub fn boxed<I, S>(body: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut lines = vec![RULE.to_string()];
    lines.extend(body.into_iter().map(Into::into));
    lines.push(RULE.to_string());
    lines
}
