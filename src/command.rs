//! In-band command handling
//!
//! Lines starting with `\` are commands. Dispatch is an exact match on the
//! whole line; there are no arguments. Every response is framed between two
//! rule lines and sent only to the invoking session.

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::AppError;
use crate::message::{boxed, COMMAND_PREFIX};
use crate::registry::RegistryHandle;

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Uptime,
    ServerIp,
    Clients,
    ClientTime,
    /// Prefixed line that matches no verb
    Unknown(String),
}

impl Command {
    /// Parse a line, returning `None` when it is not a command at all
    pub fn parse(line: &str) -> Option<Self> {
        if !line.starts_with(COMMAND_PREFIX) {
            return None;
        }

        let command = match line {
            "\\help" => Command::Help,
            "\\quit" => Command::Quit,
            "\\uptime" => Command::Uptime,
            "\\serverip" => Command::ServerIp,
            "\\clients" => Command::Clients,
            "\\clienttime" => Command::ClientTime,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

/// What the session should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Send these lines back to the invoker
    Reply(Vec<String>),
    /// Tear the session down
    Quit,
}

/// Per-invocation inputs for a command
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub server_started: Instant,
    pub session_started: Instant,
    pub local_addr: Option<SocketAddr>,
}

/// Run a command against the session context and registry
pub async fn execute(
    command: &Command,
    ctx: &CommandContext,
    registry: &RegistryHandle,
) -> Result<CommandOutcome, AppError> {
    let lines = match command {
        Command::Quit => return Ok(CommandOutcome::Quit),
        Command::Help => help(),
        Command::Uptime => uptime(ctx.server_started),
        Command::ServerIp => server_ip(ctx.local_addr),
        Command::Clients => clients(&registry.snapshot().await?),
        Command::ClientTime => client_time(ctx.session_started),
        Command::Unknown(_) => unrecognised(),
    };
    Ok(CommandOutcome::Reply(lines))
}

fn help() -> Vec<String> {
    boxed([
        "List of server commands: ",
        "\\quit disconnects",
        "\\uptime gets the server uptime",
        "\\clienttime gets the time you have been connected to the server",
        "\\serverip gets the server's IP address",
        "\\clients lists the number of connected clients and their names",
    ])
}

fn uptime(server_started: Instant) -> Vec<String> {
    let secs = server_started.elapsed().as_secs_f64();
    boxed([format!("Server uptime: {:.3}s", secs)])
}

fn server_ip(local_addr: Option<SocketAddr>) -> Vec<String> {
    let ip = local_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    boxed([format!("Server IP: {}", ip)])
}

fn clients(names: &[String]) -> Vec<String> {
    let mut body = vec![format!("Connected clients: {}", names.len())];
    body.extend(names.iter().cloned());
    boxed(body)
}

fn client_time(session_started: Instant) -> Vec<String> {
    let secs = session_started.elapsed().as_secs();
    boxed([format!("Client connected for: {}s", secs)])
}

fn unrecognised() -> Vec<String> {
    boxed(["Unrecognised command, type \\help for a list of valid commands."])
}
