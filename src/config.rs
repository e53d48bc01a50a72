//! Server configuration
//!
//! There is no config file. The port comes from the command line or an
//! interactive prompt; everything else uses the defaults below.

use std::time::Duration;

use crate::error::AppError;

/// Default bind host (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Channel buffer size for each session's outbound lines
pub const OUTBOUND_CAPACITY: usize = 64;

/// Channel buffer size for registry commands
pub const REGISTRY_CAPACITY: usize = 256;

/// How long a broadcast waits on one full sink before evicting it
pub const SEND_TIMEOUT: Duration = Duration::from_millis(250);

/// How long teardown waits for a writer task to drain
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Listener and session settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub outbound_capacity: usize,
    pub registry_capacity: usize,
    pub send_timeout: Duration,
    pub close_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            outbound_capacity: OUTBOUND_CAPACITY,
            registry_capacity: REGISTRY_CAPACITY,
            send_timeout: SEND_TIMEOUT,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Defaults with the given port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a port typed at a prompt
///
/// Accepts a decimal integer in `1..=65535`, surrounding whitespace ignored.
pub fn parse_port(input: &str) -> Result<u16, AppError> {
    let trimmed = input.trim();
    match trimmed.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(AppError::MalformedInput(trimmed.to_string())),
    }
}
