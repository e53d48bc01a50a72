//! Line Chat Relay - Server Entry Point
//!
//! Reads the port, starts the Registry actor and the listener, and accepts
//! connections until Ctrl-C.

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use line_relay::config::parse_port;
use line_relay::prompt::prompt_port;
use line_relay::{Listener, ServerConfig, ServerContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_relay=info")),
        )
        .init();

    // Port from the first argument, otherwise ask for it
    let port = match env::args().nth(1) {
        Some(arg) => parse_port(&arg)?,
        None => {
            let mut input = BufReader::new(tokio::io::stdin()).lines();
            let mut out = tokio::io::stdout();
            match prompt_port(&mut input, &mut out, "Enter server port:").await? {
                Some(port) => port,
                None => return Ok(()),
            }
        }
    };

    let config = ServerConfig::with_port(port);
    let context = ServerContext::start(&config);
    info!("Registry actor started");

    let listener = Listener::bind(&config, context).await?;
    info!("Waiting for connections on {}", listener.local_addr()?);

    listener.run_until_ctrl_c().await?;
    Ok(())
}
