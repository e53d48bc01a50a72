//! Line Chat Relay - Interactive Client
//!
//! Prompts for the server address and port, then relays between the
//! terminal and the server. Exits normally once the server closes the
//! connection.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use line_relay::client::{connect_interactive, run_chat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log to stderr so the chat transcript on stdout stays readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("line_relay=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut out = tokio::io::stdout();

    let Some(stream) = connect_interactive(&mut input, &mut out).await? else {
        return Ok(());
    };

    run_chat(stream, input, &mut out).await?;

    // A stdin read may still be parked on the blocking pool, which would
    // hold up runtime shutdown.
    std::process::exit(0);
}
