//! Interactive chat client
//!
//! Connects to a relay, shows incoming lines and forwards typed lines.
//! The handshake needs no special state: the welcome line is the prompt,
//! the next typed line is the candidate name.

use std::io;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines,
};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::AppError;
use crate::message::{ACCEPTED, WELCOME};
use crate::prompt::{prompt_line, prompt_port};

/// Terminal escape: cursor home, clear screen
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// How a line from the server should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLine<'a> {
    /// Server wants a username
    Prompt,
    /// Username was accepted
    Accepted,
    /// Anything else, shown as is
    Text(&'a str),
}

impl<'a> ServerLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        if line.starts_with(WELCOME) {
            ServerLine::Prompt
        } else if line.starts_with(ACCEPTED) {
            ServerLine::Accepted
        } else {
            ServerLine::Text(line)
        }
    }
}

/// Ask for address and port until a connection succeeds
///
/// Returns `None` if input runs out first.
pub async fn connect_interactive<R, W>(
    input: &mut Lines<R>,
    out: &mut W,
) -> io::Result<Option<TcpStream>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(address) = prompt_line(
            input,
            out,
            "What is the address of the server that you wish to connect to?",
        )
        .await?
        else {
            return Ok(None);
        };

        let Some(port) = prompt_port(input, out, "What is the port to connect through?").await?
        else {
            return Ok(None);
        };

        match TcpStream::connect((address.trim(), port)).await {
            Ok(stream) => {
                info!("Connected to {}:{}", address.trim(), port);
                return Ok(Some(stream));
            }
            Err(e) => {
                out.write_all(format!("Could not connect to specified address {}\n", e).as_bytes())
                    .await?;
            }
        }
    }
}

/// Relay between the server stream and the user until the server closes
///
/// The closing notice goes to `out` with the rest of the transcript.
/// When user input ends, the write side is shut down and the loop keeps
/// reading until the server finishes the teardown.
pub async fn run_chat<S, R, W>(
    stream: S,
    mut input: Lines<R>,
    out: &mut W,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut server_lines = BufReader::new(reader).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = server_lines.next_line() => match line? {
                Some(line) => display(&line, out).await?,
                None => {
                    debug!("Server closed the connection");
                    out.write_all(b"Disconnected from the server\n").await?;
                    out.flush().await?;
                    return Ok(());
                }
            },
            line = input.next_line(), if input_open => match line? {
                Some(line) => {
                    writer.write_all(format!("{}\n", line).as_bytes()).await?;
                    writer.flush().await?;
                }
                None => {
                    debug!("Input closed, shutting down write side");
                    input_open = false;
                    writer.shutdown().await?;
                }
            },
        }
    }
}

async fn display<W>(line: &str, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let text = match ServerLine::classify(line) {
        ServerLine::Prompt => format!("{}\n", line),
        ServerLine::Accepted => format!(
            "{}Username accepted, you can now type messages.\nTo see a list of commands, type \\help.\n",
            CLEAR_SCREEN
        ),
        ServerLine::Text(text) => format!("{}\n", text),
    };
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::message::UNAVAILABLE;

    #[test]
    fn test_classify() {
        assert_eq!(ServerLine::classify(WELCOME), ServerLine::Prompt);
        assert_eq!(ServerLine::classify(ACCEPTED), ServerLine::Accepted);
        assert_eq!(
            ServerLine::classify(UNAVAILABLE),
            ServerLine::Text(UNAVAILABLE)
        );
        assert_eq!(
            ServerLine::classify("bob says: hi"),
            ServerLine::Text("bob says: hi")
        );
    }

    #[tokio::test]
    async fn test_run_chat_handshake_and_disconnect() {
        let (client_side, server_side) = tokio::io::duplex(4096);
        let input = BufReader::new(&b"alice\nhello\n"[..]).lines();

        let server = tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(server_side);
            let mut lines = BufReader::new(reader).lines();

            writer.write_all(format!("{WELCOME}\n").as_bytes()).await.unwrap();
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("alice"));
            writer
                .write_all(format!("{ACCEPTED}\nalice has joined the chat.\n").as_bytes())
                .await
                .unwrap();
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
            // Input ran out, so the client half-closed.
            assert_eq!(lines.next_line().await.unwrap(), None);
            writer.write_all(b"alice says: hello\n").await.unwrap();
        });

        let mut out = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(2),
            run_chat(client_side, input, &mut out),
        )
        .await
        .unwrap()
        .unwrap();
        server.await.unwrap();

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains(WELCOME));
        assert!(shown.contains(CLEAR_SCREEN));
        assert!(shown.contains("Username accepted, you can now type messages."));
        assert!(shown.contains("alice has joined the chat."));
        assert!(shown.ends_with("alice says: hello\nDisconnected from the server\n"));
    }
}
