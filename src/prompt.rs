//! Interactive prompts for the binaries
//!
//! Generic over the input lines and the output writer so they can be
//! driven from memory in tests.

use std::io;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};

use crate::config::parse_port;

/// Write `hint` and read one line
///
/// Returns `None` when input is exhausted.
pub async fn prompt_line<R, W>(
    input: &mut Lines<R>,
    out: &mut W,
    hint: &str,
) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    out.write_all(format!("{}\n", hint).as_bytes()).await?;
    out.flush().await?;
    input.next_line().await
}

/// Prompt until a valid port is entered
///
/// Prints `Invalid` after each malformed entry.
pub async fn prompt_port<R, W>(
    input: &mut Lines<R>,
    out: &mut W,
    hint: &str,
) -> io::Result<Option<u16>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(line) = prompt_line(input, out, hint).await? else {
            return Ok(None);
        };
        match parse_port(&line) {
            Ok(port) => return Ok(Some(port)),
            Err(_) => {
                out.write_all(b"Invalid\n").await?;
            }
        }
    }
}
