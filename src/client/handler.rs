use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::Mutex;

use crate::broadcast::Broadcaster;
use crate::client::registry::{ClientRegistry, drop_peer};
use crate::history::MessageHistory;

/// Per-connection read loop.
///
/// - Reads one newline-terminated message at a time, never buffering more
///   than the message limit while a line is still unterminated.
/// - On each message: appends to the shared history, then publishes the
///   updated snapshot through the broadcaster.
/// - An empty read (peer closed) or a read error ends the loop and
///   deregisters the peer; neither is allowed to take down anything else.
pub async fn handle_client(
    read_half: OwnedReadHalf,
    client_addr: SocketAddr,
    history: Arc<Mutex<MessageHistory>>,
    registry: Arc<Mutex<ClientRegistry>>,
    broadcaster: Broadcaster,
    max_message_bytes: usize,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        match read_framed_line(&mut reader, &mut buf, max_message_bytes).await {
            Ok(LineRead::Eof) => {
                // Client closed the connection
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(LineRead::Message(message)) => {
                debug!("Received from {}: {:?}", client_addr, message);

                {
                    let mut history_guard = history.lock().await;
                    history_guard.append(message);
                    history_guard.dump();
                }

                if let Err(e) = broadcaster.publish().await {
                    error!("Failed to publish update from {}: {}", client_addr, e);
                }
            }
            Ok(LineRead::Oversized(len)) => {
                warn!(
                    "Client {} sent an oversized message ({} bytes), ignoring",
                    client_addr, len
                );
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        }
    }

    drop_peer(&registry, client_addr).await;
}

/// Outcome of one framed read.
#[derive(Debug, PartialEq)]
enum LineRead {
    /// Peer closed the connection.
    Eof,
    /// One complete message, terminator stripped.
    Message(String),
    /// The line exceeded the limit; it was drained from the stream and
    /// this many bytes were discarded.
    Oversized(usize),
}

/// Reads one newline-terminated message. The limit applies to the message
/// itself, terminator excluded; a line that grows past it is drained through
/// to its newline instead of accumulating in memory.
async fn read_framed_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() {
                return Ok(LineRead::Eof);
            }
            // Unterminated trailing data: deliver it as the final message.
            return finish_message(buf, limit);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                return finish_message(buf, limit);
            }
            None => {
                let n = available.len();
                buf.extend_from_slice(available);
                reader.consume(n);
                // One spare byte for a CR that the terminator strip would
                // remove once the newline arrives.
                if buf.len() > limit + 1 {
                    let discarded = buf.len();
                    buf.clear();
                    return drain_line(reader, discarded).await;
                }
            }
        }
    }
}

fn finish_message(buf: &mut Vec<u8>, limit: usize) -> io::Result<LineRead> {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if buf.len() > limit {
        let discarded = buf.len();
        buf.clear();
        return Ok(LineRead::Oversized(discarded));
    }
    let message = String::from_utf8(std::mem::take(buf))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(LineRead::Message(message))
}

/// Consumes the remainder of an over-limit line through to its newline.
async fn drain_line<R>(reader: &mut R, mut discarded: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead::Oversized(discarded));
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                discarded += pos;
                reader.consume(pos + 1);
                return Ok(LineRead::Oversized(discarded));
            }
            None => {
                let n = available.len();
                discarded += n;
                reader.consume(n);
            }
        }
    }
}
