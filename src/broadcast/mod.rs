//! Broadcast fan-out
//!
//! A single `tokio::sync::broadcast` channel decouples publishing from
//! delivery. Each peer's writer task holds its own subscription and drains it
//! into that peer's socket, so a slow peer lags alone instead of stalling the
//! fan-out to everyone else.

use log::{debug, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::sync::broadcast;

use crate::client::registry::{ClientRegistry, drop_peer};
use crate::error::HubError;
use crate::history::MessageHistory;

/// One encoded history payload, shared across all subscribers.
pub type Payload = Arc<[u8]>;

/// The shared broadcast channel. Cloneable; the server hands a subscription
/// to every accepted connection.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<Payload>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Each peer's writer task calls this once to get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Payload> {
        self.sender.subscribe()
    }

    /// Sends a payload to all subscribers.
    pub fn dispatch(&self, payload: Payload) {
        // send() returns Err when there are no subscribers; that's fine.
        let _ = self.sender.send(payload);
    }
}

/// Serializes history snapshots and hands them to the hub.
#[derive(Clone)]
pub struct Broadcaster {
    history: Arc<Mutex<MessageHistory>>,
    hub: BroadcastHub,
}

impl Broadcaster {
    pub fn new(history: Arc<Mutex<MessageHistory>>, hub: BroadcastHub) -> Self {
        Self { history, hub }
    }

    /// Takes a history snapshot, encodes it as a JSON array of strings
    /// (oldest first) terminated by a newline, and dispatches it to every
    /// subscriber.
    pub async fn publish(&self) -> Result<(), HubError> {
        // Dispatching under the history lock keeps the payload sequence each
        // subscriber sees monotonic across concurrent senders.
        let history = self.history.lock().await;
        let snapshot = history.snapshot();
        let payload = encode_payload(&snapshot)?;
        debug!("Publishing history of {} message(s)", snapshot.len());
        self.hub.dispatch(payload);
        Ok(())
    }
}

fn encode_payload(snapshot: &[String]) -> Result<Payload, HubError> {
    let mut bytes = serde_json::to_vec(snapshot)?;
    bytes.push(b'\n');
    Ok(Arc::from(bytes))
}

/// Per-peer fan-out task: drains the subscription into the peer's socket.
///
/// A write failure drops this peer only; the task deregisters it and ends. A
/// lagged subscription skips to the next payload, which is safe because every
/// payload carries the full history snapshot.
pub async fn run_writer(
    mut write_half: OwnedWriteHalf,
    client_addr: SocketAddr,
    mut updates: broadcast::Receiver<Payload>,
    registry: Arc<Mutex<ClientRegistry>>,
) {
    loop {
        match updates.recv().await {
            Ok(payload) => {
                if let Err(e) = write_half.write_all(&payload).await {
                    warn!("Write to client {} failed: {}", client_addr, e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(
                    "Client {} lagging, skipped {} update(s)",
                    client_addr, skipped
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    drop_peer(&registry, client_addr).await;
}
