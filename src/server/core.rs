use log::{error, info};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::Mutex;

use crate::broadcast::{BroadcastHub, Broadcaster, run_writer};
use crate::client::ClientRegistry;
use crate::client::handle_client;
use crate::error::RelayError;
use crate::history::MessageHistory;
use crate::server::config::ServerConfig;

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    history: Arc<Mutex<MessageHistory>>,
    registry: Arc<Mutex<ClientRegistry>>,
    hub: BroadcastHub,
    config: ServerConfig,
}

impl Server {
    /// Binds and listens. A bind or listen failure is fatal: the server does
    /// not start and the error is returned to the caller.
    pub fn new(config: ServerConfig) -> Result<Self, RelayError> {
        let addr: SocketAddr = config
            .bind_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;

        let listener = socket.listen(config.listen_backlog)?;
        let local_addr = listener.local_addr()?;
        info!("Server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            history: Arc::new(Mutex::new(MessageHistory::new(config.history_capacity))),
            registry: Arc::new(Mutex::new(ClientRegistry::new())),
            hub: BroadcastHub::new(config.channel_capacity),
            config,
        })
    }

    /// The address the listener is bound to. With port 0 in the config this
    /// is the ephemeral port the OS picked.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn client_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn history_snapshot(&self) -> Vec<String> {
        self.history.lock().await.snapshot()
    }

    /// Accept loop, forever. Each accepted connection is registered and gets
    /// two tasks: a reader (the message/dispatch loop) and a writer draining
    /// its own broadcast subscription. An error from an individual accept is
    /// logged and the loop continues.
    pub async fn run(&self) {
        info!(
            "Chat relay listening on {} (history capacity {})",
            self.local_addr, self.config.history_capacity
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let count = self.registry.lock().await.register(addr);
                    info!("Client {} connected ({} active)", addr, count);

                    let (read_half, write_half) = stream.into_split();

                    // Subscribe before either task runs, so the peer sees
                    // every dispatch from this point on and nothing earlier.
                    let updates = self.hub.subscribe();

                    tokio::spawn(run_writer(
                        write_half,
                        addr,
                        updates,
                        Arc::clone(&self.registry),
                    ));

                    let broadcaster =
                        Broadcaster::new(Arc::clone(&self.history), self.hub.clone());
                    tokio::spawn(handle_client(
                        read_half,
                        addr,
                        Arc::clone(&self.history),
                        Arc::clone(&self.registry),
                        broadcaster,
                        self.config.max_message_bytes,
                    ));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
