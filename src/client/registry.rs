//! Client registry
//!
//! Tracks currently connected peers in acceptance order.

use log::info;
use std::net::SocketAddr;
use tokio::sync::Mutex;

/// Ordered table of connected peers. Insertion order is acceptance order.
///
/// The registry holds peer identity only; socket halves are owned by the
/// per-connection reader and writer tasks.
pub struct ClientRegistry {
    peers: Vec<SocketAddr>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    /// Appends a peer and returns the new client count.
    pub fn register(&mut self, addr: SocketAddr) -> usize {
        self.peers.push(addr);
        self.peers.len()
    }

    /// Removes a peer if present. Returns whether an entry was removed, so a
    /// disconnect racing between the reader and writer tasks is logged once.
    pub fn deregister(&mut self, addr: SocketAddr) -> bool {
        match self.peers.iter().position(|peer| *peer == addr) {
            Some(index) => {
                self.peers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns a point-in-time ordered copy of the peer list.
    pub fn snapshot(&self) -> Vec<SocketAddr> {
        self.peers.clone()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes a peer from the shared registry, logging the disconnect once.
///
/// The reader and writer tasks of a connection both call this on exit;
/// whichever gets there first logs.
pub async fn drop_peer(registry: &Mutex<ClientRegistry>, addr: SocketAddr) {
    let mut guard = registry.lock().await;
    if guard.deregister(addr) {
        info!("Client {} disconnected ({} remaining)", addr, guard.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn register_keeps_acceptance_order() {
        let mut registry = ClientRegistry::new();
        assert_eq!(registry.register(addr(1000)), 1);
        assert_eq!(registry.register(addr(1002)), 2);
        assert_eq!(registry.register(addr(1001)), 3);
        assert_eq!(registry.snapshot(), vec![addr(1000), addr(1002), addr(1001)]);
    }

    #[test]
    fn deregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        registry.register(addr(1000));
        registry.register(addr(1001));
        assert!(registry.deregister(addr(1000)));
        assert!(!registry.deregister(addr(1000)));
        assert_eq!(registry.snapshot(), vec![addr(1001)]);
    }

    #[test]
    fn snapshot_does_not_alias_the_table() {
        let mut registry = ClientRegistry::new();
        registry.register(addr(1000));
        let snapshot = registry.snapshot();
        registry.register(addr(1001));
        assert_eq!(snapshot, vec![addr(1000)]);
        assert_eq!(registry.len(), 2);
    }
}
