//! Client management system
//!
//! Handles connected peers and the per-connection read loop.

pub mod handler;
pub mod registry;

pub use handler::handle_client;
pub use registry::ClientRegistry;
