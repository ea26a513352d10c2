//! Server core functionality
//!
//! This module contains the main server implementation, configuration,
//! and the accept loop of the chat relay.

pub mod config;
pub mod core;

pub use config::ServerConfig;
pub use core::Server;
