//! Chat Relay Server - Entry Point
//!
//! A multi-client TCP chat relay: every inbound message is appended to a
//! bounded history, and the full history is pushed back to every connected
//! client as a JSON array of strings.

use log::info;

use chat_relay_server::error::RelayError;
use chat_relay_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching chat relay server...");

    let config = ServerConfig::load()?;
    let server = Server::new(config)?;
    server.run().await;

    Ok(())
}
