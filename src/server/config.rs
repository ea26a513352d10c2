//! Server configuration
//!
//! Loads settings from an optional `config.toml` with `CHAT_RELAY_*`
//! environment-variable overrides, falling back to built-in defaults.

use config::{Config, Environment, File};
use serde::Deserialize;

/// Server configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind the listener
    pub host: String,

    /// TCP port to listen on (0 picks an ephemeral port)
    pub port: u16,

    /// Listen backlog passed to the socket
    pub listen_backlog: u32,

    /// Maximum number of messages kept in the history
    pub history_capacity: usize,

    /// Maximum accepted length of one inbound message, in bytes
    pub max_message_bytes: usize,

    /// Depth of the broadcast channel feeding the per-peer writer tasks
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12345,
            listen_backlog: 5,
            history_capacity: 10,
            max_message_bytes: 1024,
            channel_capacity: 64,
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .set_default("listen_backlog", defaults.listen_backlog as i64)?
            .set_default("history_capacity", defaults.history_capacity as i64)?
            .set_default("max_message_bytes", defaults.max_message_bytes as i64)?
            .set_default("channel_capacity", defaults.channel_capacity as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("CHAT_RELAY"))
            .build()?;

        settings.try_deserialize()
    }

    /// The `host:port` string the listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
