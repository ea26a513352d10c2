//! Error types
//!
//! Domain-specific error types for the relay server.

use std::fmt;
use std::io;

/// Broadcast hub errors
#[derive(Debug)]
pub enum HubError {
    EncodeFailed(serde_json::Error),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::EncodeFailed(e) => write!(f, "Failed to encode history payload: {}", e),
        }
    }
}

impl std::error::Error for HubError {}

impl From<serde_json::Error> for HubError {
    fn from(error: serde_json::Error) -> Self {
        HubError::EncodeFailed(error)
    }
}

/// General relay server error that encompasses all error types
#[derive(Debug)]
pub enum RelayError {
    Config(config::ConfigError),
    Io(io::Error),
    Hub(HubError),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
            RelayError::Hub(e) => write!(f, "Broadcast error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}

impl From<HubError> for RelayError {
    fn from(error: HubError) -> Self {
        RelayError::Hub(error)
    }
}
