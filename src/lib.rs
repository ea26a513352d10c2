pub mod broadcast;
pub mod client;
pub mod error;
pub mod history;
pub mod server;

pub use server::Server;
pub use server::ServerConfig;
