pub mod config;
pub mod events;
pub mod server;
pub mod simulation;

pub use config::ServerConfig;
pub use events::{DisconnectReason, ServerEvent};
pub use server::{GameServer, ServerStats};
