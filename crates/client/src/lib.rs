pub mod bot;
pub mod net;

pub use bot::Bot;
pub use net::{ClientConfig, ClientEvent, ConnectionState, GameClient, RemoteEntity};
