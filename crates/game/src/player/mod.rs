pub mod config;
mod state;

pub use config::GameplayConfig;
pub use state::PlayerState;
