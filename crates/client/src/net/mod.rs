pub mod client;
pub mod config;
pub mod events;
pub mod input;
pub mod prediction;
pub mod replication;

pub use client::{ConnectionState, GameClient};
pub use config::ClientConfig;
pub use events::ClientEvent;
pub use input::InputState;
pub use prediction::ClientPrediction;
pub use replication::{RemoteEntity, ReplicatedWorld, SnapshotChanges, lerp_angle};
