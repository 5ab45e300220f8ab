use std::time::Duration;

use tanknet::net::CONNECTION_TIMEOUT;
use tanknet::{DEFAULT_PORT, DEFAULT_TICK_RATE, GameplayConfig, PacketConditions};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_players: usize,
    pub tick_rate: u32,
    /// Full snapshot every N ticks, deltas in between.
    pub snapshot_interval: u32,
    pub connection_timeout: Duration,
    pub seed: u64,
    pub packet_conditions: Option<PacketConditions>,
    pub gameplay: GameplayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            max_players: 20,
            tick_rate: DEFAULT_TICK_RATE,
            snapshot_interval: 3,
            connection_timeout: CONNECTION_TIMEOUT,
            seed: 0,
            packet_conditions: None,
            gameplay: GameplayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
