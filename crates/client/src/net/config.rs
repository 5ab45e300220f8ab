use std::time::Duration;

use tanknet::net::CONNECTION_TIMEOUT;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Inputs sent to the server per second.
    pub input_rate: u32,
    pub heartbeat_interval: Duration,
    pub connect_timeout: Duration,
    pub connection_timeout: Duration,
    /// Blend window for remote entities.
    pub interpolation_window: Duration,
    pub seed: u64,
}

impl ClientConfig {
    pub fn input_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.input_rate.max(1) as f64)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            input_rate: 20,
            heartbeat_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            connection_timeout: CONNECTION_TIMEOUT,
            interpolation_window: Duration::from_millis(150),
            seed: 0,
        }
    }
}
