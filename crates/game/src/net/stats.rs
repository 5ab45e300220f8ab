/// Artificial network conditions applied by [`super::PacketSimulator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketConditions {
    pub enabled: bool,
    /// 0-100
    pub loss_percent: f32,
    pub latency_ms: u32,
    /// Uniform +/- variation around `latency_ms`.
    pub jitter_ms: u32,
}

impl Default for PacketConditions {
    fn default() -> Self {
        Self {
            enabled: false,
            loss_percent: 0.0,
            latency_ms: 0,
            jitter_ms: 0,
        }
    }
}

impl PacketConditions {
    pub fn lossy(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent,
            ..Self::default()
        }
    }

    pub fn delayed(latency_ms: u32, jitter_ms: u32) -> Self {
        Self {
            enabled: true,
            latency_ms,
            jitter_ms,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled && (self.loss_percent > 0.0 || self.latency_ms > 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
}

impl NetworkStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.packets_received += 1;
        self.bytes_received += bytes as u64;
    }
}
