use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub enum ServerEvent {
    Started {
        addr: SocketAddr,
    },
    PlayerJoined {
        client_id: u32,
        addr: SocketAddr,
        entity_id: u32,
        name: String,
    },
    PlayerLeft {
        client_id: u32,
        name: String,
        reason: DisconnectReason,
    },
    ConnectionDenied {
        addr: SocketAddr,
        reason: String,
    },
    PlayerKilled {
        victim_id: u32,
        killer_id: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Shutdown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Shutdown => "server shutting down",
        }
    }
}
