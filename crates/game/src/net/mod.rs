mod codec;
mod connection;
mod protocol;
mod simulator;
mod stats;
mod tracking;
mod transport;

pub use codec::{CodecError, DEFAULT_WRITER_CAPACITY, PacketReader, PacketWriter};
pub use connection::{CONNECTION_TIMEOUT, Connection, ConnectionManager, SendError};
pub use protocol::{
    DEFAULT_PORT, DEFAULT_TICK_RATE, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, PROTOCOL_ID,
    PROTOCOL_VERSION, Packet, PacketError, PacketHeader, sequence_greater_than,
};
pub use simulator::PacketSimulator;
pub use stats::{NetworkStats, PacketConditions};
pub use tracking::{
    MAX_PENDING_AGE, MAX_RETRIES, PendingPacket, RESEND_TIMEOUT, ReceiveTracker, ReliableChannel,
    UnreliableChannel,
};
pub use transport::{Datagram, UdpTransport};
