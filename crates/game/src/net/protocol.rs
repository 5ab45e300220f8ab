use super::codec::{CodecError, PacketReader, PacketWriter};

pub const PROTOCOL_ID: u32 = 0x1234_5678;
pub const PROTOCOL_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 19;
pub const MAX_PACKET_SIZE: usize = 1200;
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE;
pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Wraparound-aware "s1 is newer than s2": the signed distance is positive.
#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    (s1.wrapping_sub(s2) as i32) > 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
    pub message_type: u8,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bitfield: u32, message_type: u8) -> Self {
        Self {
            sequence,
            ack,
            ack_bitfield,
            message_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("packet of {0} bytes is shorter than the header")]
    TooShort(usize),
    #[error("unexpected protocol id {0:#010x}")]
    BadProtocolId(u32),
    #[error("payload of {0} bytes exceeds the packet budget")]
    PayloadTooLarge(usize),
    #[error("payload length {declared} exceeds the {available} bytes remaining")]
    LengthMismatch { declared: usize, available: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(header: PacketHeader, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge(self.payload.len()));
        }

        let mut writer = PacketWriter::with_capacity(HEADER_SIZE + self.payload.len());
        writer.write_u32(PROTOCOL_ID);
        writer.write_u32(self.header.sequence);
        writer.write_u32(self.header.ack);
        writer.write_u32(self.header.ack_bitfield);
        writer.write_u8(self.header.message_type);
        writer.write_u16(self.payload.len() as u16);
        writer.write_bytes(&self.payload);
        Ok(writer.into_vec())
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < HEADER_SIZE {
            return Err(PacketError::TooShort(data.len()));
        }

        let mut reader = PacketReader::new(data);
        let protocol_id = reader.read_u32()?;
        if protocol_id != PROTOCOL_ID {
            return Err(PacketError::BadProtocolId(protocol_id));
        }

        let header = PacketHeader {
            sequence: reader.read_u32()?,
            ack: reader.read_u32()?,
            ack_bitfield: reader.read_u32()?,
            message_type: reader.read_u8()?,
        };

        let declared = reader.read_u16()? as usize;
        if declared > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge(declared));
        }
        if declared > reader.remaining() {
            return Err(PacketError::LengthMismatch {
                declared,
                available: reader.remaining(),
            });
        }

        let payload = reader.read_bytes(declared)?.to_vec();
        Ok(Self { header, payload })
    }
}
