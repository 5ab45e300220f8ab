mod state;

pub use state::{DELTA_EPSILON, DeltaFlags, EntityDelta, EntityState};

use glam::Vec3;

use crate::net::{CodecError, PacketReader, PacketWriter};
use crate::snapshot::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("unknown message type {0}")]
    UnknownType(u8),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("invalid entity kind {0}")]
    InvalidEntityKind(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Reliable,
    Unreliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    ConnectRequest = 0,
    ConnectAccept = 1,
    ConnectReject = 2,
    Disconnect = 3,
    Heartbeat = 4,
    PlayerInput = 10,
    Snapshot = 20,
    DeltaUpdate = 21,
    EntitySpawn = 30,
    EntityDespawn = 31,
    PlayerDamage = 40,
    PlayerDeath = 41,
    PlayerRespawn = 42,
    ProjectileSpawn = 43,
}

impl TryFrom<u8> for MessageType {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::ConnectRequest,
            1 => Self::ConnectAccept,
            2 => Self::ConnectReject,
            3 => Self::Disconnect,
            4 => Self::Heartbeat,
            10 => Self::PlayerInput,
            20 => Self::Snapshot,
            21 => Self::DeltaUpdate,
            30 => Self::EntitySpawn,
            31 => Self::EntityDespawn,
            40 => Self::PlayerDamage,
            41 => Self::PlayerDeath,
            42 => Self::PlayerRespawn,
            43 => Self::ProjectileSpawn,
            other => return Err(MessageError::UnknownType(other)),
        })
    }
}

impl MessageType {
    /// State sync is superseded by the next update; everything else is retransmitted.
    pub fn delivery(self) -> Delivery {
        match self {
            Self::Snapshot | Self::DeltaUpdate => Delivery::Unreliable,
            _ => Delivery::Reliable,
        }
    }

    /// Classifies a raw tag; unknown tags are treated as reliable so the
    /// sender's retransmission stops once they are acknowledged.
    pub fn delivery_for_tag(tag: u8) -> Delivery {
        Self::try_from(tag).map_or(Delivery::Reliable, Self::delivery)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    pub input_sequence: u32,
    pub server_tick: u32,
    pub move_x: f32,
    pub move_y: f32,
    pub aim_x: f32,
    pub aim_y: f32,
    pub shoot: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub server_tick: u32,
    pub entities: Vec<EntityState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaUpdate {
    pub server_tick: u32,
    pub baseline_tick: u32,
    pub deltas: Vec<EntityDelta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpawn {
    pub entity_id: u32,
    pub kind: EntityKind,
    pub position: Vec3,
    pub rotation: f32,
    pub owner_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ConnectRequest {
        protocol_version: u32,
        player_name: String,
    },
    ConnectAccept {
        client_id: u32,
        server_tick: u32,
        player_entity_id: u32,
    },
    ConnectReject {
        reason: String,
    },
    Disconnect {
        reason: String,
    },
    Heartbeat {
        timestamp_ms: u32,
    },
    PlayerInput(PlayerInput),
    Snapshot(Snapshot),
    DeltaUpdate(DeltaUpdate),
    EntitySpawn(EntitySpawn),
    EntityDespawn {
        entity_id: u32,
    },
    PlayerDamage {
        target_id: u32,
        source_id: u32,
        damage: u8,
        new_health: u8,
    },
    PlayerDeath {
        player_id: u32,
        killer_id: u32,
    },
    PlayerRespawn {
        player_id: u32,
        position: Vec3,
    },
    ProjectileSpawn {
        projectile_id: u32,
        owner_id: u32,
        position: Vec3,
        velocity: Vec3,
    },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ConnectRequest { .. } => MessageType::ConnectRequest,
            Self::ConnectAccept { .. } => MessageType::ConnectAccept,
            Self::ConnectReject { .. } => MessageType::ConnectReject,
            Self::Disconnect { .. } => MessageType::Disconnect,
            Self::Heartbeat { .. } => MessageType::Heartbeat,
            Self::PlayerInput(_) => MessageType::PlayerInput,
            Self::Snapshot(_) => MessageType::Snapshot,
            Self::DeltaUpdate(_) => MessageType::DeltaUpdate,
            Self::EntitySpawn(_) => MessageType::EntitySpawn,
            Self::EntityDespawn { .. } => MessageType::EntityDespawn,
            Self::PlayerDamage { .. } => MessageType::PlayerDamage,
            Self::PlayerDeath { .. } => MessageType::PlayerDeath,
            Self::PlayerRespawn { .. } => MessageType::PlayerRespawn,
            Self::ProjectileSpawn { .. } => MessageType::ProjectileSpawn,
        }
    }

    pub fn delivery(&self) -> Delivery {
        self.message_type().delivery()
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        let mut writer = PacketWriter::with_capacity(64);
        match self {
            Self::ConnectRequest {
                protocol_version,
                player_name,
            } => {
                writer.write_u32(*protocol_version);
                writer.write_string(player_name)?;
            }
            Self::ConnectAccept {
                client_id,
                server_tick,
                player_entity_id,
            } => {
                writer.write_u32(*client_id);
                writer.write_u32(*server_tick);
                writer.write_u32(*player_entity_id);
            }
            Self::ConnectReject { reason } | Self::Disconnect { reason } => {
                writer.write_string(reason)?;
            }
            Self::Heartbeat { timestamp_ms } => writer.write_u32(*timestamp_ms),
            Self::PlayerInput(input) => {
                writer.write_u32(input.input_sequence);
                writer.write_u32(input.server_tick);
                writer.write_f32(input.move_x);
                writer.write_f32(input.move_y);
                writer.write_f32(input.aim_x);
                writer.write_f32(input.aim_y);
                writer.write_bool(input.shoot);
            }
            Self::Snapshot(snapshot) => {
                writer.write_u32(snapshot.server_tick);
                writer.write_u16(snapshot.entities.len() as u16);
                for entity in &snapshot.entities {
                    entity.write(&mut writer)?;
                }
            }
            Self::DeltaUpdate(update) => {
                writer.write_u32(update.server_tick);
                writer.write_u32(update.baseline_tick);
                writer.write_u16(update.deltas.len() as u16);
                for delta in &update.deltas {
                    delta.write(&mut writer);
                }
            }
            Self::EntitySpawn(spawn) => {
                writer.write_u32(spawn.entity_id);
                writer.write_u8(spawn.kind as u8);
                writer.write_vec3(spawn.position);
                writer.write_f32(spawn.rotation);
                writer.write_u32(spawn.owner_id);
                writer.write_string(&spawn.name)?;
            }
            Self::EntityDespawn { entity_id } => writer.write_u32(*entity_id),
            Self::PlayerDamage {
                target_id,
                source_id,
                damage,
                new_health,
            } => {
                writer.write_u32(*target_id);
                writer.write_u32(*source_id);
                writer.write_u8(*damage);
                writer.write_u8(*new_health);
            }
            Self::PlayerDeath {
                player_id,
                killer_id,
            } => {
                writer.write_u32(*player_id);
                writer.write_u32(*killer_id);
            }
            Self::PlayerRespawn {
                player_id,
                position,
            } => {
                writer.write_u32(*player_id);
                writer.write_vec3(*position);
            }
            Self::ProjectileSpawn {
                projectile_id,
                owner_id,
                position,
                velocity,
            } => {
                writer.write_u32(*projectile_id);
                writer.write_u32(*owner_id);
                writer.write_vec3(*position);
                writer.write_vec3(*velocity);
            }
        }
        Ok(writer.into_vec())
    }

    pub fn decode(tag: u8, payload: &[u8]) -> Result<Self, MessageError> {
        let mut reader = PacketReader::new(payload);
        let r = &mut reader;

        Ok(match MessageType::try_from(tag)? {
            MessageType::ConnectRequest => Self::ConnectRequest {
                protocol_version: r.read_u32()?,
                player_name: r.read_string()?,
            },
            MessageType::ConnectAccept => Self::ConnectAccept {
                client_id: r.read_u32()?,
                server_tick: r.read_u32()?,
                player_entity_id: r.read_u32()?,
            },
            MessageType::ConnectReject => Self::ConnectReject {
                reason: r.read_string()?,
            },
            MessageType::Disconnect => Self::Disconnect {
                reason: r.read_string()?,
            },
            MessageType::Heartbeat => Self::Heartbeat {
                timestamp_ms: r.read_u32()?,
            },
            MessageType::PlayerInput => Self::PlayerInput(PlayerInput {
                input_sequence: r.read_u32()?,
                server_tick: r.read_u32()?,
                move_x: r.read_f32()?,
                move_y: r.read_f32()?,
                aim_x: r.read_f32()?,
                aim_y: r.read_f32()?,
                shoot: r.read_bool()?,
            }),
            MessageType::Snapshot => {
                let server_tick = r.read_u32()?;
                let count = r.read_u16()? as usize;
                let mut entities = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    entities.push(EntityState::read(r)?);
                }
                Self::Snapshot(Snapshot {
                    server_tick,
                    entities,
                })
            }
            MessageType::DeltaUpdate => {
                let server_tick = r.read_u32()?;
                let baseline_tick = r.read_u32()?;
                let count = r.read_u16()? as usize;
                let mut deltas = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    deltas.push(EntityDelta::read(r)?);
                }
                Self::DeltaUpdate(DeltaUpdate {
                    server_tick,
                    baseline_tick,
                    deltas,
                })
            }
            MessageType::EntitySpawn => Self::EntitySpawn(EntitySpawn {
                entity_id: r.read_u32()?,
                kind: EntityKind::try_from(r.read_u8()?)?,
                position: r.read_vec3()?,
                rotation: r.read_f32()?,
                owner_id: r.read_u32()?,
                name: r.read_string()?,
            }),
            MessageType::EntityDespawn => Self::EntityDespawn {
                entity_id: r.read_u32()?,
            },
            MessageType::PlayerDamage => Self::PlayerDamage {
                target_id: r.read_u32()?,
                source_id: r.read_u32()?,
                damage: r.read_u8()?,
                new_health: r.read_u8()?,
            },
            MessageType::PlayerDeath => Self::PlayerDeath {
                player_id: r.read_u32()?,
                killer_id: r.read_u32()?,
            },
            MessageType::PlayerRespawn => Self::PlayerRespawn {
                player_id: r.read_u32()?,
                position: r.read_vec3()?,
            },
            MessageType::ProjectileSpawn => Self::ProjectileSpawn {
                projectile_id: r.read_u32()?,
                owner_id: r.read_u32()?,
                position: r.read_vec3()?,
                velocity: r.read_vec3()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: Message) {
        let tag = message.message_type() as u8;
        let payload = message.encode().unwrap();
        assert_eq!(Message::decode(tag, &payload).unwrap(), message);
    }

    #[test]
    fn test_tags_match_wire_values() {
        assert_eq!(MessageType::ConnectRequest as u8, 0);
        assert_eq!(MessageType::Heartbeat as u8, 4);
        assert_eq!(MessageType::PlayerInput as u8, 10);
        assert_eq!(MessageType::Snapshot as u8, 20);
        assert_eq!(MessageType::DeltaUpdate as u8, 21);
        assert_eq!(MessageType::EntityDespawn as u8, 31);
        assert_eq!(MessageType::ProjectileSpawn as u8, 43);
        assert_eq!(MessageType::try_from(43).unwrap(), MessageType::ProjectileSpawn);
        assert_eq!(MessageType::try_from(5), Err(MessageError::UnknownType(5)));
    }

    #[test]
    fn test_only_state_sync_is_unreliable() {
        for tag in [0u8, 1, 2, 3, 4, 10, 20, 21, 30, 31, 40, 41, 42, 43] {
            let kind = MessageType::try_from(tag).unwrap();
            let expected = if tag == 20 || tag == 21 {
                Delivery::Unreliable
            } else {
                Delivery::Reliable
            };
            assert_eq!(kind.delivery(), expected, "tag {tag}");
        }
        assert_eq!(MessageType::delivery_for_tag(99), Delivery::Reliable);
    }

    #[test]
    fn test_input_layout() {
        let message = Message::PlayerInput(PlayerInput {
            input_sequence: 1,
            server_tick: 2,
            move_x: 0.0,
            move_y: 1.0,
            aim_x: 1.0,
            aim_y: 0.0,
            shoot: true,
        });
        let payload = message.encode().unwrap();
        assert_eq!(payload.len(), 4 + 4 + 4 * 4 + 1);
        assert_eq!(payload[24], 1);
        roundtrip(message);
    }

    #[test]
    fn test_connection_messages() {
        roundtrip(Message::ConnectRequest {
            protocol_version: 1,
            player_name: "Tanker".into(),
        });
        roundtrip(Message::ConnectAccept {
            client_id: 4,
            server_tick: 900,
            player_entity_id: 12,
        });
        roundtrip(Message::ConnectReject {
            reason: "Server full".into(),
        });
        roundtrip(Message::Heartbeat {
            timestamp_ms: 123_456,
        });
    }

    #[test]
    fn test_snapshot_with_walls_and_tanks() {
        roundtrip(Message::Snapshot(Snapshot {
            server_tick: 33,
            entities: vec![
                EntityState {
                    entity_id: 1,
                    kind: EntityKind::Wall,
                    position: Vec3::new(0.0, 0.0, 25.0),
                    rotation: 0.0,
                    health: 0,
                    owner_id: 0,
                    name: String::new(),
                    scale: Vec3::new(50.0, 5.0, 1.0),
                },
                EntityState {
                    entity_id: 10,
                    kind: EntityKind::Tank,
                    position: Vec3::new(3.0, 0.0, -4.0),
                    rotation: 90.0,
                    health: 75,
                    owner_id: 10,
                    name: "Player1".into(),
                    scale: Vec3::ONE,
                },
            ],
        }));
    }

    #[test]
    fn test_events() {
        roundtrip(Message::EntitySpawn(EntitySpawn {
            entity_id: 7,
            kind: EntityKind::Tank,
            position: Vec3::new(1.0, 0.0, 2.0),
            rotation: 0.0,
            owner_id: 7,
            name: "Bot".into(),
        }));
        roundtrip(Message::PlayerDamage {
            target_id: 7,
            source_id: 8,
            damage: 25,
            new_health: 75,
        });
        roundtrip(Message::PlayerRespawn {
            player_id: 7,
            position: Vec3::new(-3.0, 0.0, 9.0),
        });
        roundtrip(Message::ProjectileSpawn {
            projectile_id: 20,
            owner_id: 7,
            position: Vec3::new(0.0, 0.0, 0.7),
            velocity: Vec3::new(0.0, 0.0, 15.0),
        });
    }

    #[test]
    fn test_truncated_payload_is_codec_error() {
        let payload = Message::PlayerDeath {
            player_id: 1,
            killer_id: 2,
        }
        .encode()
        .unwrap();

        assert!(matches!(
            Message::decode(MessageType::PlayerDeath as u8, &payload[..5]),
            Err(MessageError::Codec(CodecError::BufferUnderrun { .. }))
        ));
    }
}
