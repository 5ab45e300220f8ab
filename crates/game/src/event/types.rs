use glam::Vec3;

use crate::message::Message;

/// Outcome of one simulation step that every player must hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Damage {
        target_id: u32,
        source_id: u32,
        damage: u8,
        new_health: u8,
    },
    Death {
        player_id: u32,
        killer_id: u32,
    },
    Despawn {
        entity_id: u32,
    },
    Respawn {
        player_id: u32,
        position: Vec3,
    },
    ProjectileFired {
        projectile_id: u32,
        owner_id: u32,
        position: Vec3,
        velocity: Vec3,
    },
}

impl GameEvent {
    pub fn to_message(&self) -> Message {
        match *self {
            Self::Damage {
                target_id,
                source_id,
                damage,
                new_health,
            } => Message::PlayerDamage {
                target_id,
                source_id,
                damage,
                new_health,
            },
            Self::Death {
                player_id,
                killer_id,
            } => Message::PlayerDeath {
                player_id,
                killer_id,
            },
            Self::Despawn { entity_id } => Message::EntityDespawn { entity_id },
            Self::Respawn {
                player_id,
                position,
            } => Message::PlayerRespawn {
                player_id,
                position,
            },
            Self::ProjectileFired {
                projectile_id,
                owner_id,
                position,
                velocity,
            } => Message::ProjectileSpawn {
                projectile_id,
                owner_id,
                position,
                velocity,
            },
        }
    }
}
