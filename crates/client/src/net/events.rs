use glam::Vec3;

use tanknet::EntityKind;

/// What the presentation side hears about, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected {
        client_id: u32,
        entity_id: u32,
    },
    Disconnected {
        reason: String,
    },
    ConnectionFailed {
        reason: String,
    },
    EntitySpawned {
        entity_id: u32,
        kind: EntityKind,
    },
    EntityDespawned {
        entity_id: u32,
    },
    ProjectileSpawned {
        projectile_id: u32,
        owner_id: u32,
        position: Vec3,
        velocity: Vec3,
    },
    Damaged {
        target_id: u32,
        source_id: u32,
        damage: u8,
        new_health: u8,
    },
    Died {
        player_id: u32,
        killer_id: u32,
    },
    Respawned {
        player_id: u32,
        position: Vec3,
    },
}
