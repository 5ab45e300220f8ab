use glam::Vec3;

use crate::message::{EntityDelta, EntitySpawn, EntityState, MessageError};
use crate::player::config::{
    PROJECTILE_LIFETIME, PROJECTILE_RADIUS, TANK_MAX_HEALTH, TANK_RADIUS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum EntityKind {
    #[default]
    Tank = 0,
    Projectile = 1,
    Wall = 2,
}

impl TryFrom<u8> for EntityKind {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Tank),
            1 => Ok(Self::Projectile),
            2 => Ok(Self::Wall),
            other => Err(MessageError::InvalidEntityKind(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Server-side entity. The `prev_*` fields hold what was last replicated.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: u32,
    pub kind: EntityKind,
    pub position: Vec3,
    /// Yaw in degrees.
    pub rotation: f32,
    pub health: u8,
    pub owner_id: u32,
    pub name: String,
    pub scale: Vec3,
    pub velocity: Vec3,
    pub lifetime: f32,
    pub prev_position: Vec3,
    pub prev_rotation: f32,
    pub prev_health: u8,
}

impl Entity {
    fn new(id: u32, kind: EntityKind, position: Vec3) -> Self {
        Self {
            id,
            kind,
            position,
            rotation: 0.0,
            health: 0,
            owner_id: 0,
            name: String::new(),
            scale: Vec3::ONE,
            velocity: Vec3::ZERO,
            lifetime: 0.0,
            prev_position: position,
            prev_rotation: 0.0,
            prev_health: 0,
        }
    }

    pub fn tank(id: u32, name: impl Into<String>, position: Vec3) -> Self {
        let mut entity = Self::new(id, EntityKind::Tank, position);
        entity.health = TANK_MAX_HEALTH;
        entity.prev_health = TANK_MAX_HEALTH;
        entity.owner_id = id;
        entity.name = name.into();
        entity
    }

    pub fn projectile(id: u32, owner_id: u32, position: Vec3, velocity: Vec3) -> Self {
        let mut entity = Self::new(id, EntityKind::Projectile, position);
        entity.health = 1;
        entity.prev_health = 1;
        entity.owner_id = owner_id;
        entity.velocity = velocity;
        entity.lifetime = PROJECTILE_LIFETIME;
        entity
    }

    pub fn wall(id: u32, position: Vec3, scale: Vec3) -> Self {
        let mut entity = Self::new(id, EntityKind::Wall, position);
        entity.health = u8::MAX;
        entity.prev_health = u8::MAX;
        entity.scale = scale;
        entity
    }

    pub fn handle(&self) -> EntityHandle {
        EntityHandle(self.id)
    }

    pub fn is_wall(&self) -> bool {
        self.kind == EntityKind::Wall
    }

    pub fn is_alive(&self) -> bool {
        match self.kind {
            EntityKind::Tank => self.health > 0,
            EntityKind::Projectile => self.lifetime > 0.0,
            EntityKind::Wall => true,
        }
    }

    pub fn radius(&self) -> f32 {
        match self.kind {
            EntityKind::Tank => TANK_RADIUS,
            EntityKind::Projectile => PROJECTILE_RADIUS,
            EntityKind::Wall => 0.0,
        }
    }

    pub fn has_changed(&self, epsilon: f32) -> bool {
        !self.to_delta(epsilon).is_empty()
    }

    pub fn to_delta(&self, epsilon: f32) -> EntityDelta {
        EntityDelta::from_fields(
            self.id,
            (self.prev_position, self.prev_rotation, self.prev_health),
            (self.position, self.rotation, self.health),
            epsilon,
        )
    }

    pub fn update_previous(&mut self) {
        self.prev_position = self.position;
        self.prev_rotation = self.rotation;
        self.prev_health = self.health;
    }

    pub fn to_state(&self) -> EntityState {
        EntityState {
            entity_id: self.id,
            kind: self.kind,
            position: self.position,
            rotation: self.rotation,
            health: self.health,
            owner_id: self.owner_id,
            name: self.name.clone(),
            scale: self.scale,
        }
    }

    pub fn to_spawn(&self) -> EntitySpawn {
        EntitySpawn {
            entity_id: self.id,
            kind: self.kind,
            position: self.position,
            rotation: self.rotation,
            owner_id: self.owner_id,
            name: self.name.clone(),
        }
    }
}
