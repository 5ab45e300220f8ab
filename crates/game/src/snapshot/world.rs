use std::collections::BTreeMap;

use glam::Vec3;

use crate::message::{EntityDelta, Snapshot};

use super::entity::{Entity, EntityHandle, EntityKind};

/// Authoritative entity store. Iteration is in ascending id order so every
/// tick resolves collisions and builds messages deterministically.
#[derive(Debug)]
pub struct World {
    tick: u32,
    entities: BTreeMap<u32, Entity>,
    next_entity_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            tick: 0,
            entities: BTreeMap::new(),
            next_entity_id: 1,
        }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn advance_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn spawn_tank(&mut self, name: &str, position: Vec3) -> EntityHandle {
        let id = self.allocate_id();
        self.entities.insert(id, Entity::tank(id, name, position));
        EntityHandle(id)
    }

    pub fn spawn_projectile(
        &mut self,
        owner_id: u32,
        position: Vec3,
        velocity: Vec3,
        lifetime: f32,
    ) -> EntityHandle {
        let id = self.allocate_id();
        let mut projectile = Entity::projectile(id, owner_id, position, velocity);
        projectile.lifetime = lifetime;
        self.entities.insert(id, projectile);
        EntityHandle(id)
    }

    pub fn spawn_wall(&mut self, position: Vec3, scale: Vec3) -> EntityHandle {
        let id = self.allocate_id();
        self.entities.insert(id, Entity::wall(id, position, scale));
        EntityHandle(id)
    }

    pub fn despawn(&mut self, id: u32) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.kind == kind)
    }

    pub fn walls(&self) -> impl Iterator<Item = &Entity> {
        self.of_kind(EntityKind::Wall)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Ages and moves projectiles. Returns ids whose lifetime ran out; they
    /// stay in the world until the caller despawns them.
    pub fn update_physics(&mut self, dt: f32) -> Vec<u32> {
        let mut expired = Vec::new();
        for entity in self.entities.values_mut() {
            if entity.kind != EntityKind::Projectile {
                continue;
            }
            entity.lifetime -= dt;
            if entity.lifetime <= 0.0 {
                expired.push(entity.id);
                continue;
            }
            entity.position += entity.velocity * dt;
        }
        expired
    }

    /// Deltas for every non-wall entity that moved, turned or changed health
    /// since the last [`Self::update_previous`].
    pub fn changed_entities(&self, epsilon: f32) -> Vec<EntityDelta> {
        self.entities
            .values()
            .filter(|e| !e.is_wall())
            .map(|e| e.to_delta(epsilon))
            .filter(|d| !d.is_empty())
            .collect()
    }

    pub fn update_previous(&mut self) {
        for entity in self.entities.values_mut() {
            entity.update_previous();
        }
    }

    pub fn snapshot(&self, include_walls: bool) -> Snapshot {
        Snapshot {
            server_tick: self.tick,
            entities: self
                .entities
                .values()
                .filter(|e| include_walls || !e.is_wall())
                .map(Entity::to_state)
                .collect(),
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.wrapping_add(1).max(1);
        id
    }
}
