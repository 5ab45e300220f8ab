use std::collections::BTreeMap;

use glam::Vec3;

use tanknet::player::config::{PROJECTILE_SPAWN_OFFSET, TANK_MAX_HEALTH};
use tanknet::{DeltaUpdate, EntityKind, EntitySpawn, EntityState, Snapshot};

/// Blends two yaws in degrees along the shorter arc.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let delta = (to - from + 180.0).rem_euclid(360.0) - 180.0;
    from + delta * t
}

/// Client view of a server entity. `position` and `rotation` are what the
/// presentation side should draw.
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    pub id: u32,
    pub kind: EntityKind,
    pub position: Vec3,
    pub rotation: f32,
    pub health: u8,
    pub owner_id: u32,
    pub name: String,
    pub scale: Vec3,
    pub velocity: Vec3,
    pub alive: bool,
    start_position: Vec3,
    start_rotation: f32,
    target_position: Vec3,
    target_rotation: f32,
    elapsed: f32,
}

impl RemoteEntity {
    fn new(id: u32, kind: EntityKind, position: Vec3, rotation: f32) -> Self {
        Self {
            id,
            kind,
            position,
            rotation,
            health: match kind {
                EntityKind::Tank => TANK_MAX_HEALTH,
                EntityKind::Projectile => 1,
                EntityKind::Wall => u8::MAX,
            },
            owner_id: 0,
            name: String::new(),
            scale: Vec3::ONE,
            velocity: Vec3::ZERO,
            alive: true,
            start_position: position,
            start_rotation: rotation,
            target_position: position,
            target_rotation: rotation,
            elapsed: f32::MAX,
        }
    }

    fn from_state(state: &EntityState) -> Self {
        let mut entity = Self::new(state.entity_id, state.kind, state.position, state.rotation);
        entity.owner_id = state.owner_id;
        entity.name = state.name.clone();
        entity.scale = state.scale;
        entity.set_health(state.health);
        entity
    }

    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    pub fn target_rotation(&self) -> f32 {
        self.target_rotation
    }

    /// Starts a new blend from the pose currently drawn.
    fn set_target(&mut self, position: Vec3, rotation: f32) {
        self.start_position = self.position;
        self.start_rotation = self.rotation;
        self.target_position = position;
        self.target_rotation = rotation;
        self.elapsed = 0.0;
    }

    fn snap_to(&mut self, position: Vec3, rotation: f32) {
        self.position = position;
        self.rotation = rotation;
        self.start_position = position;
        self.start_rotation = rotation;
        self.target_position = position;
        self.target_rotation = rotation;
        self.elapsed = f32::MAX;
    }

    fn set_health(&mut self, health: u8) {
        self.health = health;
        if self.kind == EntityKind::Tank {
            self.alive = health > 0;
        }
    }

    fn advance(&mut self, dt: f32, window: f32) {
        if self.velocity != Vec3::ZERO {
            let step = self.velocity * dt;
            self.start_position += step;
            self.target_position += step;
            if self.elapsed >= window {
                self.position += step;
            }
        }

        if self.elapsed >= window {
            return;
        }

        self.elapsed += dt;
        if self.elapsed >= window {
            self.position = self.target_position;
            self.rotation = self.target_rotation;
        } else {
            let t = self.elapsed / window;
            self.position = self.start_position.lerp(self.target_position, t);
            self.rotation = lerp_angle(self.start_rotation, self.target_rotation, t);
        }
    }
}

/// Entity-set changes caused by one full snapshot.
#[derive(Debug, Default)]
pub struct SnapshotChanges {
    pub spawned: Vec<(u32, EntityKind)>,
    pub removed: Vec<u32>,
    pub local_updated: bool,
}

/// Replicated copy of the server world.
#[derive(Debug)]
pub struct ReplicatedWorld {
    entities: BTreeMap<u32, RemoteEntity>,
    local_entity_id: Option<u32>,
    window: f32,
    latest_tick: u32,
}

impl ReplicatedWorld {
    pub fn new(window_secs: f32) -> Self {
        Self {
            entities: BTreeMap::new(),
            local_entity_id: None,
            window: window_secs.max(f32::EPSILON),
            latest_tick: 0,
        }
    }

    pub fn set_local_entity(&mut self, entity_id: Option<u32>) {
        self.local_entity_id = entity_id;
    }

    pub fn local_entity_id(&self) -> Option<u32> {
        self.local_entity_id
    }

    pub fn latest_tick(&self) -> u32 {
        self.latest_tick
    }

    pub fn get(&self, entity_id: u32) -> Option<&RemoteEntity> {
        self.entities.get(&entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn local_entity(&self) -> Option<&RemoteEntity> {
        self.local_entity_id.and_then(|id| self.entities.get(&id))
    }

    fn is_local(&self, entity_id: u32) -> bool {
        self.local_entity_id == Some(entity_id)
    }

    /// Replaces the entity set. Walls are only sent on join, so they survive
    /// their absence from later snapshots. Snapshots older than the newest
    /// state seen are ignored.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> SnapshotChanges {
        let mut changes = SnapshotChanges::default();
        if snapshot.server_tick < self.latest_tick {
            return changes;
        }
        self.latest_tick = snapshot.server_tick;

        for state in &snapshot.entities {
            let local = self.is_local(state.entity_id);
            match self.entities.get_mut(&state.entity_id) {
                Some(entity) => {
                    if local {
                        entity.snap_to(state.position, state.rotation);
                    } else {
                        entity.set_target(state.position, state.rotation);
                    }
                    entity.set_health(state.health);
                    entity.owner_id = state.owner_id;
                    entity.name.clone_from(&state.name);
                }
                None => {
                    self.entities
                        .insert(state.entity_id, RemoteEntity::from_state(state));
                    changes.spawned.push((state.entity_id, state.kind));
                }
            }
            changes.local_updated |= local;
        }

        let present: Vec<u32> = snapshot.entities.iter().map(|s| s.entity_id).collect();
        self.entities.retain(|id, entity| {
            let keep = entity.kind == EntityKind::Wall || present.contains(id);
            if !keep {
                changes.removed.push(*id);
            }
            keep
        });

        changes
    }

    /// Applies flagged fields to known entities. Returns `true` when the
    /// local entity was touched.
    pub fn apply_delta(&mut self, delta: &DeltaUpdate) -> bool {
        if delta.server_tick < self.latest_tick {
            return false;
        }
        self.latest_tick = delta.server_tick;
        let mut local_updated = false;

        for change in &delta.deltas {
            let local = self.is_local(change.entity_id);
            let Some(entity) = self.entities.get_mut(&change.entity_id) else {
                continue;
            };

            if change.has_position() || change.rot_y.is_some() {
                let mut position = entity.target_position;
                change.apply_position(&mut position);
                let rotation = change.rot_y.unwrap_or(entity.target_rotation);
                if local {
                    entity.snap_to(position, rotation);
                } else {
                    entity.set_target(position, rotation);
                }
            }
            if let Some(health) = change.health {
                entity.set_health(health);
            }
            local_updated |= local;
        }

        local_updated
    }

    /// Returns `false` for an id that is already known.
    pub fn spawn(&mut self, spawn: &EntitySpawn) -> bool {
        if self.entities.contains_key(&spawn.entity_id) {
            return false;
        }
        let mut entity = RemoteEntity::new(spawn.entity_id, spawn.kind, spawn.position, spawn.rotation);
        entity.owner_id = spawn.owner_id;
        entity.name.clone_from(&spawn.name);
        self.entities.insert(spawn.entity_id, entity);
        true
    }

    /// `owner_position` is the predicted pose of the local tank when it fired
    /// the shot, so the projectile leaves the barrel the player sees.
    pub fn spawn_projectile(
        &mut self,
        projectile_id: u32,
        owner_id: u32,
        position: Vec3,
        velocity: Vec3,
        owner_position: Option<Vec3>,
    ) -> bool {
        if self.entities.contains_key(&projectile_id) {
            return false;
        }
        let position = match owner_position {
            Some(origin) => origin + velocity.normalize_or_zero() * PROJECTILE_SPAWN_OFFSET,
            None => position,
        };
        let mut projectile = RemoteEntity::new(projectile_id, EntityKind::Projectile, position, 0.0);
        projectile.owner_id = owner_id;
        projectile.velocity = velocity;
        self.entities.insert(projectile_id, projectile);
        true
    }

    pub fn despawn(&mut self, entity_id: u32) -> bool {
        self.entities.remove(&entity_id).is_some()
    }

    pub fn set_health(&mut self, entity_id: u32, health: u8) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.set_health(health);
        }
    }

    pub fn mark_dead(&mut self, entity_id: u32) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.health = 0;
            entity.alive = false;
        }
    }

    pub fn respawn(&mut self, entity_id: u32, position: Vec3) {
        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.snap_to(position, 0.0);
            entity.health = TANK_MAX_HEALTH;
            entity.alive = true;
        }
    }

    /// Moves every remote entity along its blend. The local tank is driven
    /// by prediction instead.
    pub fn advance(&mut self, dt: f32) {
        let local = self.local_entity_id;
        for entity in self.entities.values_mut() {
            if Some(entity.id) != local {
                entity.advance(dt, self.window);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.local_entity_id = None;
        self.latest_tick = 0;
    }
}
