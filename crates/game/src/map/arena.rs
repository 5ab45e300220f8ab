use glam::Vec3;

use crate::snapshot::{EntityHandle, World};

use super::{MapObject, MapObjectKind};

/// Square walled arena with five interior blocks.
pub struct Arena {
    objects: Vec<MapObject>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub const HALF_SIZE: f32 = 25.0;
    const WALL_HEIGHT: f32 = 5.0;
    const WALL_THICKNESS: f32 = 1.0;

    pub fn new() -> Self {
        let mut objects = Vec::new();

        Self::add_boundary(&mut objects);
        Self::add_obstacles(&mut objects);

        Self { objects }
    }

    fn add_boundary(objects: &mut Vec<MapObject>) {
        let span = Self::HALF_SIZE * 2.0;
        let along_x = Vec3::new(span, Self::WALL_HEIGHT, Self::WALL_THICKNESS);
        let along_z = Vec3::new(Self::WALL_THICKNESS, Self::WALL_HEIGHT, span);

        objects.push(MapObject::boundary(Vec3::new(0.0, 0.0, Self::HALF_SIZE), along_x));
        objects.push(MapObject::boundary(Vec3::new(0.0, 0.0, -Self::HALF_SIZE), along_x));
        objects.push(MapObject::boundary(Vec3::new(Self::HALF_SIZE, 0.0, 0.0), along_z));
        objects.push(MapObject::boundary(Vec3::new(-Self::HALF_SIZE, 0.0, 0.0), along_z));
    }

    fn add_obstacles(objects: &mut Vec<MapObject>) {
        let wide = Vec3::new(5.0, Self::WALL_HEIGHT, 1.0);
        let deep = Vec3::new(1.0, Self::WALL_HEIGHT, 5.0);

        objects.push(MapObject::obstacle(Vec3::new(10.0, 0.0, 10.0), wide));
        objects.push(MapObject::obstacle(Vec3::new(-10.0, 0.0, 10.0), deep));
        objects.push(MapObject::obstacle(Vec3::new(10.0, 0.0, -10.0), deep));
        objects.push(MapObject::obstacle(Vec3::new(-10.0, 0.0, -10.0), wide));
        objects.push(MapObject::obstacle(
            Vec3::ZERO,
            Vec3::new(3.0, Self::WALL_HEIGHT, 3.0),
        ));
    }

    pub fn objects(&self) -> &[MapObject] {
        &self.objects
    }

    pub fn spawn(&mut self, world: &mut World) {
        for object in &mut self.objects {
            let handle = world.spawn_wall(object.position, object.scale);
            object.entity_id = Some(handle.id());
        }
        log::info!(
            "Arena spawned: {} boundary walls, {} obstacles",
            self.count(MapObjectKind::Boundary),
            self.count(MapObjectKind::Obstacle)
        );
    }

    pub fn wall_handles(&self) -> Vec<EntityHandle> {
        self.objects
            .iter()
            .filter_map(|obj| obj.entity_id.map(EntityHandle))
            .collect()
    }

    fn count(&self, kind: MapObjectKind) -> usize {
        self.objects.iter().filter(|o| o.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_spawns_walls() {
        let mut arena = Arena::new();
        let mut world = World::new();

        arena.spawn(&mut world);

        assert_eq!(world.entity_count(), 9);
        assert_eq!(arena.wall_handles().len(), 9);
        assert!(world.entities().all(|e| e.is_wall()));
    }

    #[test]
    fn boundary_encloses_spawn_area() {
        let arena = Arena::new();
        let north = &arena.objects()[0];
        assert_eq!(north.position, Vec3::new(0.0, 0.0, 25.0));
        assert_eq!(north.scale, Vec3::new(50.0, 5.0, 1.0));
        // inner face sits beyond the spawn square plus a tank radius
        assert!(north.position.z - north.half_extents().z > 20.0 + 1.0);
    }
}
