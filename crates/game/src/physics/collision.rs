use glam::{Vec2, Vec3};
use rand::Rng;

use crate::player::config::{
    PROJECTILE_RADIUS, SPAWN_ATTEMPTS, SPAWN_CLEARANCE, TANK_RADIUS,
};
use crate::snapshot::{Entity, EntityKind, World};

const MIN_MOVE_SQ: f32 = 0.001;
const MIN_AIM_SQ: f32 = 0.01;

/// Circle (XZ plane) against an axis-aligned box given by centre and full size.
/// Touching counts as a hit.
pub fn circle_intersects_box(center: Vec3, radius: f32, box_position: Vec3, box_scale: Vec3) -> bool {
    let half = box_scale * 0.5;
    let min = box_position - half;
    let max = box_position + half;

    let closest_x = center.x.clamp(min.x, max.x);
    let closest_z = center.z.clamp(min.z, max.z);
    let dx = center.x - closest_x;
    let dz = center.z - closest_z;

    dx * dx + dz * dz <= radius * radius
}

pub fn circle_hits_wall(center: Vec3, radius: f32, wall: &Entity) -> bool {
    circle_intersects_box(center, radius, wall.position, wall.scale)
}

/// Planar heading for a yaw in degrees; 0 faces +Z, 90 faces +X.
pub fn yaw_direction(yaw_degrees: f32) -> Vec3 {
    let (sin, cos) = yaw_degrees.to_radians().sin_cos();
    Vec3::new(sin, 0.0, cos)
}

/// Yaw in degrees for an aim stick, or `None` inside the dead zone.
pub fn aim_to_yaw(aim: Vec2) -> Option<f32> {
    (aim.length_squared() > MIN_AIM_SQ).then(|| aim.x.atan2(aim.y).to_degrees())
}

/// Normalised XZ direction for a move stick, or `None` inside the dead zone.
pub fn move_direction(input: Vec2) -> Option<Vec3> {
    (input.length_squared() >= MIN_MOVE_SQ).then(|| Vec3::new(input.x, 0.0, input.y).normalize())
}

/// Whether a tank centred at `position` would overlap a wall or another
/// live tank other than `ignore_id`.
pub fn tank_blocked(world: &World, position: Vec3, ignore_id: u32) -> bool {
    world.entities().any(|other| match other.kind {
        EntityKind::Wall => circle_hits_wall(position, TANK_RADIUS, other),
        EntityKind::Tank => {
            other.id != ignore_id
                && other.is_alive()
                && position.distance(other.position) < TANK_RADIUS * 2.0
        }
        EntityKind::Projectile => false,
    })
}

/// Moves a live tank by `speed * dt` along the input. A blocked candidate
/// position rejects the whole step. Returns `true` if the tank moved.
pub fn move_tank(world: &mut World, tank_id: u32, input: Vec2, speed: f32, dt: f32) -> bool {
    let Some(direction) = move_direction(input) else {
        return false;
    };
    let Some(tank) = world.get(tank_id).filter(|e| e.kind == EntityKind::Tank && e.is_alive()) else {
        return false;
    };

    let candidate = tank.position + direction * speed * dt;
    if tank_blocked(world, candidate, tank_id) {
        return false;
    }

    if let Some(tank) = world.get_mut(tank_id) {
        tank.position = candidate;
    }
    true
}

pub fn rotate_tank(tank: &mut Entity, aim: Vec2) {
    if let Some(yaw) = aim_to_yaw(aim) {
        tank.rotation = yaw;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileHit {
    Wall(u32),
    Tank(u32),
}

/// Walls first, then live tanks other than the owner; first match wins.
pub fn projectile_hit(world: &World, projectile: &Entity) -> Option<ProjectileHit> {
    if let Some(wall) = world
        .walls()
        .find(|wall| circle_hits_wall(projectile.position, PROJECTILE_RADIUS, wall))
    {
        return Some(ProjectileHit::Wall(wall.id));
    }

    world
        .of_kind(EntityKind::Tank)
        .filter(|tank| tank.id != projectile.owner_id && tank.is_alive())
        .find(|tank| projectile.position.distance(tank.position) < TANK_RADIUS + PROJECTILE_RADIUS)
        .map(|tank| ProjectileHit::Tank(tank.id))
}

/// Uniform point in the spawn square clear of walls and at least three tank
/// radii from any live tank. Falls back to the origin when every attempt fails.
pub fn safe_spawn_position<R: Rng + ?Sized>(world: &World, rng: &mut R, half_size: f32) -> Vec3 {
    for _ in 0..SPAWN_ATTEMPTS {
        let candidate = Vec3::new(
            rng.gen_range(-half_size..=half_size),
            0.0,
            rng.gen_range(-half_size..=half_size),
        );

        let clear = world.entities().all(|entity| match entity.kind {
            EntityKind::Wall => !circle_hits_wall(candidate, TANK_RADIUS, entity),
            EntityKind::Tank => {
                !entity.is_alive() || candidate.distance(entity.position) >= SPAWN_CLEARANCE
            }
            EntityKind::Projectile => true,
        });

        if clear {
            return candidate;
        }
    }

    log::warn!("No safe spawn point after {SPAWN_ATTEMPTS} attempts, using origin");
    Vec3::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::map::Arena;

    #[test]
    fn circle_box_overlap() {
        let wall_pos = Vec3::new(0.0, 0.0, 25.0);
        let wall_scale = Vec3::new(50.0, 5.0, 1.0);

        assert!(circle_intersects_box(Vec3::new(0.0, 0.0, 23.6), 1.0, wall_pos, wall_scale));
        assert!(!circle_intersects_box(Vec3::new(0.0, 0.0, 23.4), 1.0, wall_pos, wall_scale));
        // corner
        assert!(!circle_intersects_box(Vec3::new(25.8, 0.0, 26.3), 1.0, wall_pos, wall_scale));
        assert!(circle_intersects_box(Vec3::new(25.5, 0.0, 25.5), 1.0, wall_pos, wall_scale));
        // y is ignored
        assert!(circle_intersects_box(Vec3::new(0.0, 100.0, 25.0), 0.1, wall_pos, wall_scale));
    }

    #[test]
    fn aim_and_heading() {
        assert_eq!(aim_to_yaw(Vec2::new(0.05, 0.05)), None);
        assert!((aim_to_yaw(Vec2::new(1.0, 0.0)).unwrap_or_default() - 90.0).abs() < 1e-4);
        assert!(aim_to_yaw(Vec2::new(0.0, 1.0)).unwrap_or(1.0).abs() < 1e-4);

        let east = yaw_direction(90.0);
        assert!((east - Vec3::X).length() < 1e-5);
        let north = yaw_direction(0.0);
        assert!((north - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn move_into_wall_is_rejected() {
        let mut world = World::new();
        world.spawn_wall(Vec3::new(0.0, 0.0, 25.0), Vec3::new(50.0, 5.0, 1.0));
        let tank = world.spawn_tank("t", Vec3::new(0.0, 0.0, 23.4));

        assert!(!move_tank(&mut world, tank.id(), Vec2::new(0.0, 1.0), 5.0, 0.05));
        assert_eq!(world.get(tank.id()).map(|e| e.position), Some(Vec3::new(0.0, 0.0, 23.4)));

        assert!(move_tank(&mut world, tank.id(), Vec2::new(0.0, -1.0), 5.0, 0.05));
        let z = world.get(tank.id()).map(|e| e.position.z).unwrap_or_default();
        assert!((z - 23.15).abs() < 1e-4);
    }

    #[test]
    fn move_is_normalised_and_dead_zoned() {
        let mut world = World::new();
        let tank = world.spawn_tank("t", Vec3::ZERO);

        assert!(!move_tank(&mut world, tank.id(), Vec2::new(0.01, 0.01), 5.0, 0.05));
        assert!(move_tank(&mut world, tank.id(), Vec2::new(3.0, 4.0), 5.0, 1.0));
        let pos = world.get(tank.id()).map(|e| e.position).unwrap_or_default();
        assert!((pos - Vec3::new(3.0, 0.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn tanks_block_each_other_unless_dead() {
        let mut world = World::new();
        let a = world.spawn_tank("a", Vec3::ZERO);
        let b = world.spawn_tank("b", Vec3::new(2.1, 0.0, 0.0));

        assert!(!move_tank(&mut world, a.id(), Vec2::new(1.0, 0.0), 5.0, 0.05));

        if let Some(tank) = world.get_mut(b.id()) {
            tank.health = 0;
        }
        assert!(move_tank(&mut world, a.id(), Vec2::new(1.0, 0.0), 5.0, 0.05));
    }

    #[test]
    fn projectile_hits_non_owner_once() {
        let mut world = World::new();
        let shooter = world.spawn_tank("s", Vec3::ZERO);
        let target = world.spawn_tank("t", Vec3::new(0.0, 0.0, 5.0));
        let shot = world.spawn_projectile(shooter.id(), Vec3::new(0.0, 0.0, 0.7), Vec3::new(0.0, 0.0, 15.0), 5.0);

        let projectile = world.get(shot.id()).cloned().unwrap();
        assert_eq!(projectile_hit(&world, &projectile), None);

        if let Some(p) = world.get_mut(shot.id()) {
            p.position.z = 3.9;
        }
        let projectile = world.get(shot.id()).cloned().unwrap();
        assert_eq!(projectile_hit(&world, &projectile), Some(ProjectileHit::Tank(target.id())));
    }

    #[test]
    fn projectile_checks_walls_first() {
        let mut world = World::new();
        let target = world.spawn_tank("t", Vec3::new(0.0, 0.0, 5.0));
        let wall = world.spawn_wall(Vec3::new(0.0, 0.0, 4.5), Vec3::new(4.0, 5.0, 1.0));
        let shot = world.spawn_projectile(99, Vec3::new(0.0, 0.0, 4.0), Vec3::Z, 5.0);

        let projectile = world.get(shot.id()).cloned().unwrap();
        assert_eq!(projectile_hit(&world, &projectile), Some(ProjectileHit::Wall(wall.id())));
        assert_ne!(wall.id(), target.id());
    }

    #[test]
    fn spawn_points_are_clear_and_reproducible() {
        let mut world = World::new();
        Arena::new().spawn(&mut world);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..8 {
            let pos = safe_spawn_position(&world, &mut rng, 20.0);
            assert!(!tank_blocked(&world, pos, 0));
            world.spawn_tank("t", pos);
        }

        let mut first = StdRng::seed_from_u64(5);
        let mut second = StdRng::seed_from_u64(5);
        assert_eq!(
            safe_spawn_position(&world, &mut first, 20.0),
            safe_spawn_position(&world, &mut second, 20.0)
        );
    }

    #[test]
    fn crowded_spawn_falls_back_to_origin() {
        let mut world = World::new();
        world.spawn_wall(Vec3::ZERO, Vec3::new(100.0, 5.0, 100.0));

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(safe_spawn_position(&world, &mut rng, 20.0), Vec3::ZERO);
    }
}
