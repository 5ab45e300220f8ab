use glam::Vec2;

use tanknet::physics::{ProjectileHit, move_tank, projectile_hit, rotate_tank, yaw_direction};
use tanknet::{Entity, EntityKind, GameEvent, GameplayConfig, PlayerInput, World};

/// Moves and turns a tank for one tick of input. Dead or missing tanks are
/// left alone.
pub fn apply_input(world: &mut World, tank_id: u32, input: &PlayerInput, config: &GameplayConfig, dt: f32) {
    move_tank(
        world,
        tank_id,
        Vec2::new(input.move_x, input.move_y),
        config.tank_speed,
        dt,
    );

    if let Some(tank) = world.get_mut(tank_id).filter(|e| e.is_alive()) {
        rotate_tank(tank, Vec2::new(input.aim_x, input.aim_y));
    }
}

/// Spawns a projectile just ahead of the tank along its heading.
pub fn fire_projectile(world: &mut World, tank_id: u32, config: &GameplayConfig) -> Option<GameEvent> {
    let tank = world
        .get(tank_id)
        .filter(|e| e.kind == EntityKind::Tank && e.is_alive())?;

    let direction = yaw_direction(tank.rotation);
    let position = tank.position + direction * config.projectile_spawn_offset;
    let velocity = direction * config.projectile_speed;

    let projectile = world.spawn_projectile(tank_id, position, velocity, config.projectile_lifetime);
    Some(GameEvent::ProjectileFired {
        projectile_id: projectile.id(),
        owner_id: tank_id,
        position,
        velocity,
    })
}

/// Ages and moves projectiles, despawning the ones whose lifetime ran out.
pub fn expire_projectiles(world: &mut World, dt: f32) -> Vec<GameEvent> {
    world
        .update_physics(dt)
        .into_iter()
        .filter_map(|entity_id| {
            world
                .despawn(entity_id)
                .map(|_| GameEvent::Despawn { entity_id })
        })
        .collect()
}

/// Returns `true` when the hit killed the tank.
pub fn apply_damage(tank: &mut Entity, damage: u8) -> bool {
    if tank.health <= damage {
        tank.health = 0;
        true
    } else {
        tank.health -= damage;
        false
    }
}

/// Tests every projectile in id order. A hit removes the projectile and
/// damages the tank it struck; despawns are reported after all damage.
pub fn resolve_projectile_hits(world: &mut World, damage: u8) -> Vec<GameEvent> {
    let projectile_ids: Vec<u32> = world.of_kind(EntityKind::Projectile).map(|e| e.id).collect();
    let mut events = Vec::new();
    let mut removed = Vec::new();

    for projectile_id in projectile_ids {
        let Some(projectile) = world.get(projectile_id).cloned() else {
            continue;
        };
        let Some(hit) = projectile_hit(world, &projectile) else {
            continue;
        };

        if let ProjectileHit::Tank(target_id) = hit {
            if let Some(target) = world.get_mut(target_id) {
                let died = apply_damage(target, damage);
                events.push(GameEvent::Damage {
                    target_id,
                    source_id: projectile.owner_id,
                    damage,
                    new_health: target.health,
                });
                if died {
                    events.push(GameEvent::Death {
                        player_id: target_id,
                        killer_id: projectile.owner_id,
                    });
                }
            }
        }

        world.despawn(projectile_id);
        removed.push(projectile_id);
    }

    events.extend(removed.into_iter().map(|entity_id| GameEvent::Despawn { entity_id }));
    events
}
