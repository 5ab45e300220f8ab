mod collision;

pub use collision::{
    ProjectileHit, aim_to_yaw, circle_hits_wall, circle_intersects_box, move_direction,
    move_tank, projectile_hit, rotate_tank, safe_spawn_position, tank_blocked, yaw_direction,
};
