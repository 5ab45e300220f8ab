pub const TANK_RADIUS: f32 = 1.0;
pub const TANK_SPEED: f32 = 5.0;
pub const TANK_MAX_HEALTH: u8 = 100;

pub const PROJECTILE_RADIUS: f32 = 0.15;
pub const PROJECTILE_SPEED: f32 = 15.0;
pub const PROJECTILE_SPAWN_OFFSET: f32 = 0.7;
pub const PROJECTILE_LIFETIME: f32 = 5.0;
pub const PROJECTILE_DAMAGE: u8 = 25;

pub const RESPAWN_TIME: f32 = 3.0;
pub const SHOOT_COOLDOWN: f32 = 0.5;

pub const SPAWN_AREA_HALF_SIZE: f32 = 20.0;
pub const SPAWN_ATTEMPTS: u32 = 20;
pub const SPAWN_CLEARANCE: f32 = TANK_RADIUS * 3.0;

/// ~3 s of inputs at 20 Hz.
pub const INPUT_BUFFER_SIZE: usize = 60;
pub const MAX_PLAYER_NAME_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct GameplayConfig {
    pub tank_speed: f32,
    pub projectile_speed: f32,
    pub projectile_spawn_offset: f32,
    pub projectile_lifetime: f32,
    pub projectile_damage: u8,
    pub respawn_time: f32,
    pub shoot_cooldown: f32,
    pub spawn_area_half_size: f32,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            tank_speed: TANK_SPEED,
            projectile_speed: PROJECTILE_SPEED,
            projectile_spawn_offset: PROJECTILE_SPAWN_OFFSET,
            projectile_lifetime: PROJECTILE_LIFETIME,
            projectile_damage: PROJECTILE_DAMAGE,
            respawn_time: RESPAWN_TIME,
            shoot_cooldown: SHOOT_COOLDOWN,
            spawn_area_half_size: SPAWN_AREA_HALF_SIZE,
        }
    }
}
