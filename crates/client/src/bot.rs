use std::time::{Duration, Instant};

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::net::GameClient;

pub const BEHAVIOR_CHANGE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SHOOT_CHANCE: f64 = 0.1;

/// Headless driver that wanders, turns and fires at random.
#[derive(Debug)]
pub struct Bot {
    rng: StdRng,
    move_input: Vec2,
    aim_input: Vec2,
    shoot_chance: f64,
    input_interval: Duration,
    next_behavior_change: Instant,
    next_input: Instant,
}

impl Bot {
    pub fn new(seed: u64, shoot_chance: f64, input_interval: Duration, now: Instant) -> Self {
        let mut bot = Self {
            rng: StdRng::seed_from_u64(seed),
            move_input: Vec2::ZERO,
            aim_input: Vec2::Y,
            shoot_chance: shoot_chance.clamp(0.0, 1.0),
            input_interval,
            next_behavior_change: now + BEHAVIOR_CHANGE_INTERVAL,
            next_input: now,
        };
        bot.randomize();
        bot
    }

    pub fn move_input(&self) -> Vec2 {
        self.move_input
    }

    pub fn aim_input(&self) -> Vec2 {
        self.aim_input
    }

    fn randomize(&mut self) {
        let move_input = Vec2::new(self.rng.gen_range(-1.0..=1.0), self.rng.gen_range(-1.0..=1.0));
        self.move_input = if move_input.length_squared() > 1.0 {
            move_input.normalize()
        } else {
            move_input
        };

        let angle: f32 = self.rng.gen_range(0.0..std::f32::consts::TAU);
        self.aim_input = Vec2::new(angle.cos(), angle.sin());
    }

    /// Returns the sticks to send when an input is due, rolling the shoot
    /// chance once per input.
    pub fn think(&mut self, now: Instant) -> Option<(Vec2, Vec2, bool)> {
        if now >= self.next_behavior_change {
            self.next_behavior_change = now + BEHAVIOR_CHANGE_INTERVAL;
            self.randomize();
        }

        if now < self.next_input {
            return None;
        }
        self.next_input = now + self.input_interval;

        let shoot = self.rng.gen_bool(self.shoot_chance);
        Some((self.move_input, self.aim_input, shoot))
    }

    pub fn drive(&mut self, client: &mut GameClient, now: Instant) {
        if let Some((move_input, aim_input, shoot)) = self.think(now) {
            client.set_input(move_input, aim_input, shoot);
        }
    }
}
