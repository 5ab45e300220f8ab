use std::net::SocketAddr;

use crate::simulation::InputBuffer;

use super::config::INPUT_BUFFER_SIZE;

/// Server-side bookkeeping for one joined player.
#[derive(Debug)]
pub struct PlayerState {
    pub client_id: u32,
    pub addr: SocketAddr,
    pub name: String,
    pub entity_id: u32,
    pub alive: bool,
    pub respawn_timer: f32,
    pub shoot_cooldown: f32,
    pub inputs: InputBuffer,
    pub kills: u32,
    pub deaths: u32,
}

impl PlayerState {
    pub fn new(client_id: u32, addr: SocketAddr, name: impl Into<String>, entity_id: u32) -> Self {
        Self {
            client_id,
            addr,
            name: name.into(),
            entity_id,
            alive: true,
            respawn_timer: 0.0,
            shoot_cooldown: 0.0,
            inputs: InputBuffer::new(INPUT_BUFFER_SIZE),
            kills: 0,
            deaths: 0,
        }
    }

    pub fn die(&mut self, respawn_time: f32) {
        self.alive = false;
        self.respawn_timer = respawn_time;
        self.deaths += 1;
        self.inputs.clear();
    }

    /// Counts the respawn timer down; returns `true` once the player is due.
    pub fn tick_respawn(&mut self, dt: f32) -> bool {
        if self.alive {
            return false;
        }
        self.respawn_timer = (self.respawn_timer - dt).max(0.0);
        self.respawn_timer <= 0.0
    }

    pub fn respawn(&mut self) {
        self.alive = true;
        self.respawn_timer = 0.0;
        self.shoot_cooldown = 0.0;
    }

    pub fn tick_cooldown(&mut self, dt: f32) {
        self.shoot_cooldown = (self.shoot_cooldown - dt).max(0.0);
    }

    pub fn can_shoot(&self) -> bool {
        self.shoot_cooldown <= 0.0
    }
}
