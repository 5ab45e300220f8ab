use glam::Vec2;

use tanknet::PlayerInput;

/// Latest stick state from the presentation side. A shoot request latches
/// until the next input is sent so short taps between sends are not lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub move_input: Vec2,
    pub aim_input: Vec2,
    pub shoot: bool,
}

impl InputState {
    pub fn set(&mut self, move_input: Vec2, aim_input: Vec2, shoot: bool) {
        self.move_input = move_input;
        self.aim_input = aim_input;
        self.shoot |= shoot;
    }

    /// Builds the wire input and clears the shoot latch.
    pub fn take_input(&mut self, input_sequence: u32, server_tick: u32) -> PlayerInput {
        let input = PlayerInput {
            input_sequence,
            server_tick,
            move_x: self.move_input.x,
            move_y: self.move_input.y,
            aim_x: self.aim_input.x,
            aim_y: self.aim_input.y,
            shoot: self.shoot,
        };
        self.shoot = false;
        input
    }
}
