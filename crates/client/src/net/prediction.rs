use glam::{Vec2, Vec3};

use tanknet::physics::{aim_to_yaw, move_direction};
use tanknet::player::config::TANK_SPEED;

use super::replication::lerp_angle;

/// Errors below this are left alone.
const ERROR_THRESHOLD: f32 = 0.01;
/// Errors above this snap straight to the server state.
const SNAP_THRESHOLD: f32 = 0.5;
const MIN_BLEND: f32 = 0.1;
const MAX_BLEND: f32 = 0.5;

/// Dead-reckoned pose of the locally controlled tank.
#[derive(Debug, Clone)]
pub struct ClientPrediction {
    position: Vec3,
    rotation: f32,
    speed: f32,
}

impl Default for ClientPrediction {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientPrediction {
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            speed: TANK_SPEED,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Advances the predicted pose by one sent input. Walls are not
    /// considered; reconciliation pulls the pose back when the server
    /// blocked the move.
    pub fn apply_input(&mut self, move_input: Vec2, aim_input: Vec2, dt: f32) {
        if let Some(direction) = move_direction(move_input) {
            self.position += direction * self.speed * dt;
        }
        if let Some(yaw) = aim_to_yaw(aim_input) {
            self.rotation = yaw;
        }
    }

    /// Pulls the prediction toward an authoritative pose.
    pub fn reconcile(&mut self, server_position: Vec3, server_rotation: f32) {
        let error = self.position.distance(server_position);

        if error > SNAP_THRESHOLD {
            log::debug!("Prediction off by {error:.2}, snapping");
            self.position = server_position;
            self.rotation = server_rotation;
        } else if error > ERROR_THRESHOLD {
            let blend = (error * 2.0).clamp(MIN_BLEND, MAX_BLEND);
            self.position = self.position.lerp(server_position, blend);
            self.rotation = lerp_angle(self.rotation, server_rotation, blend);
        }
    }

    /// Restarts prediction from a fresh spawn.
    pub fn initialize(&mut self, position: Vec3, rotation: f32) {
        self.position = position;
        self.rotation = rotation;
    }

    pub fn clear(&mut self) {
        self.initialize(Vec3::ZERO, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_at_tank_speed() {
        let mut prediction = ClientPrediction::new();
        prediction.apply_input(Vec2::new(1.0, 0.0), Vec2::ZERO, 0.05);

        assert!((prediction.position() - Vec3::new(0.25, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn aim_sets_rotation_directly() {
        let mut prediction = ClientPrediction::new();
        prediction.apply_input(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.05);
        assert!((prediction.rotation() - 90.0).abs() < 1e-4);

        prediction.apply_input(Vec2::ZERO, Vec2::new(0.01, 0.0), 0.05);
        assert!((prediction.rotation() - 90.0).abs() < 1e-4);
    }

    #[test]
    fn tiny_errors_are_ignored() {
        let mut prediction = ClientPrediction::new();
        prediction.initialize(Vec3::new(1.0, 0.0, 1.0), 0.0);
        prediction.reconcile(Vec3::new(1.005, 0.0, 1.0), 0.0);
        assert_eq!(prediction.position(), Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn large_errors_snap() {
        let mut prediction = ClientPrediction::new();
        prediction.reconcile(Vec3::new(3.0, 0.0, 0.0), 45.0);
        assert_eq!(prediction.position(), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(prediction.rotation(), 45.0);
    }

    #[test]
    fn medium_errors_blend() {
        let mut prediction = ClientPrediction::new();
        prediction.reconcile(Vec3::new(0.2, 0.0, 0.0), 0.0);

        // error 0.2 gives a blend factor of 0.4
        assert!((prediction.position().x - 0.08).abs() < 1e-5);

        let mut prediction = ClientPrediction::new();
        prediction.reconcile(Vec3::new(0.02, 0.0, 0.0), 0.0);
        assert!((prediction.position().x - 0.002).abs() < 1e-6);
    }

    #[test]
    fn half_unit_error_blends_and_above_snaps() {
        let mut prediction = ClientPrediction::new();
        prediction.reconcile(Vec3::new(0.5, 0.0, 0.0), 0.0);
        assert!((prediction.position().x - 0.25).abs() < 1e-5);

        let mut prediction = ClientPrediction::new();
        prediction.reconcile(Vec3::new(0.51, 0.0, 0.0), 0.0);
        assert_eq!(prediction.position(), Vec3::new(0.51, 0.0, 0.0));
    }

    #[test]
    fn spawn_resets_pose() {
        let mut prediction = ClientPrediction::new();
        prediction.apply_input(Vec2::new(0.0, 1.0), Vec2::new(-1.0, 0.0), 0.05);

        prediction.initialize(Vec3::new(5.0, 0.0, 5.0), 180.0);
        assert_eq!(prediction.position(), Vec3::new(5.0, 0.0, 5.0));
        assert_eq!(prediction.rotation(), 180.0);
    }
}
