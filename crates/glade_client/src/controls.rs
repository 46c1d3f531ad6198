use glam::Vec3;
use glade_shared::camera::CameraState;
use winit::keyboard::KeyCode;

use crate::input::InputState;

const LOOK_SCALE: f32 = 0.001;
// Keeps the viewer from drifting out of the authored scene.
const MAX_DISTANCE_FROM_ORIGIN: f32 = 12.0;

/// First-person walk camera: mouse look while the cursor is grabbed, WASD on
/// the horizontal plane, Space and Shift for height.
#[derive(Debug, Clone, Copy)]
pub struct WalkController {
    pub mouse_sensitivity: f32,
    pub move_speed: f32,
}

impl WalkController {
    pub fn new(mouse_sensitivity: f32, move_speed: f32) -> Self {
        Self {
            mouse_sensitivity,
            move_speed,
        }
    }

    pub fn update(&self, camera: &mut CameraState, input: &InputState, dt: f32, look_enabled: bool) {
        if look_enabled {
            let scale = self.mouse_sensitivity * LOOK_SCALE;
            camera.rotate(input.mouse_delta.x * scale, -input.mouse_delta.y * scale);
        }

        let direction = movement_direction(camera, input);
        if direction == Vec3::ZERO || !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let next = camera.position + direction * self.move_speed * dt;
        if next.length() <= MAX_DISTANCE_FROM_ORIGIN {
            camera.position = next;
        }
    }
}

fn movement_direction(camera: &CameraState, input: &InputState) -> Vec3 {
    let forward = Vec3::new(camera.yaw.cos(), 0.0, camera.yaw.sin()).normalize_or_zero();
    let right = Vec3::new(-forward.z, 0.0, forward.x);

    let mut dir = Vec3::ZERO;
    if input.is_pressed(KeyCode::KeyW) {
        dir += forward;
    }
    if input.is_pressed(KeyCode::KeyS) {
        dir -= forward;
    }
    if input.is_pressed(KeyCode::KeyD) {
        dir += right;
    }
    if input.is_pressed(KeyCode::KeyA) {
        dir -= right;
    }
    if input.is_pressed(KeyCode::Space) {
        dir += Vec3::Y;
    }
    if input.is_pressed(KeyCode::ShiftLeft) {
        dir -= Vec3::Y;
    }
    dir.normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};
    use glade_shared::camera::CameraState;
    use winit::keyboard::KeyCode;

    use super::WalkController;
    use crate::input::InputState;

    #[test]
    fn walking_forward_moves_along_view_direction() {
        let mut camera = CameraState {
            position: Vec3::new(0.0, 1.0, 2.0),
            ..CameraState::default()
        };
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);

        WalkController::new(1.0, 2.0).update(&mut camera, &input, 0.5, true);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-5));
    }

    #[test]
    fn look_is_ignored_without_cursor_grab() {
        let mut camera = CameraState::default();
        let yaw = camera.yaw;
        let mut input = InputState::default();
        input.add_mouse_delta(Vec2::new(100.0, 0.0));

        let controller = WalkController::new(2.0, 1.0);
        controller.update(&mut camera, &input, 0.016, false);
        assert_eq!(camera.yaw, yaw);

        controller.update(&mut camera, &input, 0.016, true);
        assert!((camera.yaw - (yaw + 0.2)).abs() < 1e-6);
    }

    #[test]
    fn movement_stops_at_scene_bounds() {
        let mut camera = CameraState {
            position: Vec3::new(0.0, 0.0, 11.9),
            yaw: 90.0_f32.to_radians(),
            ..CameraState::default()
        };
        let mut input = InputState::default();
        input.press_key(KeyCode::KeyW);

        WalkController::new(1.0, 1.0).update(&mut camera, &input, 1.0, true);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 11.9));
    }
}
