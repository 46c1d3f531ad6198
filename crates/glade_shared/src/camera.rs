use glam::{Mat4, Vec3};

use crate::visibility::GroupMask;

const MAX_PITCH: f32 = 89.0_f32.to_radians();

/// Pose and projection of the single scene camera, plus the visibility groups
/// the current pass has enabled on it.
#[derive(Debug, Clone)]
pub struct CameraState {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub enabled_groups: GroupMask,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 2.0),
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
            enabled_groups: GroupMask::empty(),
        }
    }
}

impl CameraState {
    pub fn look_at(&mut self, target: Vec3) {
        let direction = (target - self.position).normalize_or_zero();
        if direction.length_squared() == 0.0 {
            return;
        }
        self.yaw = direction.z.atan2(direction.x);
        self.pitch = direction.y.clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn forward_direction(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize_or_zero()
    }

    pub fn right_direction(&self) -> Vec3 {
        let right = self.forward_direction().cross(Vec3::Y).normalize_or_zero();
        if right.length_squared() > 0.0 {
            right
        } else {
            Vec3::X
        }
    }

    pub fn up_direction(&self) -> Vec3 {
        self.right_direction()
            .cross(self.forward_direction())
            .normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward_direction(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov,
            self.aspect.max(0.0001),
            self.near.max(0.0001),
            self.far.max(self.near + 0.0001),
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::CameraState;

    #[test]
    fn look_at_points_forward_at_target() {
        let mut camera = CameraState::default();
        camera.look_at(Vec3::ZERO);
        let expected = (Vec3::ZERO - camera.position).normalize();
        assert!((camera.forward_direction() - expected).length() < 1e-5);
    }

    #[test]
    fn default_camera_faces_negative_z() {
        let camera = CameraState::default();
        assert!((camera.forward_direction() - Vec3::NEG_Z).length() < 1e-5);
        assert!((camera.right_direction() - Vec3::X).length() < 1e-5);
        assert!((camera.up_direction() - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped_below_vertical() {
        let mut camera = CameraState::default();
        camera.rotate(0.0, 10.0);
        assert!(camera.pitch < 90.0_f32.to_radians());
        assert!(camera.view_projection_matrix().is_finite());
    }
}
