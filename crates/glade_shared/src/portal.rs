use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::visibility::WorldSide;

const DEFAULT_RADIAL_FRACTION: f32 = 0.5;

/// Half-space `normal · p + offset >= 0`. Points with a negative signed
/// distance are on the clipped side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlane {
    pub normal: Vec3,
    pub offset: f32,
}

impl ClipPlane {
    pub fn through_point(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            offset: -normal.dot(point),
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.offset
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.offset)
    }
}

/// Where the portal sits in the authored scene. The facing direction points
/// towards the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortalPlacement {
    pub center: Vec3,
    pub facing: Vec3,
    #[serde(default = "default_visual_scale")]
    pub visual_scale: f32,
    #[serde(default = "default_radial_fraction")]
    pub radial_fraction: f32,
    /// Overrides the plane derived from `center` and `facing`. Its positive
    /// side is the outside world.
    #[serde(default)]
    pub dividing_plane: Option<ClipPlane>,
}

impl Default for PortalPlacement {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 0.8, -1.7),
            facing: Vec3::Z,
            visual_scale: default_visual_scale(),
            radial_fraction: default_radial_fraction(),
            dividing_plane: None,
        }
    }
}

impl PortalPlacement {
    pub fn radius(&self) -> f32 {
        self.radial_fraction * self.visual_scale
    }

    pub fn dividing_plane(&self) -> ClipPlane {
        self.dividing_plane
            .unwrap_or_else(|| ClipPlane::through_point(self.center, self.facing))
    }
}

fn default_visual_scale() -> f32 {
    1.0
}

fn default_radial_fraction() -> f32 {
    DEFAULT_RADIAL_FRACTION
}

/// Boundary crossing detector state. Owns the authoritative current world.
#[derive(Debug, Clone)]
pub struct PortalState {
    pub position: Vec3,
    pub radius: f32,
    pub dividing_plane: ClipPlane,
    current_world: WorldSide,
    was_outside: bool,
}

impl PortalState {
    /// `initial_camera` seeds the previous-side cache so the first update
    /// cannot register a crossing that never happened.
    pub fn new(placement: &PortalPlacement, initial_world: WorldSide, initial_camera: Vec3) -> Self {
        let dividing_plane = placement.dividing_plane();
        let was_outside = if initial_camera.is_finite() {
            dividing_plane.signed_distance(initial_camera) > 0.0
        } else {
            initial_world.is_outside()
        };

        Self {
            position: placement.center,
            radius: placement.radius(),
            dividing_plane,
            current_world: initial_world,
            was_outside,
        }
    }

    pub fn current_world(&self) -> WorldSide {
        self.current_world
    }

    pub fn was_outside(&self) -> bool {
        self.was_outside
    }

    pub fn is_within_bounds(&self, camera_position: Vec3) -> bool {
        self.position.distance(camera_position) < self.radius
    }

    /// Flips the current world only when the camera changes plane side while
    /// close to the portal.
    pub fn update(&mut self, camera_position: Vec3) -> WorldSide {
        if !camera_position.is_finite() {
            debug!("ignoring non-finite camera position {camera_position:?}");
            return self.current_world;
        }

        let is_outside_now = self.dividing_plane.signed_distance(camera_position) > 0.0;
        let within_bounds = self.is_within_bounds(camera_position);

        if self.was_outside != is_outside_now && within_bounds {
            let entered = WorldSide::from_outside(is_outside_now);
            if entered != self.current_world {
                info!("camera crossed portal into {entered:?} world");
            }
            self.current_world = entered;
        }
        self.was_outside = is_outside_now;
        self.current_world
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{ClipPlane, PortalPlacement, PortalState};
    use crate::visibility::WorldSide;

    fn placement_at_origin() -> PortalPlacement {
        PortalPlacement {
            center: Vec3::ZERO,
            facing: Vec3::Z,
            visual_scale: 2.0,
            radial_fraction: 0.5,
            dividing_plane: None,
        }
    }

    #[test]
    fn radius_is_fraction_of_visual_scale() {
        let placement = placement_at_origin();
        assert_eq!(placement.radius(), 1.0);
        assert_eq!(PortalPlacement::default().radius(), 0.5);
    }

    #[test]
    fn clip_plane_signed_distance_and_flip() {
        let plane = ClipPlane::through_point(Vec3::new(0.0, 0.0, -1.7), Vec3::Z);
        assert!((plane.signed_distance(Vec3::new(3.0, 1.0, 0.0)) - 1.7).abs() < 1e-6);
        assert!(plane.flipped().signed_distance(Vec3::ZERO) < 0.0);
        assert_eq!(plane.to_vec4().w, plane.offset);
    }

    #[test]
    fn far_trajectories_never_change_world() {
        let placement = placement_at_origin();
        let mut state = PortalState::new(&placement, WorldSide::Outside, Vec3::new(0.0, 0.0, 5.0));

        // Sweeps through the dividing plane far from the portal, both ways.
        let path = [
            Vec3::new(4.0, 0.0, 3.0),
            Vec3::new(4.0, 0.0, -3.0),
            Vec3::new(-4.0, 0.0, -3.0),
            Vec3::new(-4.0, 2.0, 0.5),
            Vec3::new(0.0, 5.0, -0.5),
            Vec3::new(0.0, 5.0, 0.5),
        ];
        for position in path {
            assert_eq!(state.update(position), WorldSide::Outside);
        }

        let mut inside = PortalState::new(&placement, WorldSide::Inside, Vec3::new(0.0, 0.0, 5.0));
        for position in path {
            assert_eq!(inside.update(position), WorldSide::Inside);
        }
    }

    #[test]
    fn crossing_near_portal_flips_exactly_once() {
        let placement = placement_at_origin();
        let start = Vec3::new(0.0, 0.0, 3.0);
        let mut state = PortalState::new(&placement, WorldSide::Outside, start);

        let path = [
            (Vec3::new(0.0, 0.0, 2.0), WorldSide::Outside),
            (Vec3::new(0.0, 0.0, 0.5), WorldSide::Outside),
            (Vec3::new(0.0, 0.0, 0.1), WorldSide::Outside),
            (Vec3::new(0.0, 0.0, -0.1), WorldSide::Inside),
            (Vec3::new(0.0, 0.0, -0.5), WorldSide::Inside),
            (Vec3::new(0.0, 0.0, -2.0), WorldSide::Inside),
            (Vec3::new(3.0, 0.0, -2.0), WorldSide::Inside),
        ];

        let mut flips = 0;
        let mut previous = state.current_world();
        for (position, expected) in path {
            let world = state.update(position);
            assert_eq!(world, expected, "at {position:?}");
            if world != previous {
                flips += 1;
            }
            previous = world;
        }
        assert_eq!(flips, 1);
    }

    #[test]
    fn outside_to_inside_scenario_at_fractions_of_radius() {
        let placement = PortalPlacement::default();
        let radius = placement.radius();
        let center = placement.center;

        let far = center + Vec3::Z * (2.0 * radius);
        let mut state = PortalState::new(&placement, WorldSide::Outside, far);
        assert_eq!(state.update(far), WorldSide::Outside);

        let near_inside = center - Vec3::Z * (0.3 * radius);
        assert_eq!(state.update(near_inside), WorldSide::Inside);
    }

    #[test]
    fn seeding_prevents_spurious_first_frame_flip() {
        let placement = placement_at_origin();
        // Camera starts within bounds on the inside side of the plane while the
        // scene begins in the outside world.
        let start = Vec3::new(0.0, 0.0, -0.2);
        let mut state = PortalState::new(&placement, WorldSide::Outside, start);
        assert!(!state.was_outside());
        assert_eq!(state.update(start), WorldSide::Outside);
        assert_eq!(state.update(Vec3::new(0.0, 0.0, -0.3)), WorldSide::Outside);
    }

    #[test]
    fn non_finite_camera_is_treated_as_no_crossing() {
        let placement = placement_at_origin();
        let mut state = PortalState::new(&placement, WorldSide::Outside, Vec3::new(0.0, 0.0, 0.2));

        assert_eq!(state.update(Vec3::new(f32::NAN, 0.0, -0.2)), WorldSide::Outside);
        assert!(state.was_outside());
        assert_eq!(state.update(Vec3::new(0.0, f32::INFINITY, 0.0)), WorldSide::Outside);

        assert_eq!(state.update(Vec3::new(0.0, 0.0, -0.2)), WorldSide::Inside);
    }

    #[test]
    fn explicit_dividing_plane_overrides_portal_facing() {
        let placement = PortalPlacement {
            center: Vec3::new(0.0, 0.0, -1.7),
            facing: Vec3::Z,
            visual_scale: 1.0,
            radial_fraction: 0.5,
            dividing_plane: Some(ClipPlane {
                normal: Vec3::X,
                offset: 0.0,
            }),
        };
        let state = PortalState::new(&placement, WorldSide::Outside, Vec3::new(1.0, 0.0, 0.0));
        assert!(state.was_outside());
        assert_eq!(state.dividing_plane.normal, Vec3::X);
    }
}
