use crate::portal::ClipPlane;
use crate::visibility::{GroupMask, VisibilityGroup, WorldSide};

/// Which side of the portal disc gets rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceOrientation {
    Front,
    Back,
}

/// The two fixed clip planes. `facing_outside` keeps geometry on the outside
/// half of the dividing plane, `facing_inside` keeps the inside half.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    pub facing_inside: ClipPlane,
    pub facing_outside: ClipPlane,
}

impl ClipPlanes {
    pub fn from_dividing_plane(plane: ClipPlane) -> Self {
        Self {
            facing_inside: plane.flipped(),
            facing_outside: plane,
        }
    }

    pub fn facing(&self, side: WorldSide) -> ClipPlane {
        match side {
            WorldSide::Inside => self.facing_inside,
            WorldSide::Outside => self.facing_outside,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSelection {
    pub clip_plane: Option<ClipPlane>,
    pub enabled_groups: GroupMask,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainSelection {
    pub pass: PassSelection,
    pub portal_surface_orientation: FaceOrientation,
}

/// The offscreen pass shows the world on the far side of the portal, never
/// the portal surface itself, clipped to that world's half-space.
pub fn select_for_offscreen_pass(current_world: WorldSide, planes: &ClipPlanes) -> PassSelection {
    let other = current_world.opposite();
    PassSelection {
        clip_plane: Some(planes.facing(other)),
        enabled_groups: other.group().mask(),
    }
}

pub fn select_for_main_pass(current_world: WorldSide) -> MainSelection {
    let mut enabled_groups = current_world.group().mask();
    enabled_groups.enable(VisibilityGroup::PortalSurface);

    let portal_surface_orientation = match current_world {
        WorldSide::Inside => FaceOrientation::Back,
        WorldSide::Outside => FaceOrientation::Front,
    };

    MainSelection {
        pass: PassSelection {
            clip_plane: None,
            enabled_groups,
        },
        portal_surface_orientation,
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{select_for_main_pass, select_for_offscreen_pass, ClipPlanes, FaceOrientation};
    use crate::portal::ClipPlane;
    use crate::visibility::{GroupMask, VisibilityGroup, WorldSide};

    fn planes() -> ClipPlanes {
        ClipPlanes::from_dividing_plane(ClipPlane::through_point(
            Vec3::new(0.0, 0.8, -1.7),
            Vec3::Z,
        ))
    }

    #[test]
    fn no_selection_mixes_both_worlds() {
        let planes = planes();
        for world in [WorldSide::Inside, WorldSide::Outside] {
            let offscreen = select_for_offscreen_pass(world, &planes);
            let main = select_for_main_pass(world);
            assert!(!offscreen.enabled_groups.mixes_worlds());
            assert!(!main.pass.enabled_groups.mixes_worlds());
        }
    }

    #[test]
    fn offscreen_pass_draws_opposite_world_without_portal_surface() {
        let planes = planes();

        let from_outside = select_for_offscreen_pass(WorldSide::Outside, &planes);
        assert_eq!(from_outside.enabled_groups, GroupMask::INSIDE);
        assert_eq!(from_outside.clip_plane, Some(planes.facing_inside));

        let from_inside = select_for_offscreen_pass(WorldSide::Inside, &planes);
        assert_eq!(from_inside.enabled_groups, GroupMask::OUTSIDE);
        assert!(!from_inside
            .enabled_groups
            .is_enabled(VisibilityGroup::PortalSurface));

        // Clipping keeps geometry on the far world's side of the plane.
        let clip = from_inside.clip_plane.unwrap();
        assert!(clip.signed_distance(Vec3::new(0.0, 1.0, 2.0)) > 0.0);
        assert!(clip.signed_distance(Vec3::new(0.0, 1.0, -4.0)) < 0.0);
    }

    #[test]
    fn main_pass_draws_current_world_and_orients_surface() {
        let outside = select_for_main_pass(WorldSide::Outside);
        assert_eq!(
            outside.pass.enabled_groups,
            GroupMask::OUTSIDE | GroupMask::PORTAL_SURFACE
        );
        assert_eq!(outside.pass.clip_plane, None);
        assert_eq!(outside.portal_surface_orientation, FaceOrientation::Front);

        let inside = select_for_main_pass(WorldSide::Inside);
        assert_eq!(
            inside.pass.enabled_groups,
            GroupMask::INSIDE | GroupMask::PORTAL_SURFACE
        );
        assert_eq!(inside.portal_surface_orientation, FaceOrientation::Back);
    }
}
