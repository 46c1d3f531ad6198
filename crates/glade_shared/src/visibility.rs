use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Partition every renderable node belongs to. Passes select what they draw
/// by enabling a subset of these on the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityGroup {
    Inside,
    Outside,
    PortalSurface,
}

impl VisibilityGroup {
    pub const ALL: [Self; 3] = [Self::Inside, Self::Outside, Self::PortalSurface];

    pub fn mask(self) -> GroupMask {
        match self {
            Self::Inside => GroupMask::INSIDE,
            Self::Outside => GroupMask::OUTSIDE,
            Self::PortalSurface => GroupMask::PORTAL_SURFACE,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct GroupMask: u8 {
        const INSIDE = 1 << 0;
        const OUTSIDE = 1 << 1;
        const PORTAL_SURFACE = 1 << 2;
    }
}

impl GroupMask {
    pub fn enable(&mut self, group: VisibilityGroup) {
        self.insert(group.mask());
    }

    pub fn disable(&mut self, group: VisibilityGroup) {
        self.remove(group.mask());
    }

    pub fn is_enabled(self, group: VisibilityGroup) -> bool {
        self.contains(group.mask())
    }

    /// True when both sub-worlds would be drawn by the same pass.
    pub fn mixes_worlds(self) -> bool {
        self.contains(GroupMask::INSIDE | GroupMask::OUTSIDE)
    }
}

/// Which sub-world the viewer currently stands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldSide {
    Inside,
    Outside,
}

impl WorldSide {
    pub fn from_outside(is_outside: bool) -> Self {
        if is_outside {
            Self::Outside
        } else {
            Self::Inside
        }
    }

    pub fn is_outside(self) -> bool {
        matches!(self, Self::Outside)
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Inside => Self::Outside,
            Self::Outside => Self::Inside,
        }
    }

    pub fn group(self) -> VisibilityGroup {
        match self {
            Self::Inside => VisibilityGroup::Inside,
            Self::Outside => VisibilityGroup::Outside,
        }
    }
}
