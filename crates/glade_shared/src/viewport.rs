use glam::Vec2;
use tracing::{debug, warn};

const MAX_PIXEL_RATIO: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> Option<f32> {
        if self.is_degenerate() {
            return None;
        }
        Some(self.width as f32 / self.height as f32)
    }
}

/// Everything that depends on the window size, computed together so a frame
/// never sees a mix of old and new values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportChange {
    pub surface: Extent,
    pub offscreen: Extent,
    pub aspect: f32,
    pub resolution: Vec2,
    pub pixel_ratio: f32,
}

/// Collects resize events between frames and hands out one consistent
/// update at the start of the next frame.
#[derive(Debug, Clone)]
pub struct ViewportCoordinator {
    pending: Option<Extent>,
    requested: Extent,
    applied: Option<Extent>,
    pixel_ratio: f32,
    pixel_ratio_dirty: bool,
}

impl ViewportCoordinator {
    pub fn new(initial: Extent, scale_factor: f64) -> Self {
        Self {
            pending: Some(initial),
            requested: Extent::default(),
            applied: None,
            pixel_ratio: clamp_pixel_ratio(scale_factor),
            pixel_ratio_dirty: true,
        }
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.pending = Some(Extent::new(width, height));
    }

    pub fn on_scale_factor_changed(&mut self, scale_factor: f64) {
        let pixel_ratio = clamp_pixel_ratio(scale_factor);
        if pixel_ratio != self.pixel_ratio {
            self.pixel_ratio = pixel_ratio;
            self.pixel_ratio_dirty = true;
        }
    }

    /// Consumes the queued resize. Returns `None` when nothing GPU-side has to
    /// change: no event, a repeated size, or a zero-area window.
    pub fn apply_pending(&mut self) -> Option<ViewportChange> {
        if let Some(size) = self.pending.take() {
            self.requested = size;
        }

        if self.requested.is_degenerate() {
            if self.applied.is_some() {
                debug!(
                    "skipping target resize for degenerate viewport {}x{}",
                    self.requested.width, self.requested.height
                );
            }
            return None;
        }

        if self.applied == Some(self.requested) && !self.pixel_ratio_dirty {
            return None;
        }

        let size = self.requested;
        let Some(aspect) = size.aspect() else {
            warn!("viewport {}x{} has no aspect ratio", size.width, size.height);
            return None;
        };

        self.applied = Some(size);
        self.pixel_ratio_dirty = false;
        Some(ViewportChange {
            surface: size,
            offscreen: size,
            aspect,
            resolution: Vec2::new(size.width as f32, size.height as f32),
            pixel_ratio: self.pixel_ratio,
        })
    }

    /// Size of the offscreen target, if one has ever been allocated.
    pub fn offscreen_extent(&self) -> Option<Extent> {
        self.applied
    }

    /// The offscreen pass only runs while the window has area; otherwise the
    /// previous frame's texture is kept untouched.
    pub fn offscreen_pass_enabled(&self) -> bool {
        self.applied.is_some() && !self.requested.is_degenerate()
    }

    pub fn aspect(&self) -> Option<f32> {
        self.applied.and_then(Extent::aspect)
    }

    pub fn resolution(&self) -> Vec2 {
        self.applied
            .map(|size| Vec2::new(size.width as f32, size.height as f32))
            .unwrap_or(Vec2::ONE)
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }
}

fn clamp_pixel_ratio(scale_factor: f64) -> f32 {
    if !scale_factor.is_finite() || scale_factor <= 0.0 {
        return 1.0;
    }
    (scale_factor as f32).min(MAX_PIXEL_RATIO)
}

#[cfg(test)]
mod tests {
    use super::{Extent, ViewportCoordinator};

    #[test]
    fn initial_size_is_applied_on_first_frame() {
        let mut viewport = ViewportCoordinator::new(Extent::new(800, 600), 1.0);
        assert!(!viewport.offscreen_pass_enabled());

        let change = viewport.apply_pending().unwrap();
        assert_eq!(change.surface, Extent::new(800, 600));
        assert_eq!(change.offscreen, change.surface);
        assert!((change.aspect - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(change.resolution.x, 800.0);
        assert!(viewport.offscreen_pass_enabled());
    }

    #[test]
    fn repeated_identical_sizes_are_idempotent() {
        let mut viewport = ViewportCoordinator::new(Extent::new(640, 480), 1.0);
        assert!(viewport.apply_pending().is_some());

        viewport.on_resize(640, 480);
        assert!(viewport.apply_pending().is_none());
        assert!(viewport.apply_pending().is_none());
        assert_eq!(viewport.offscreen_extent(), Some(Extent::new(640, 480)));
    }

    #[test]
    fn zero_area_then_valid_size_restores_targets() {
        let mut viewport = ViewportCoordinator::new(Extent::new(1024, 768), 1.0);
        viewport.apply_pending();

        viewport.on_resize(0, 0);
        assert!(viewport.apply_pending().is_none());
        assert!(!viewport.offscreen_pass_enabled());
        assert_eq!(viewport.offscreen_extent(), Some(Extent::new(1024, 768)));

        viewport.on_resize(1280, 720);
        let change = viewport.apply_pending().unwrap();
        assert_eq!(change.offscreen, Extent::new(1280, 720));
        assert!((change.aspect - 1280.0 / 720.0).abs() < 1e-6);
        assert!(viewport.offscreen_pass_enabled());
        assert_eq!(viewport.offscreen_extent(), Some(Extent::new(1280, 720)));
    }

    #[test]
    fn zero_area_then_same_size_reenables_offscreen_pass() {
        let mut viewport = ViewportCoordinator::new(Extent::new(800, 600), 1.0);
        viewport.apply_pending();

        viewport.on_resize(800, 0);
        assert!(viewport.apply_pending().is_none());
        assert!(!viewport.offscreen_pass_enabled());

        viewport.on_resize(800, 600);
        assert!(viewport.apply_pending().is_none());
        assert!(viewport.offscreen_pass_enabled());
        assert_eq!(viewport.aspect(), Some(800.0 / 600.0));
    }

    #[test]
    fn degenerate_size_before_first_frame_waits_for_valid_resize() {
        let mut viewport = ViewportCoordinator::new(Extent::new(0, 0), 1.0);
        assert!(viewport.apply_pending().is_none());
        assert_eq!(viewport.offscreen_extent(), None);
        assert_eq!(viewport.resolution().x, 1.0);

        viewport.on_resize(300, 200);
        assert_eq!(viewport.apply_pending().unwrap().surface, Extent::new(300, 200));
    }

    #[test]
    fn doubling_dimensions_quadruples_offscreen_area() {
        let mut viewport = ViewportCoordinator::new(Extent::new(800, 600), 1.0);
        let before = viewport.apply_pending().unwrap();

        viewport.on_resize(1600, 1200);
        let after = viewport.apply_pending().unwrap();
        assert_eq!(after.offscreen.area(), before.offscreen.area() * 4);
        assert!((after.aspect - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn pixel_ratio_is_capped_and_change_is_reported() {
        let mut viewport = ViewportCoordinator::new(Extent::new(800, 600), 3.0);
        assert_eq!(viewport.apply_pending().unwrap().pixel_ratio, 2.0);

        viewport.on_scale_factor_changed(1.5);
        let change = viewport.apply_pending().unwrap();
        assert_eq!(change.pixel_ratio, 1.5);
        assert_eq!(change.surface, Extent::new(800, 600));

        viewport.on_scale_factor_changed(1.5);
        assert!(viewport.apply_pending().is_none());
    }
}
