use glam::Vec3;
use tracing::{debug, info};

use crate::camera::CameraState;
use crate::effects::{GestureStage, PortalEffects};
use crate::overlay::LoadingOverlay;
use crate::portal::{ClipPlane, PortalPlacement, PortalState};
use crate::selector::{
    select_for_main_pass, select_for_offscreen_pass, ClipPlanes, MainSelection, PassSelection,
};
use crate::timeline::Timeline;
use crate::viewport::{ViewportChange, ViewportCoordinator};
use crate::visibility::WorldSide;

/// Deferred work the frame loop fires from its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneAction {
    Gesture(GestureStage),
    FadeOverlay,
}

impl From<GestureStage> for SceneAction {
    fn from(stage: GestureStage) -> Self {
        SceneAction::Gesture(stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayInputs {
    pub alpha: f32,
    pub progress: f32,
}

/// Per-frame values the main pass needs besides the camera and selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainPassInputs {
    pub time: f32,
    pub surface_opacity: f32,
    pub light_softness: f32,
    pub overlay: Option<OverlayInputs>,
}

/// Records the two passes of a portal frame. The GPU renderer implements
/// this; each call sees the camera with its enabled groups already set.
/// Both passes of one frame receive the same animation time.
pub trait PortalPasses {
    fn offscreen_pass(&mut self, camera: &CameraState, selection: &PassSelection, time: f32);
    fn main_pass(&mut self, camera: &CameraState, selection: &MainSelection, inputs: &MainPassInputs);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub current_world: WorldSide,
    pub crossed: bool,
    pub offscreen_rendered: bool,
}

/// Everything the render loop mutates from frame to frame.
pub struct FrameContext {
    pub portal: PortalState,
    pub camera: CameraState,
    pub clip_planes: ClipPlanes,
    pub viewport: ViewportCoordinator,
    pub effects: PortalEffects,
    pub overlay: LoadingOverlay,
    timeline: Timeline<SceneAction>,
    active_clip: Option<ClipPlane>,
    frame_index: u64,
    start_time: f64,
}

impl FrameContext {
    pub fn new(
        placement: &PortalPlacement,
        initial_world: WorldSide,
        camera: CameraState,
        viewport: ViewportCoordinator,
        effects: PortalEffects,
        overlay: LoadingOverlay,
        start_time: f64,
    ) -> Self {
        let portal = PortalState::new(placement, initial_world, camera.position);
        let clip_planes = ClipPlanes::from_dividing_plane(portal.dividing_plane);
        Self {
            portal,
            camera,
            clip_planes,
            viewport,
            effects,
            overlay,
            timeline: Timeline::new(),
            active_clip: None,
            frame_index: 0,
            start_time,
        }
    }

    pub fn current_world(&self) -> WorldSide {
        self.portal.current_world()
    }

    /// Clip plane in effect right now. Only set while the offscreen pass is
    /// being recorded.
    pub fn active_clip(&self) -> Option<ClipPlane> {
        self.active_clip
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn pending_actions(&self) -> usize {
        self.timeline.pending_count()
    }

    pub fn pointer_down(&mut self, now: f64) {
        self.effects.pointer_down(&mut self.timeline, now);
    }

    pub fn pointer_up(&mut self, now: f64) {
        self.effects.pointer_up(&mut self.timeline, now);
    }

    pub fn report_progress(&mut self, loaded: usize, total: usize, now: f64) {
        info!("loaded {loaded}/{total} asset bundles");
        if self.overlay.set_progress(loaded, total) {
            let delay = self.overlay.timings().fade_delay;
            self.timeline.schedule(now, delay, SceneAction::FadeOverlay);
        }
    }

    /// Applies the queued resize and fires due deferred actions. Returns the
    /// viewport change so the caller can resize GPU targets.
    pub fn begin_frame(&mut self, now: f64) -> Option<ViewportChange> {
        let change = self.viewport.apply_pending();
        if let Some(change) = &change {
            debug!(
                "viewport now {}x{} (aspect {:.3})",
                change.surface.width, change.surface.height, change.aspect
            );
            self.camera.aspect = change.aspect;
        }

        for action in self.timeline.advance(now) {
            match action {
                SceneAction::Gesture(stage) => self.effects.apply(stage, now),
                SceneAction::FadeOverlay => self.overlay.begin_fade(now),
            }
        }
        change
    }

    /// Runs the detector, then the offscreen and main passes in that order.
    pub fn render_frame<P: PortalPasses>(&mut self, now: f64, passes: &mut P) -> FrameReport {
        let previous = self.portal.current_world();
        let current = self.portal.update(self.camera.position);
        let time = (now - self.start_time).max(0.0) as f32;

        let offscreen_rendered = self.viewport.offscreen_pass_enabled();
        if offscreen_rendered {
            let selection = select_for_offscreen_pass(current, &self.clip_planes);
            self.active_clip = selection.clip_plane;
            self.camera.enabled_groups = selection.enabled_groups;
            passes.offscreen_pass(&self.camera, &selection, time);
        }

        let selection = select_for_main_pass(current);
        self.active_clip = selection.pass.clip_plane;
        self.camera.enabled_groups = selection.pass.enabled_groups;

        let effects = self.effects.sample(now);
        let overlay_alpha = self.overlay.sample(now);
        let overlay = self.overlay.is_visible().then(|| OverlayInputs {
            alpha: overlay_alpha,
            progress: self.overlay.progress(),
        });
        let inputs = MainPassInputs {
            time,
            surface_opacity: effects.surface_opacity,
            light_softness: effects.light_softness,
            overlay,
        };
        passes.main_pass(&self.camera, &selection, &inputs);

        self.active_clip = None;
        let report = FrameReport {
            frame_index: self.frame_index,
            current_world: current,
            crossed: current != previous,
            offscreen_rendered,
        };
        self.frame_index += 1;
        report
    }

    pub fn move_camera_to(&mut self, position: Vec3) {
        self.camera.position = position;
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{FrameContext, MainPassInputs, PortalPasses};
    use crate::camera::CameraState;
    use crate::effects::{GestureTimings, PortalEffects};
    use crate::overlay::{LoadingOverlay, OverlayTimings};
    use crate::portal::{ClipPlane, PortalPlacement};
    use crate::selector::{FaceOrientation, MainSelection, PassSelection};
    use crate::viewport::{Extent, ViewportCoordinator};
    use crate::visibility::{GroupMask, WorldSide};

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Offscreen {
            groups: GroupMask,
            clip: Option<ClipPlane>,
        },
        Main {
            groups: GroupMask,
            orientation: FaceOrientation,
            opacity: f32,
        },
    }

    #[derive(Default)]
    struct RecordingPasses {
        calls: Vec<Recorded>,
        times: Vec<f32>,
    }

    impl PortalPasses for RecordingPasses {
        fn offscreen_pass(&mut self, camera: &CameraState, selection: &PassSelection, time: f32) {
            assert_eq!(camera.enabled_groups, selection.enabled_groups);
            self.times.push(time);
            self.calls.push(Recorded::Offscreen {
                groups: selection.enabled_groups,
                clip: selection.clip_plane,
            });
        }

        fn main_pass(&mut self, camera: &CameraState, selection: &MainSelection, inputs: &MainPassInputs) {
            assert_eq!(camera.enabled_groups, selection.pass.enabled_groups);
            assert!(selection.pass.clip_plane.is_none());
            self.times.push(inputs.time);
            self.calls.push(Recorded::Main {
                groups: selection.pass.enabled_groups,
                orientation: selection.portal_surface_orientation,
                opacity: inputs.surface_opacity,
            });
        }
    }

    fn context(camera_position: Vec3) -> FrameContext {
        let placement = PortalPlacement::default();
        let camera = CameraState {
            position: camera_position,
            ..CameraState::default()
        };
        FrameContext::new(
            &placement,
            WorldSide::Outside,
            camera,
            ViewportCoordinator::new(Extent::new(800, 600), 1.0),
            PortalEffects::new(GestureTimings::default(), 0.0),
            LoadingOverlay::new(OverlayTimings::default()),
            0.0,
        )
    }

    #[test]
    fn each_frame_records_one_offscreen_then_one_main_pass() {
        let center = PortalPlacement::default().center;
        let mut ctx = context(center + Vec3::new(0.0, 0.0, 3.0));
        let mut passes = RecordingPasses::default();

        for frame in 0..3 {
            let now = frame as f64 / 60.0;
            ctx.begin_frame(now);
            ctx.render_frame(now, &mut passes);
            assert!(ctx.active_clip().is_none());
        }

        assert_eq!(passes.calls.len(), 6);
        for pair in passes.calls.chunks(2) {
            assert!(matches!(pair[0], Recorded::Offscreen { .. }));
            assert!(matches!(pair[1], Recorded::Main { .. }));
        }
        assert_eq!(ctx.frame_index(), 3);
    }

    #[test]
    fn walking_through_portal_switches_main_world_and_orientation() {
        let placement = PortalPlacement::default();
        let radius = placement.radius();
        let mut ctx = context(placement.center + Vec3::Z * (2.0 * radius));
        let mut passes = RecordingPasses::default();

        ctx.begin_frame(0.0);
        let report = ctx.render_frame(0.0, &mut passes);
        assert_eq!(report.current_world, WorldSide::Outside);
        assert!(!report.crossed);

        ctx.move_camera_to(placement.center - Vec3::Z * (0.3 * radius));
        ctx.begin_frame(0.1);
        let report = ctx.render_frame(0.1, &mut passes);
        assert_eq!(report.current_world, WorldSide::Inside);
        assert!(report.crossed);

        let outside_plane = ctx.clip_planes.facing_outside;
        assert_eq!(
            passes.calls[2],
            Recorded::Offscreen {
                groups: GroupMask::OUTSIDE,
                clip: Some(outside_plane),
            }
        );
        assert_eq!(
            passes.calls[3],
            Recorded::Main {
                groups: GroupMask::INSIDE | GroupMask::PORTAL_SURFACE,
                orientation: FaceOrientation::Back,
                opacity: 0.0,
            }
        );
    }

    #[test]
    fn zero_area_viewport_skips_offscreen_pass_without_losing_main_pass() {
        let center = PortalPlacement::default().center;
        let mut ctx = context(center + Vec3::new(0.0, 0.0, 3.0));
        let mut passes = RecordingPasses::default();

        ctx.begin_frame(0.0);
        ctx.render_frame(0.0, &mut passes);

        ctx.viewport.on_resize(0, 0);
        assert!(ctx.begin_frame(0.1).is_none());
        let report = ctx.render_frame(0.1, &mut passes);
        assert!(!report.offscreen_rendered);
        assert!(matches!(passes.calls.last(), Some(Recorded::Main { .. })));

        ctx.viewport.on_resize(1920, 1080);
        let change = ctx.begin_frame(0.2).unwrap();
        assert_eq!(change.offscreen, Extent::new(1920, 1080));
        assert!((ctx.camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
        assert!(ctx.render_frame(0.2, &mut passes).offscreen_rendered);
    }

    #[test]
    fn viewport_restored_to_same_size_resumes_offscreen_pass() {
        let center = PortalPlacement::default().center;
        let mut ctx = context(center + Vec3::new(0.0, 0.0, 3.0));
        let mut passes = RecordingPasses::default();
        let full = Extent::new(800, 600);

        assert!(ctx.begin_frame(0.0).is_some());
        assert!(ctx.render_frame(0.0, &mut passes).offscreen_rendered);

        ctx.viewport.on_resize(0, 0);
        assert!(ctx.begin_frame(0.1).is_none());
        assert!(!ctx.render_frame(0.1, &mut passes).offscreen_rendered);
        assert_eq!(ctx.viewport.offscreen_extent(), Some(full));

        ctx.viewport.on_resize(800, 600);
        assert!(ctx.begin_frame(0.2).is_none());
        assert!(ctx.render_frame(0.2, &mut passes).offscreen_rendered);
        assert_eq!(ctx.viewport.offscreen_extent(), Some(full));
        assert_eq!(ctx.camera.aspect, 800.0 / 600.0);

        let kinds: Vec<bool> = passes
            .calls
            .iter()
            .map(|call| matches!(call, Recorded::Offscreen { .. }))
            .collect();
        assert_eq!(kinds, vec![true, false, false, true, false]);
    }

    #[test]
    fn offscreen_and_main_pass_share_frame_time() {
        let center = PortalPlacement::default().center;
        let mut ctx = context(center + Vec3::new(0.0, 0.0, 3.0));
        let mut passes = RecordingPasses::default();

        ctx.begin_frame(0.0);
        ctx.render_frame(0.0, &mut passes);
        ctx.begin_frame(2.5);
        ctx.render_frame(2.5, &mut passes);

        assert_eq!(passes.times, vec![0.0, 0.0, 2.5, 2.5]);
    }

    #[test]
    fn pointer_gesture_reaches_main_pass_opacity() {
        let center = PortalPlacement::default().center;
        let mut ctx = context(center + Vec3::new(0.0, 0.0, 3.0));
        let mut passes = RecordingPasses::default();

        ctx.pointer_down(0.0);
        ctx.begin_frame(1.6);
        ctx.render_frame(1.6, &mut passes);
        ctx.begin_frame(2.6);
        ctx.render_frame(2.6, &mut passes);

        assert!(matches!(
            passes.calls.last(),
            Some(Recorded::Main { opacity, .. }) if *opacity == 1.0
        ));
    }

    #[test]
    fn loading_completion_schedules_overlay_fade() {
        let center = PortalPlacement::default().center;
        let mut ctx = context(center + Vec3::new(0.0, 0.0, 3.0));

        ctx.report_progress(2, 2, 1.0);
        assert_eq!(ctx.pending_actions(), 1);

        ctx.begin_frame(2.9);
        assert_eq!(ctx.overlay.sample(2.9), 1.0);
        ctx.begin_frame(3.0);
        assert_eq!(ctx.overlay.sample(6.0), 0.0);
        assert!(!ctx.overlay.is_visible());
    }
}
