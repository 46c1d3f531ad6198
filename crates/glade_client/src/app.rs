use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use glade_shared::camera::CameraState;
use glade_shared::effects::PortalEffects;
use glade_shared::frame::FrameContext;
use glade_shared::overlay::LoadingOverlay;
use glade_shared::viewport::{Extent, ViewportCoordinator};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::assets::AssetLoader;
use crate::controls::WalkController;
use crate::input::InputState;
use crate::renderer::Renderer;
use crate::settings::{load_or_create_settings, CameraSettings, SceneSettings, SETTINGS_FILE};

// Frame deltas above this are treated as a stall and clamped.
const MAX_FRAME_DT: f32 = 0.1;

struct ClientApp {
    settings: SceneSettings,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    frame: Option<FrameContext>,
    loader: Option<AssetLoader>,
    controller: WalkController,
    input: InputState,
    cursor_grabbed: bool,
    start: Instant,
    last_frame: Option<Instant>,
}

impl ClientApp {
    fn new(settings: SceneSettings) -> Self {
        let controller = WalkController::new(
            settings.camera.mouse_sensitivity,
            settings.camera.move_speed,
        );
        Self {
            settings,
            window: None,
            renderer: None,
            frame: None,
            loader: None,
            controller,
            input: InputState::default(),
            cursor_grabbed: false,
            start: Instant::now(),
            last_frame: None,
        }
    }

    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn set_cursor_grab(&mut self, enabled: bool) {
        let Some(window) = self.window.as_ref() else {
            self.cursor_grabbed = false;
            return;
        };

        let grabbed = if enabled {
            window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
                .is_ok()
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            false
        };

        window.set_cursor_visible(!grabbed);
        self.cursor_grabbed = grabbed;
    }

    fn start_loading(&mut self) {
        let mut loader = match AssetLoader::new() {
            Ok(loader) => loader,
            Err(err) => {
                error!("failed to start asset workers: {err}");
                let now = self.now();
                if let Some(frame) = self.frame.as_mut() {
                    frame.report_progress(0, 0, now);
                }
                return;
            }
        };
        loader.load_manifest(&self.settings.asset_dir, &self.settings.bundles);
        let progress = loader.progress();
        let now = self.now();
        if let Some(frame) = self.frame.as_mut() {
            frame.report_progress(progress.loaded, progress.total, now);
        }
        self.loader = Some(loader);
    }

    /// Uploads finished bundles. Failed bundles still count towards progress.
    fn poll_assets(&mut self, now: f64) {
        let (Some(loader), Some(renderer), Some(frame)) = (
            self.loader.as_mut(),
            self.renderer.as_mut(),
            self.frame.as_mut(),
        ) else {
            return;
        };

        let results = loader.poll();
        if results.is_empty() {
            return;
        }
        for result in results {
            match result {
                Ok(bundle) => renderer.upload_bundle(&bundle),
                Err(err) => error!("{err}"),
            }
        }
        let progress = loader.progress();
        frame.report_progress(progress.loaded, progress.total, now);
    }

    fn update_and_render(&mut self, event_loop: &ActiveEventLoop) {
        let now_instant = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now_instant.duration_since(last).as_secs_f32())
            .unwrap_or(0.0)
            .min(MAX_FRAME_DT);
        self.last_frame = Some(now_instant);
        let now = self.now();

        self.poll_assets(now);

        let (Some(renderer), Some(frame)) = (self.renderer.as_mut(), self.frame.as_mut()) else {
            return;
        };

        self.controller
            .update(&mut frame.camera, &self.input, dt, self.cursor_grabbed);
        self.input.clear_frame();

        if let Some(change) = frame.begin_frame(now) {
            renderer.apply_viewport(&change);
        }

        match renderer.render(frame, now) {
            Ok(report) => {
                if report.crossed {
                    let stats = renderer.last_frame_stats();
                    debug!(
                        "frame {} entered {:?} ({} offscreen, {} main draw calls)",
                        report.frame_index,
                        report.current_world,
                        stats.offscreen_draw_calls,
                        stats.main_draw_calls
                    );
                }
            }
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("Out of GPU memory; shutting down event loop");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other) => {}
        }
    }
}

fn initial_camera(settings: &CameraSettings, aspect: f32) -> CameraState {
    let mut camera = CameraState {
        position: settings.position,
        fov: settings.fov_degrees.to_radians(),
        aspect,
        near: settings.near,
        far: settings.far,
        ..CameraState::default()
    };
    camera.look_at(settings.look_at);
    camera
}

impl ApplicationHandler for ClientApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("Glade");
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        let renderer = match Renderer::new(window.clone(), &self.settings) {
            Ok(renderer) => renderer,
            Err(err) => {
                error!("failed to initialize renderer: {err}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let initial = Extent::new(size.width, size.height);
        let viewport = ViewportCoordinator::new(initial, window.scale_factor());
        let camera = initial_camera(&self.settings.camera, initial.aspect().unwrap_or(1.0));
        let effects = PortalEffects::new(
            self.settings.gesture,
            self.settings.portal_surface.initial_opacity,
        );
        let overlay = LoadingOverlay::new(self.settings.overlay);
        let now = self.now();
        let frame = FrameContext::new(
            &self.settings.portal,
            self.settings.initial_world,
            camera,
            viewport,
            effects,
            overlay,
            now,
        );

        info!(
            "window and renderer initialized, starting in {:?}",
            frame.current_world()
        );
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.frame = Some(frame);
        self.last_frame = Some(Instant::now());
        self.start_loading();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested; shutting down event loop");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => {
                        if code == KeyCode::Escape {
                            self.set_cursor_grab(false);
                        }
                        self.input.press_key(code);
                    }
                    ElementState::Released => self.input.release_key(code),
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let now = self.now();
                match state {
                    ElementState::Pressed => {
                        if !self.cursor_grabbed {
                            self.set_cursor_grab(true);
                        }
                        self.input.pointer_held = true;
                        if let Some(frame) = self.frame.as_mut() {
                            frame.pointer_down(now);
                        }
                    }
                    ElementState::Released => {
                        self.input.pointer_held = false;
                        if let Some(frame) = self.frame.as_mut() {
                            frame.pointer_up(now);
                        }
                    }
                }
            }
            WindowEvent::Focused(false) => {
                self.input.release_all();
                if self.input.pointer_held {
                    self.input.pointer_held = false;
                    let now = self.now();
                    if let Some(frame) = self.frame.as_mut() {
                        frame.pointer_up(now);
                    }
                }
                self.set_cursor_grab(false);
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(frame) = self.frame.as_mut() {
                    frame.viewport.on_resize(size.width, size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(frame) = self.frame.as_mut() {
                    frame.viewport.on_scale_factor_changed(scale_factor);
                }
            }
            WindowEvent::RedrawRequested => {
                self.update_and_render(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if !self.cursor_grabbed {
            return;
        }

        if let DeviceEvent::MouseMotion { delta } = event {
            self.input
                .add_mouse_delta(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let settings = load_or_create_settings(Path::new(SETTINGS_FILE));
    if settings.bundles.is_empty() {
        warn!("no asset bundles configured in {SETTINGS_FILE}");
    }

    let event_loop = match EventLoop::new() {
        Ok(loop_handle) => loop_handle,
        Err(err) => {
            error!("Failed to create event loop: {err}");
            return;
        }
    };

    let mut app = ClientApp::new(settings);
    if let Err(err) = event_loop.run_app(&mut app) {
        error!("Event loop exited with error: {err}");
    }
}
