pub mod fireflies;
pub mod mesh;
pub mod overlay;
pub mod portal_renderer;
pub mod scene;
pub mod scene_pipeline;

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glade_shared::camera::CameraState;
use glade_shared::frame::{FrameContext, FrameReport, MainPassInputs, PortalPasses};
use glade_shared::geometry::{circle_geometry, portal_model_matrix};
use glade_shared::portal::ClipPlane;
use glade_shared::registry::{NodeId, PartitionRegistry};
use glade_shared::selector::{MainSelection, PassSelection};
use glade_shared::viewport::{Extent, ViewportChange};
use glade_shared::visibility::{GroupMask, VisibilityGroup};
use tracing::{debug, info};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::assets::LoadedBundle;
use crate::renderer::fireflies::FireflyRenderer;
use crate::renderer::overlay::OverlayRenderer;
use crate::renderer::portal_renderer::{PortalRenderer, OFFSCREEN_DEPTH_FORMAT};
use crate::renderer::scene::SceneNodes;
use crate::renderer::scene_pipeline::ScenePipeline;
use crate::settings::{srgb_to_linear, SceneSettings};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const PORTAL_DISC_RADIUS: f32 = 1.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    clip_plane: [f32; 4],
    // x: clip enabled, y: time
    params: [f32; 4],
}

impl CameraUniform {
    fn from_camera(camera: &CameraState, clip_plane: Option<ClipPlane>, time: f32) -> Self {
        let (clip_plane, clip_enabled) = match clip_plane {
            Some(plane) => (plane.to_vec4().to_array(), 1.0),
            None => ([0.0; 4], 0.0),
        };
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            clip_plane,
            params: [clip_enabled, time, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderFrameStats {
    pub offscreen_draw_calls: u32,
    pub main_draw_calls: u32,
}

#[derive(Debug)]
struct DepthTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTexture {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Glade Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Uniform buffer and bind group for one pass's view of the camera.
struct CameraBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &'static str) -> Self {
        let uniform = CameraUniform::from_camera(&CameraState::default(), None, 0.0);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    fn write(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniform));
    }
}

#[derive(Debug)]
pub enum RendererInitError {
    CreateSurface(wgpu::CreateSurfaceError),
    RequestAdapter(wgpu::RequestAdapterError),
    RequestDevice(wgpu::RequestDeviceError),
    UnsupportedSurface,
}

impl fmt::Display for RendererInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateSurface(err) => write!(f, "failed to create surface: {err}"),
            Self::RequestAdapter(err) => write!(f, "failed to request adapter: {err}"),
            Self::RequestDevice(err) => write!(f, "failed to request device: {err}"),
            Self::UnsupportedSurface => write!(f, "adapter does not support this surface"),
        }
    }
}

impl std::error::Error for RendererInitError {}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_texture: DepthTexture,
    scene_pipeline: ScenePipeline,
    scene_nodes: SceneNodes,
    registry: PartitionRegistry,
    portal_surface_node: NodeId,
    fireflies_node: NodeId,
    portal_renderer: PortalRenderer,
    fireflies: FireflyRenderer,
    overlay: OverlayRenderer,
    offscreen_camera: CameraBinding,
    main_camera: CameraBinding,
    clear_color: wgpu::Color,
    last_frame_stats: RenderFrameStats,
}

impl Renderer {
    pub fn new(window: Arc<Window>, settings: &SceneSettings) -> Result<Self, RendererInitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(RendererInitError::CreateSurface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(RendererInitError::RequestAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Glade Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(RendererInitError::RequestDevice)?;

        let initial_size = window.inner_size();
        let surface_config = surface
            .get_default_config(&adapter, initial_size.width.max(1), initial_size.height.max(1))
            .ok_or(RendererInitError::UnsupportedSurface)?;
        surface.configure(&device, &surface_config);
        info!(
            "renderer ready on {} ({:?}, {}x{})",
            adapter.get_info().name,
            surface_config.format,
            surface_config.width,
            surface_config.height
        );

        let scene_pipeline = ScenePipeline::new(&device, surface_config.format, DEPTH_FORMAT);
        let scene_nodes = SceneNodes::new(
            &device,
            &queue,
            &scene_pipeline,
            settings.portal_light_colors(),
        );

        let mut registry = PartitionRegistry::new();
        let portal_surface_node = registry.register(VisibilityGroup::PortalSurface);
        let fireflies_node = registry.register(VisibilityGroup::Outside);

        let disc = circle_geometry(PORTAL_DISC_RADIUS, settings.portal_surface.segments);
        let portal_model = portal_model_matrix(
            settings.portal.center,
            settings.portal.facing,
            settings.portal_surface.scale,
        );
        let portal_renderer = PortalRenderer::new(
            &device,
            surface_config.format,
            OFFSCREEN_DEPTH_FORMAT,
            &scene_pipeline.camera_bind_group_layout,
            &disc,
            portal_model,
        );
        let fireflies = FireflyRenderer::new(
            &device,
            surface_config.format,
            DEPTH_FORMAT,
            &scene_pipeline.camera_bind_group_layout,
            settings.fireflies.count,
            settings.fireflies.size,
            settings.fireflies.seed,
        );
        let overlay = OverlayRenderer::new(&device, surface_config.format, DEPTH_FORMAT);

        let offscreen_camera = CameraBinding::new(
            &device,
            &scene_pipeline.camera_bind_group_layout,
            "Offscreen Camera Uniform",
        );
        let main_camera = CameraBinding::new(
            &device,
            &scene_pipeline.camera_bind_group_layout,
            "Main Camera Uniform",
        );

        let [r, g, b] = srgb_to_linear(settings.clear_color());
        let clear_color = wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        };

        let depth_texture = DepthTexture::new(&device, surface_config.width, surface_config.height);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_texture,
            scene_pipeline,
            scene_nodes,
            registry,
            portal_surface_node,
            fireflies_node,
            portal_renderer,
            fireflies,
            overlay,
            offscreen_camera,
            main_camera,
            clear_color,
            last_frame_stats: RenderFrameStats::default(),
        })
    }

    pub fn upload_bundle(&mut self, bundle: &LoadedBundle) {
        let uploaded = self.scene_nodes.upload_bundle(
            &self.device,
            &self.queue,
            &self.scene_pipeline,
            &mut self.registry,
            bundle,
        );
        info!(
            "uploaded {} ({uploaded} nodes, {} total, {} in {:?})",
            bundle.model,
            self.scene_nodes.len(),
            self.registry.count_in(bundle.world.group()),
            bundle.world
        );
    }

    /// Resizes every size-dependent target in one step. Degenerate sizes
    /// leave the surface and offscreen target untouched.
    pub fn apply_viewport(&mut self, change: &ViewportChange) {
        let Extent { width, height } = change.surface;
        if change.surface.is_degenerate() {
            debug!("skipping surface resize to {width}x{height}");
            return;
        }

        if width != self.surface_config.width || height != self.surface_config.height {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_texture = DepthTexture::new(&self.device, width, height);
        }
        self.portal_renderer
            .resize(&self.device, change.offscreen, change.resolution);
        self.fireflies.resize(height, change.pixel_ratio);
        let target = self.portal_renderer.target_size();
        debug!(
            "surface {width}x{height}, offscreen target {}x{}",
            target.width, target.height
        );
    }

    fn is_visible(&self, node: NodeId, enabled_groups: GroupMask) -> bool {
        self.registry
            .group_of(node)
            .is_some_and(|group| enabled_groups.is_enabled(group))
    }

    /// Reconfigures the surface at its current size after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn last_frame_stats(&self) -> RenderFrameStats {
        self.last_frame_stats
    }

    /// Records the offscreen and main passes into one encoder and presents.
    pub fn render(
        &mut self,
        ctx: &mut FrameContext,
        now: f64,
    ) -> Result<FrameReport, wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Glade Command Encoder"),
            });

        let (report, stats) = {
            let mut recorder = FrameRecorder {
                renderer: self,
                encoder: &mut encoder,
                target: &view,
                stats: RenderFrameStats::default(),
            };
            let report = ctx.render_frame(now, &mut recorder);
            (report, recorder.stats)
        };

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.last_frame_stats = stats;
        Ok(report)
    }
}

/// Records each portal pass into the frame's command encoder.
struct FrameRecorder<'a> {
    renderer: &'a Renderer,
    encoder: &'a mut wgpu::CommandEncoder,
    target: &'a wgpu::TextureView,
    stats: RenderFrameStats,
}

/// Draws the nodes of the enabled world, plus the fireflies when their
/// group is enabled.
fn draw_world<'a>(
    renderer: &'a Renderer,
    render_pass: &mut wgpu::RenderPass<'a>,
    camera_bind_group: &'a wgpu::BindGroup,
    enabled_groups: GroupMask,
) -> u32 {
    let mut draw_calls = renderer.scene_nodes.draw(
        render_pass,
        &renderer.scene_pipeline,
        camera_bind_group,
        &renderer.registry,
        enabled_groups,
    );
    if renderer.is_visible(renderer.fireflies_node, enabled_groups) {
        renderer.fireflies.render(render_pass, camera_bind_group);
        draw_calls += 1;
    }
    draw_calls
}

impl PortalPasses for FrameRecorder<'_> {
    fn offscreen_pass(&mut self, camera: &CameraState, selection: &PassSelection, time: f32) {
        let renderer = self.renderer;
        renderer.offscreen_camera.write(
            &renderer.queue,
            &CameraUniform::from_camera(camera, selection.clip_plane, time),
        );

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Glade Offscreen Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: renderer.portal_renderer.color_view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(renderer.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: renderer.portal_renderer.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        let draw_calls = draw_world(
            renderer,
            &mut render_pass,
            &renderer.offscreen_camera.bind_group,
            selection.enabled_groups,
        );
        drop(render_pass);
        self.stats.offscreen_draw_calls = draw_calls;
    }

    fn main_pass(
        &mut self,
        camera: &CameraState,
        selection: &MainSelection,
        inputs: &MainPassInputs,
    ) {
        let renderer = self.renderer;
        renderer.main_camera.write(
            &renderer.queue,
            &CameraUniform::from_camera(camera, selection.pass.clip_plane, inputs.time),
        );
        renderer.fireflies.update(&renderer.queue, camera, inputs.time);
        renderer
            .scene_nodes
            .update_portal_light(&renderer.queue, inputs.time, inputs.light_softness);
        renderer
            .portal_renderer
            .update_params(&renderer.queue, inputs.surface_opacity);
        if let Some(overlay) = &inputs.overlay {
            renderer.overlay.update(&renderer.queue, overlay);
        }

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Glade Main Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(renderer.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &renderer.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let camera_bind_group = &renderer.main_camera.bind_group;
        let enabled_groups = selection.pass.enabled_groups;
        let mut draw_calls = renderer.scene_nodes.draw(
            &mut render_pass,
            &renderer.scene_pipeline,
            camera_bind_group,
            &renderer.registry,
            enabled_groups,
        );
        if renderer.is_visible(renderer.portal_surface_node, enabled_groups) {
            renderer.portal_renderer.render_surface(
                &mut render_pass,
                camera_bind_group,
                selection.portal_surface_orientation,
            );
            draw_calls += 1;
        }
        if renderer.is_visible(renderer.fireflies_node, enabled_groups) {
            renderer.fireflies.render(&mut render_pass, camera_bind_group);
            draw_calls += 1;
        }
        if inputs.overlay.is_some() {
            renderer.overlay.render(&mut render_pass);
            draw_calls += 1;
        }
        drop(render_pass);
        self.stats.main_draw_calls = draw_calls;
    }
}
