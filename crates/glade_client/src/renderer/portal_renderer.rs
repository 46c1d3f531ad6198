use std::mem;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};
use glade_shared::geometry::MeshData;
use glade_shared::selector::FaceOrientation;
use glade_shared::viewport::Extent;
use wgpu::util::DeviceExt;

use crate::renderer::scene_pipeline::texture_layout;

pub const OFFSCREEN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PortalVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl PortalVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<PortalVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PortalParamsUniform {
    model: [[f32; 4]; 4],
    resolution: [f32; 2],
    opacity: f32,
    _padding: f32,
}

/// Colour and depth target the offscreen pass renders the far world into.
struct OffscreenTarget {
    _color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    sample_bind_group: wgpu::BindGroup,
}

/// Owns the offscreen surface and draws the portal disc that shows it.
pub struct PortalRenderer {
    front_pipeline: wgpu::RenderPipeline,
    back_pipeline: wgpu::RenderPipeline,
    portal_texture_bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    surface_vertex_buffer: wgpu::Buffer,
    surface_index_buffer: wgpu::Buffer,
    surface_index_count: u32,
    sampler: wgpu::Sampler,
    target: OffscreenTarget,
    target_size: Extent,
    color_format: wgpu::TextureFormat,
    model: Mat4,
    resolution: Vec2,
}

impl PortalRenderer {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        disc: &MeshData,
        model: Mat4,
    ) -> Self {
        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Portal Surface Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../assets/shaders/portal_surface.wgsl"
                ))
                .into(),
            ),
        });

        let portal_texture_bind_group_layout =
            texture_layout(device, "Portal Texture Bind Group Layout");
        let portal_params_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Portal Params Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Portal Offscreen Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params = PortalParamsUniform {
            model: model.to_cols_array_2d(),
            resolution: [1.0, 1.0],
            opacity: 0.0,
            _padding: 0.0,
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Portal Params Buffer"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Portal Params Bind Group"),
            layout: &portal_params_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Portal Surface Pipeline Layout"),
            bind_group_layouts: &[
                camera_bind_group_layout,
                &portal_texture_bind_group_layout,
                &portal_params_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let front_pipeline = create_surface_pipeline(
            device,
            "Portal Surface Front Pipeline",
            &pipeline_layout,
            &surface_shader,
            color_format,
            depth_format,
            FaceOrientation::Front,
        );
        let back_pipeline = create_surface_pipeline(
            device,
            "Portal Surface Back Pipeline",
            &pipeline_layout,
            &surface_shader,
            color_format,
            depth_format,
            FaceOrientation::Back,
        );

        let vertices: Vec<PortalVertex> = disc
            .positions
            .iter()
            .zip(&disc.uvs)
            .map(|(&position, &uv)| PortalVertex { position, uv })
            .collect();
        let surface_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Portal Surface Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let surface_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Portal Surface Index Buffer"),
            contents: bytemuck::cast_slice(&disc.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let target_size = Extent::new(1, 1);
        let target = create_target(
            device,
            target_size,
            color_format,
            &portal_texture_bind_group_layout,
            &sampler,
        );

        Self {
            front_pipeline,
            back_pipeline,
            portal_texture_bind_group_layout,
            params_buffer,
            params_bind_group,
            surface_vertex_buffer,
            surface_index_buffer,
            surface_index_count: disc.indices.len() as u32,
            sampler,
            target,
            target_size,
            color_format,
            model,
            resolution: Vec2::ONE,
        }
    }

    /// Reallocates the offscreen target. Zero-area sizes keep the old target.
    pub fn resize(&mut self, device: &wgpu::Device, size: Extent, resolution: Vec2) {
        if size.is_degenerate() {
            return;
        }
        self.resolution = resolution;
        if size == self.target_size {
            return;
        }

        self.target = create_target(
            device,
            size,
            self.color_format,
            &self.portal_texture_bind_group_layout,
            &self.sampler,
        );
        self.target_size = size;
    }

    pub fn target_size(&self) -> Extent {
        self.target_size
    }

    pub fn color_view(&self) -> &wgpu::TextureView {
        &self.target.color_view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.target.depth_view
    }

    pub fn update_params(&self, queue: &wgpu::Queue, opacity: f32) {
        let params = PortalParamsUniform {
            model: self.model.to_cols_array_2d(),
            resolution: self.resolution.to_array(),
            opacity: opacity.clamp(0.0, 1.0),
            _padding: 0.0,
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    pub fn render_surface<'a>(
        &'a self,
        render_pass: &mut wgpu::RenderPass<'a>,
        camera_bind_group: &'a wgpu::BindGroup,
        orientation: FaceOrientation,
    ) {
        let pipeline = match orientation {
            FaceOrientation::Front => &self.front_pipeline,
            FaceOrientation::Back => &self.back_pipeline,
        };
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.target.sample_bind_group, &[]);
        render_pass.set_bind_group(2, &self.params_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.surface_vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.surface_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.surface_index_count, 0, 0..1);
    }
}

/// Front-facing keeps the side the disc normal points at; back-facing keeps
/// only the reverse side.
fn cull_mode_for(orientation: FaceOrientation) -> wgpu::Face {
    match orientation {
        FaceOrientation::Front => wgpu::Face::Back,
        FaceOrientation::Back => wgpu::Face::Front,
    }
}

fn create_surface_pipeline(
    device: &wgpu::Device,
    label: &'static str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    orientation: FaceOrientation,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[PortalVertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(cull_mode_for(orientation)),
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_target(
    device: &wgpu::Device,
    size: Extent,
    color_format: wgpu::TextureFormat,
    portal_texture_bind_group_layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
) -> OffscreenTarget {
    let extent = wgpu::Extent3d {
        width: size.width.max(1),
        height: size.height.max(1),
        depth_or_array_layers: 1,
    };
    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Portal Offscreen Color Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: color_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Portal Offscreen Depth Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let sample_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Portal Offscreen Sample Bind Group"),
        layout: portal_texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&color_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    OffscreenTarget {
        _color_texture: color_texture,
        color_view,
        _depth_texture: depth_texture,
        depth_view,
        sample_bind_group,
    }
}

#[cfg(test)]
mod tests {
    use glade_shared::selector::FaceOrientation;

    use super::cull_mode_for;

    #[test]
    fn orientation_culls_the_opposite_face() {
        assert_eq!(cull_mode_for(FaceOrientation::Front), wgpu::Face::Back);
        assert_eq!(cull_mode_for(FaceOrientation::Back), wgpu::Face::Front);
    }
}
