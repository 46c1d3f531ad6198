use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use glade_shared::registry::{NodeId, PartitionRegistry};
use glade_shared::visibility::GroupMask;
use rustc_hash::FxHashMap;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::assets::{LoadedBundle, ResolvedMaterial};
use crate::renderer::mesh::GpuMesh;
use crate::renderer::scene_pipeline::ScenePipeline;
use crate::settings::srgb_to_linear;

const WHITE_TEXTURE: usize = 0;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DrawParams {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    // x: sample the baked texture
    flags: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PortalLightParams {
    model: [[f32; 4]; 4],
    color_start: [f32; 4],
    color_end: [f32; 4],
    // x: time, y: softness
    params: [f32; 4],
}

struct BakedTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

enum NodeDraw {
    Standard {
        texture: usize,
        params: wgpu::BindGroup,
    },
    PortalLight {
        model: Mat4,
        buffer: wgpu::Buffer,
        params: wgpu::BindGroup,
    },
}

struct SceneNode {
    id: NodeId,
    mesh: GpuMesh,
    draw: NodeDraw,
}

/// GPU copies of every loaded world node, drawn filtered by the camera's
/// enabled groups.
pub struct SceneNodes {
    nodes: Vec<SceneNode>,
    slots: FxHashMap<NodeId, usize>,
    textures: Vec<BakedTexture>,
    sampler: wgpu::Sampler,
    portal_light_start: [f32; 4],
    portal_light_end: [f32; 4],
}

impl SceneNodes {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &ScenePipeline,
        portal_light_colors: ([f32; 3], [f32; 3]),
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Baked Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let white = upload_texture(device, queue, pipeline, &sampler, &white, "White Texture");
        let (start, end) = portal_light_colors;

        Self {
            nodes: Vec::new(),
            slots: FxHashMap::default(),
            textures: vec![white],
            sampler,
            portal_light_start: rgba(srgb_to_linear(start)),
            portal_light_end: rgba(srgb_to_linear(end)),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Uploads every node of `bundle` and registers it in the bundle's world.
    pub fn upload_bundle(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipeline: &ScenePipeline,
        registry: &mut PartitionRegistry,
        bundle: &LoadedBundle,
    ) -> usize {
        let texture = match &bundle.texture {
            Some(image) => {
                let label = format!("{} Baked Texture", bundle.model);
                self.textures
                    .push(upload_texture(device, queue, pipeline, &self.sampler, image, &label));
                self.textures.len() - 1
            }
            None => WHITE_TEXTURE,
        };

        let group = bundle.world.group();
        for node in &bundle.nodes {
            let label = format!("{} node {}", bundle.model, node.name.as_deref().unwrap_or("?"));
            let mesh = GpuMesh::upload(device, &node.mesh, &label);
            let model = node.world_transform;

            let draw = match node.material {
                ResolvedMaterial::PortalLight => {
                    let params = PortalLightParams {
                        model: model.to_cols_array_2d(),
                        color_start: self.portal_light_start,
                        color_end: self.portal_light_end,
                        params: [0.0, 5.0, 0.0, 0.0],
                    };
                    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Portal Light Params Buffer"),
                        contents: bytemuck::bytes_of(&params),
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    });
                    let params = create_params_bind_group(
                        device,
                        pipeline,
                        &buffer,
                        "Portal Light Params Bind Group",
                    );
                    NodeDraw::PortalLight {
                        model,
                        buffer,
                        params,
                    }
                }
                ResolvedMaterial::Baked | ResolvedMaterial::Emissive(_) => {
                    let (color, use_texture) = match node.material {
                        ResolvedMaterial::Emissive(color) => (rgba(srgb_to_linear(color)), 0.0),
                        _ => ([1.0; 4], if texture == WHITE_TEXTURE { 0.0 } else { 1.0 }),
                    };
                    let params = DrawParams {
                        model: model.to_cols_array_2d(),
                        color,
                        flags: [use_texture, 0.0, 0.0, 0.0],
                    };
                    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Draw Params Buffer"),
                        contents: bytemuck::bytes_of(&params),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                    NodeDraw::Standard {
                        texture,
                        params: create_params_bind_group(
                            device,
                            pipeline,
                            &buffer,
                            "Draw Params Bind Group",
                        ),
                    }
                }
            };

            let id = registry.register(group);
            debug!("registered {label} as {id:?} in {group:?}");
            self.slots.insert(id, self.nodes.len());
            self.nodes.push(SceneNode { id, mesh, draw });
        }
        bundle.nodes.len()
    }

    pub fn update_portal_light(&self, queue: &wgpu::Queue, time: f32, softness: f32) {
        for node in &self.nodes {
            if let NodeDraw::PortalLight { model, buffer, .. } = &node.draw {
                let params = PortalLightParams {
                    model: model.to_cols_array_2d(),
                    color_start: self.portal_light_start,
                    color_end: self.portal_light_end,
                    params: [time, softness, 0.0, 0.0],
                };
                queue.write_buffer(buffer, 0, bytemuck::bytes_of(&params));
            }
        }
    }

    /// Draws opaque nodes first, then the blended portal light.
    pub fn draw<'a>(
        &'a self,
        render_pass: &mut wgpu::RenderPass<'a>,
        pipeline: &'a ScenePipeline,
        camera_bind_group: &'a wgpu::BindGroup,
        registry: &PartitionRegistry,
        enabled_groups: GroupMask,
    ) -> u32 {
        // The registry also holds nodes drawn elsewhere (portal surface, fireflies).
        let visible: Vec<&SceneNode> = registry
            .nodes_in(enabled_groups)
            .filter_map(|id| self.slots.get(&id))
            .map(|&slot| &self.nodes[slot])
            .collect();
        let mut draw_calls = 0;

        render_pass.set_pipeline(pipeline.standard());
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        for &node in &visible {
            if let NodeDraw::Standard { texture, params } = &node.draw {
                render_pass.set_bind_group(1, &self.textures[*texture].bind_group, &[]);
                render_pass.set_bind_group(2, params, &[]);
                node.mesh.draw(render_pass);
                draw_calls += 1;
            }
        }

        render_pass.set_pipeline(pipeline.portal_light());
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        for &node in &visible {
            if let NodeDraw::PortalLight { params, .. } = &node.draw {
                render_pass.set_bind_group(1, params, &[]);
                node.mesh.draw(render_pass);
                draw_calls += 1;
            }
        }
        draw_calls
    }
}

fn rgba([r, g, b]: [f32; 3]) -> [f32; 4] {
    [r, g, b, 1.0]
}

fn create_params_bind_group(
    device: &wgpu::Device,
    pipeline: &ScenePipeline,
    buffer: &wgpu::Buffer,
    label: &'static str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &pipeline.draw_params_bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &ScenePipeline,
    sampler: &wgpu::Sampler,
    image: &image::RgbaImage,
    label: &str,
) -> BakedTexture {
    let (width, height) = image.dimensions();
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &pipeline.texture_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    BakedTexture {
        _texture: texture,
        bind_group,
    }
}
