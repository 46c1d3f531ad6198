use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Mat4;
use glade_core::events::{completion_channel, CompletionQueue, CompletionSender, LoadProgress};
use glade_core::jobs::JobSystem;
use glade_shared::geometry::MeshData;
use glade_shared::hierarchy::SceneHierarchy;
use rayon::ThreadPoolBuildError;
use tracing::{debug, warn};

use super::{resolve_materials, AssetLoadError, LoadedBundle, LoadedNode};
use crate::settings::BundleEntry;

pub type BundleResult = Result<LoadedBundle, AssetLoadError>;

/// Decodes glTF bundles and their baked textures off the render thread.
pub struct AssetLoader {
    jobs: JobSystem,
    completed_tx: CompletionSender<BundleResult>,
    completed: CompletionQueue<BundleResult>,
}

impl AssetLoader {
    pub fn new() -> Result<Self, ThreadPoolBuildError> {
        let jobs = JobSystem::new(None, "asset-loader")?;
        let (completed_tx, completed) = completion_channel(0);
        Ok(Self {
            jobs,
            completed_tx,
            completed,
        })
    }

    pub fn load_manifest(&mut self, asset_dir: &Path, bundles: &[BundleEntry]) {
        self.completed.expect_more(bundles.len());
        let asset_dir: Arc<Path> = Arc::from(asset_dir);
        for entry in bundles {
            let entry = entry.clone();
            let asset_dir = Arc::clone(&asset_dir);
            let completed_tx = self.completed_tx.clone();
            self.jobs.spawn(move || {
                let result = load_bundle(&asset_dir, &entry);
                let _ = completed_tx.send(result);
            });
        }
    }

    pub fn poll(&mut self) -> Vec<BundleResult> {
        self.completed.drain()
    }

    pub fn progress(&self) -> LoadProgress {
        self.completed.progress()
    }
}

pub fn load_bundle(asset_dir: &Path, entry: &BundleEntry) -> Result<LoadedBundle, AssetLoadError> {
    let model_path = asset_dir.join(&entry.model);
    let (document, buffers, _images) =
        gltf::import(&model_path).map_err(|source| AssetLoadError::Gltf {
            path: model_path.clone(),
            source,
        })?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetLoadError::NoScene {
            path: model_path.clone(),
        })?;

    let mut hierarchy = SceneHierarchy::new();
    let mut queue: VecDeque<(gltf::Node<'_>, Option<usize>)> =
        scene.nodes().map(|node| (node, None)).collect();
    while let Some((node, parent)) = queue.pop_front() {
        let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
        let index = hierarchy.add_node(
            parent,
            node.name().map(str::to_owned),
            local_transform,
            node.mesh().map(|mesh| mesh.index()),
        );
        queue.extend(node.children().map(|child| (child, Some(index))));
    }

    let materials = resolve_materials(&hierarchy, entry);
    let meshes: Vec<gltf::Mesh<'_>> = document.meshes().collect();
    let mut nodes = Vec::new();
    for flat in hierarchy.flatten_breadth_first() {
        let Some(material) = materials[flat.index] else {
            continue;
        };
        let Some(node) = hierarchy.node(flat.index) else {
            continue;
        };
        let Some(mesh) = node.mesh.and_then(|index| meshes.get(index)) else {
            continue;
        };

        let data = read_mesh(mesh, &buffers);
        if data.indices.is_empty() {
            debug!("node {:?} in {} has no triangles", node.name, entry.model);
            continue;
        }
        nodes.push(LoadedNode {
            name: node.name.clone(),
            world_transform: flat.world_transform,
            mesh: data,
            material,
        });
    }

    let texture = match &entry.texture {
        Some(file) => Some(load_texture(asset_dir.join(file))?),
        None => None,
    };

    if nodes.is_empty() {
        warn!("{} produced no drawable nodes", entry.model);
    }

    Ok(LoadedBundle {
        model: entry.model.clone(),
        world: entry.world,
        texture,
        nodes,
    })
}

fn load_texture(path: PathBuf) -> Result<image::RgbaImage, AssetLoadError> {
    match image::open(&path) {
        Ok(image) => Ok(image.to_rgba8()),
        Err(source) => Err(AssetLoadError::Image { path, source }),
    }
}

/// Merges every triangle primitive of `mesh` into one index buffer.
fn read_mesh(mesh: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> MeshData {
    let mut out = MeshData::default();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let count = positions.len();
        let base = out.positions.len() as u32;

        let normals = reader
            .read_normals()
            .map(|normals| normals.collect::<Vec<_>>())
            .filter(|normals| normals.len() == count)
            .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; count]);
        let uvs = reader
            .read_tex_coords(0)
            .map(|uvs| uvs.into_f32().collect::<Vec<_>>())
            .filter(|uvs| uvs.len() == count)
            .unwrap_or_else(|| vec![[0.0, 0.0]; count]);

        match reader.read_indices() {
            Some(indices) => out
                .indices
                .extend(indices.into_u32().map(|index| base + index)),
            None => out.indices.extend(base..base + count as u32),
        }
        out.positions.extend(positions);
        out.normals.extend(normals);
        out.uvs.extend(uvs);
    }
    out
}
