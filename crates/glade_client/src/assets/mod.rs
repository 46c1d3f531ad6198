pub mod loader;

use std::fmt;
use std::path::PathBuf;

use glam::Mat4;
use glade_shared::geometry::MeshData;
use glade_shared::hierarchy::SceneHierarchy;
use glade_shared::visibility::WorldSide;
use tracing::warn;

use crate::settings::{parse_hex_color, BundleEntry, MaterialKind};

pub use loader::AssetLoader;

const DEFAULT_EMISSIVE: [f32; 3] = [1.0, 1.0, 229.0 / 255.0];

/// Material a loaded node is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedMaterial {
    Baked,
    PortalLight,
    Emissive([f32; 3]),
}

impl ResolvedMaterial {
    fn from_kind(kind: &MaterialKind) -> Self {
        match kind {
            MaterialKind::Baked => Self::Baked,
            MaterialKind::PortalLight => Self::PortalLight,
            MaterialKind::Emissive { color } => {
                Self::Emissive(parse_hex_color(color).unwrap_or_else(|| {
                    warn!("invalid emissive colour {color:?}");
                    DEFAULT_EMISSIVE
                }))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedNode {
    pub name: Option<String>,
    pub world_transform: Mat4,
    pub mesh: MeshData,
    pub material: ResolvedMaterial,
}

/// Decoded bundle, ready for upload on the render thread.
#[derive(Debug)]
pub struct LoadedBundle {
    pub model: String,
    pub world: WorldSide,
    pub texture: Option<image::RgbaImage>,
    pub nodes: Vec<LoadedNode>,
}

#[derive(Debug)]
pub enum AssetLoadError {
    Gltf { path: PathBuf, source: gltf::Error },
    Image { path: PathBuf, source: image::ImageError },
    NoScene { path: PathBuf },
}

impl fmt::Display for AssetLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gltf { path, source } => {
                write!(f, "failed to load model {}: {source}", path.display())
            }
            Self::Image { path, source } => {
                write!(f, "failed to load texture {}: {source}", path.display())
            }
            Self::NoScene { path } => write!(f, "model {} contains no scene", path.display()),
        }
    }
}

impl std::error::Error for AssetLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gltf { source, .. } => Some(source),
            Self::Image { source, .. } => Some(source),
            Self::NoScene { .. } => None,
        }
    }
}

/// Picks a material for every hierarchy node. A named override applies to the
/// node and everything below it; later overrides win. Nodes left as `None`
/// are not drawn.
pub fn resolve_materials(
    hierarchy: &SceneHierarchy,
    entry: &BundleEntry,
) -> Vec<Option<ResolvedMaterial>> {
    let fallback = (!entry.named_only).then_some(ResolvedMaterial::Baked);
    let mut materials = vec![fallback; hierarchy.len()];

    for named in &entry.materials {
        let Some(root) = hierarchy.find_by_name(&named.node) else {
            warn!(
                "node {:?} not found in {}, skipping its material",
                named.node, entry.model
            );
            continue;
        };
        let material = ResolvedMaterial::from_kind(&named.material);
        for index in hierarchy.descendants(root) {
            materials[index] = Some(material);
        }
    }
    materials
}
