use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::Vec3;
use glade_shared::effects::GestureTimings;
use glade_shared::overlay::OverlayTimings;
use glade_shared::portal::PortalPlacement;
use glade_shared::visibility::WorldSide;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SETTINGS_FILE: &str = "glade.toml";

const MIN_FOV: f32 = 30.0;
const MAX_FOV: f32 = 110.0;
const MIN_MOUSE_SENSITIVITY: f32 = 0.1;
const MAX_MOUSE_SENSITIVITY: f32 = 10.0;
const MAX_FIREFLIES: u32 = 4096;

/// Material a named node gets instead of its bundle's baked texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaterialKind {
    Baked,
    PortalLight,
    Emissive { color: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedMaterial {
    pub node: String,
    pub material: MaterialKind,
}

/// One glTF file plus the world it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub model: String,
    #[serde(default)]
    pub texture: Option<String>,
    pub world: WorldSide,
    #[serde(default)]
    pub materials: Vec<NamedMaterial>,
    /// Register only the nodes listed in `materials`.
    #[serde(default)]
    pub named_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default = "default_camera_position")]
    pub position: Vec3,
    #[serde(default = "default_camera_target")]
    pub look_at: Vec3,
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_mouse_sensitivity")]
    pub mouse_sensitivity: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            look_at: default_camera_target(),
            fov_degrees: default_fov(),
            near: default_near(),
            far: default_far(),
            mouse_sensitivity: default_mouse_sensitivity(),
            move_speed: default_move_speed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalSurfaceSettings {
    #[serde(default = "default_surface_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub initial_opacity: f32,
    #[serde(default = "default_surface_segments")]
    pub segments: u32,
}

impl Default for PortalSurfaceSettings {
    fn default() -> Self {
        Self {
            scale: default_surface_scale(),
            initial_opacity: 0.0,
            segments: default_surface_segments(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorSettings {
    #[serde(default = "default_clear_color")]
    pub clear: String,
    #[serde(default = "default_portal_light_start")]
    pub portal_light_start: String,
    #[serde(default = "default_portal_light_end")]
    pub portal_light_end: String,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            clear: default_clear_color(),
            portal_light_start: default_portal_light_start(),
            portal_light_end: default_portal_light_end(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireflySettings {
    #[serde(default = "default_firefly_count")]
    pub count: u32,
    #[serde(default = "default_firefly_size")]
    pub size: f32,
    #[serde(default)]
    pub seed: u32,
}

impl Default for FireflySettings {
    fn default() -> Self {
        Self {
            count: default_firefly_count(),
            size: default_firefly_size(),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    #[serde(default)]
    pub portal: PortalPlacement,
    #[serde(default = "default_initial_world")]
    pub initial_world: WorldSide,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub portal_surface: PortalSurfaceSettings,
    #[serde(default)]
    pub colors: ColorSettings,
    #[serde(default)]
    pub gesture: GestureTimings,
    #[serde(default)]
    pub overlay: OverlayTimings,
    #[serde(default)]
    pub fireflies: FireflySettings,
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    #[serde(default = "default_bundles")]
    pub bundles: Vec<BundleEntry>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            portal: PortalPlacement::default(),
            initial_world: default_initial_world(),
            camera: CameraSettings::default(),
            portal_surface: PortalSurfaceSettings::default(),
            colors: ColorSettings::default(),
            gesture: GestureTimings::default(),
            overlay: OverlayTimings::default(),
            fireflies: FireflySettings::default(),
            asset_dir: default_asset_dir(),
            bundles: default_bundles(),
        }
    }
}

impl SceneSettings {
    pub fn sanitize(mut self) -> Self {
        self.camera.fov_degrees = self.camera.fov_degrees.clamp(MIN_FOV, MAX_FOV);
        self.camera.near = self.camera.near.max(0.001);
        self.camera.far = self.camera.far.max(self.camera.near + 1.0);
        self.camera.mouse_sensitivity = self
            .camera
            .mouse_sensitivity
            .clamp(MIN_MOUSE_SENSITIVITY, MAX_MOUSE_SENSITIVITY);
        self.camera.move_speed = self.camera.move_speed.max(0.0);
        if !self.camera.position.is_finite() {
            self.camera.position = default_camera_position();
        }

        self.portal.visual_scale = self.portal.visual_scale.max(0.01);
        self.portal.radial_fraction = self.portal.radial_fraction.clamp(0.01, 10.0);
        if self.portal.facing.length_squared() <= f32::EPSILON {
            self.portal.facing = Vec3::Z;
        }
        if let Some(plane) = self.portal.dividing_plane {
            let usable = plane.normal.is_finite()
                && plane.normal.length_squared() > f32::EPSILON
                && plane.offset.is_finite();
            if !usable {
                warn!(
                    "ignoring dividing plane with normal {:?} and offset {}; using portal facing",
                    plane.normal, plane.offset
                );
                self.portal.dividing_plane = None;
            }
        }

        self.portal_surface.initial_opacity = self.portal_surface.initial_opacity.clamp(0.0, 1.0);
        self.portal_surface.segments = self.portal_surface.segments.clamp(3, 256);
        self.gesture.sanitize();
        self.overlay.fade_delay = self.overlay.fade_delay.max(0.0);
        self.overlay.fade_duration = self.overlay.fade_duration.max(0.0);
        self.fireflies.count = self.fireflies.count.min(MAX_FIREFLIES);
        self.fireflies.size = self.fireflies.size.max(0.0);
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }

    pub fn clear_color(&self) -> [f32; 3] {
        color_or_warn(&self.colors.clear, "clear", [0.122, 0.039, 0.161])
    }

    pub fn portal_light_colors(&self) -> ([f32; 3], [f32; 3]) {
        (
            color_or_warn(&self.colors.portal_light_start, "portal_light_start", [1.0, 0.784, 0.969]),
            color_or_warn(&self.colors.portal_light_end, "portal_light_end", [0.655, 0.459, 1.0]),
        )
    }
}

pub fn load_or_create_settings(path: &Path) -> SceneSettings {
    match SceneSettings::load(path) {
        Ok(settings) => settings,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let settings = SceneSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            SceneSettings::default()
        }
    }
}

/// Parses `#rrggbb` into sRGB components in `0.0..=1.0`.
pub fn parse_hex_color(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.trim().strip_prefix('#').unwrap_or(hex.trim());
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .ok()
            .map(|value| value as f32 / 255.0)
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

pub fn srgb_to_linear(color: [f32; 3]) -> [f32; 3] {
    color.map(|c| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    })
}

fn color_or_warn(hex: &str, name: &str, fallback: [f32; 3]) -> [f32; 3] {
    parse_hex_color(hex).unwrap_or_else(|| {
        warn!("invalid colour {hex:?} for {name}, using default");
        fallback
    })
}

fn default_initial_world() -> WorldSide {
    WorldSide::Outside
}

fn default_camera_position() -> Vec3 {
    Vec3::new(0.0, 1.0, 2.0)
}

fn default_camera_target() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

fn default_fov() -> f32 {
    60.0
}

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    100.0
}

fn default_mouse_sensitivity() -> f32 {
    2.0
}

fn default_move_speed() -> f32 {
    1.5
}

fn default_surface_scale() -> Vec3 {
    Vec3::new(0.73, 0.76, 0.75)
}

fn default_surface_segments() -> u32 {
    64
}

fn default_clear_color() -> String {
    "#1f0a29".to_string()
}

fn default_portal_light_start() -> String {
    "#fec8f7".to_string()
}

fn default_portal_light_end() -> String {
    "#a775ff".to_string()
}

fn default_firefly_count() -> u32 {
    30
}

fn default_firefly_size() -> f32 {
    300.0
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets/scene")
}

fn baked(model: &str, texture: &str, world: WorldSide) -> BundleEntry {
    BundleEntry {
        model: model.to_string(),
        texture: Some(texture.to_string()),
        world,
        materials: Vec::new(),
        named_only: false,
    }
}

fn emissive(node: &str) -> NamedMaterial {
    NamedMaterial {
        node: node.to_string(),
        material: MaterialKind::Emissive {
            color: "#ffffe5".to_string(),
        },
    }
}

fn default_bundles() -> Vec<BundleEntry> {
    let mut main = baked("main.glb", "main.jpg", WorldSide::Outside);
    main.materials = vec![
        NamedMaterial {
            node: "main".to_string(),
            material: MaterialKind::Baked,
        },
        NamedMaterial {
            node: "portalLight".to_string(),
            material: MaterialKind::PortalLight,
        },
        emissive("poleLightA"),
        emissive("poleLightB"),
    ];

    let mut jewels = baked("pWorld3.glb", "pdim3.jpg", WorldSide::Inside);
    jewels.named_only = true;
    jewels.materials = vec![
        NamedMaterial {
            node: "jewel003".to_string(),
            material: MaterialKind::Baked,
        },
        emissive("runes1"),
        emissive("runes2"),
    ];

    vec![
        main,
        baked("forest.glb", "forest.jpg", WorldSide::Outside),
        baked("cave.glb", "cave.jpg", WorldSide::Outside),
        baked("floor.glb", "floor.jpg", WorldSide::Outside),
        baked("pWorld1.glb", "pdim1.jpg", WorldSide::Inside),
        baked("pWorld2.glb", "pdim2.jpg", WorldSide::Inside),
        jewels,
        baked("pWorld4.glb", "pdim4.jpg", WorldSide::Inside),
    ]
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use glade_shared::visibility::WorldSide;

    use super::{parse_hex_color, srgb_to_linear, MaterialKind, SceneSettings};

    #[test]
    fn empty_file_yields_defaults() {
        let settings = toml::from_str::<SceneSettings>("").unwrap().sanitize();
        assert_eq!(settings.initial_world, WorldSide::Outside);
        assert_eq!(settings.bundles.len(), 8);
        assert_eq!(settings.fireflies.count, 30);
        assert_eq!(settings.portal_surface.scale, Vec3::new(0.73, 0.76, 0.75));
        assert_eq!(settings.portal.radius(), 0.5);
    }

    #[test]
    fn defaults_survive_toml_round_trip() {
        let serialized = toml::to_string_pretty(&SceneSettings::default()).unwrap();
        let parsed = toml::from_str::<SceneSettings>(&serialized).unwrap();
        assert_eq!(parsed.bundles, SceneSettings::default().bundles);
        assert_eq!(parsed.colors.clear, "#1f0a29");
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut settings = SceneSettings::default();
        settings.camera.fov_degrees = 500.0;
        settings.portal.facing = Vec3::ZERO;
        settings.portal_surface.initial_opacity = 3.0;
        settings.gesture.ramp_duration = -1.0;

        let settings = settings.sanitize();
        assert_eq!(settings.camera.fov_degrees, 110.0);
        assert_eq!(settings.portal.facing, Vec3::Z);
        assert_eq!(settings.portal_surface.initial_opacity, 1.0);
        assert_eq!(settings.gesture.ramp_duration, 0.0);
    }

    #[test]
    fn zero_normal_dividing_plane_falls_back_to_facing() {
        let source = r#"
            [portal]
            center = [0.0, 0.8, -1.7]
            facing = [0.0, 0.0, 1.0]

            [portal.dividing_plane]
            normal = [0.0, 0.0, 0.0]
            offset = 1.0
        "#;
        let parsed = toml::from_str::<SceneSettings>(source).unwrap();
        assert!(parsed.portal.dividing_plane.is_some());

        let settings = parsed.sanitize();
        assert_eq!(settings.portal.dividing_plane, None);
        let plane = settings.portal.dividing_plane();
        assert_eq!(plane.normal, Vec3::Z);
        assert!((plane.offset - 1.7).abs() < 1e-6);
    }

    #[test]
    fn usable_dividing_plane_survives_sanitize() {
        let source = r#"
            [portal]
            center = [0.0, 0.8, -1.7]
            facing = [0.0, 0.0, 1.0]

            [portal.dividing_plane]
            normal = [1.0, 0.0, 0.0]
            offset = 0.5
        "#;
        let settings = toml::from_str::<SceneSettings>(source).unwrap().sanitize();
        let plane = settings.portal.dividing_plane();
        assert_eq!(plane.normal, Vec3::X);
        assert_eq!(plane.offset, 0.5);
    }

    #[test]
    fn named_materials_parse_from_toml() {
        let source = r##"
            [[bundles]]
            model = "main.glb"
            world = "outside"
            materials = [
                { node = "portalLight", material = { kind = "portal_light" } },
                { node = "poleLightA", material = { kind = "emissive", color = "#ffffe5" } },
            ]
        "##;
        let settings = toml::from_str::<SceneSettings>(source).unwrap();
        assert_eq!(settings.bundles.len(), 1);
        assert_eq!(settings.bundles[0].texture, None);
        assert_eq!(settings.bundles[0].materials[0].material, MaterialKind::PortalLight);
    }

    #[test]
    fn hex_colours_parse_and_convert() {
        let [r, g, b] = parse_hex_color("#1f0a29").unwrap();
        assert!((r - 31.0 / 255.0).abs() < 1e-6);
        assert!((g - 10.0 / 255.0).abs() < 1e-6);
        assert!((b - 41.0 / 255.0).abs() < 1e-6);
        assert_eq!(parse_hex_color("ffffff"), Some([1.0, 1.0, 1.0]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#zz0000"), None);

        let linear = srgb_to_linear([1.0, 0.0, 0.5]);
        assert_eq!(linear[0], 1.0);
        assert_eq!(linear[1], 0.0);
        assert!((linear[2] - 0.214).abs() < 1e-3);
    }
}
