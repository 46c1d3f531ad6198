use glam::{Mat4, Quat, Vec3};

/// CPU-side triangle mesh, ready to be uploaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Flat disc in the XY plane, front face towards +Z with counter-clockwise
/// winding.
pub fn circle_geometry(radius: f32, segments: u32) -> MeshData {
    let segments = segments.max(3);
    let mut mesh = MeshData::default();

    mesh.positions.push([0.0, 0.0, 0.0]);
    mesh.normals.push([0.0, 0.0, 1.0]);
    mesh.uvs.push([0.5, 0.5]);

    for i in 0..=segments {
        let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
        let (sin, cos) = angle.sin_cos();
        mesh.positions.push([cos * radius, sin * radius, 0.0]);
        mesh.normals.push([0.0, 0.0, 1.0]);
        mesh.uvs.push([(cos + 1.0) * 0.5, (sin + 1.0) * 0.5]);
    }

    for i in 1..=segments {
        mesh.indices.extend([0, i, i + 1]);
    }
    mesh
}

/// Places the unit disc at `center`, turned so its +Z normal points along
/// `facing`.
pub fn portal_model_matrix(center: Vec3, facing: Vec3, scale: Vec3) -> Mat4 {
    let facing = facing.normalize_or_zero();
    let rotation = if facing == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_rotation_arc(Vec3::Z, facing)
    };
    Mat4::from_scale_rotation_translation(scale, rotation, center)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{circle_geometry, portal_model_matrix};

    #[test]
    fn circle_has_fan_layout() {
        let mesh = circle_geometry(1.0, 32);
        assert_eq!(mesh.vertex_count(), 34);
        assert_eq!(mesh.triangle_count(), 32);
        assert_eq!(mesh.uvs.len(), mesh.positions.len());
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn circle_faces_positive_z() {
        let mesh = circle_geometry(2.0, 16);
        let [a, b, c] = [0, 1, 2].map(|i| Vec3::from(mesh.positions[mesh.indices[i] as usize]));
        let normal = (b - a).cross(c - a);
        assert!(normal.z > 0.0);
        assert!((Vec3::from(mesh.positions[1]).length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn too_few_segments_are_raised() {
        assert_eq!(circle_geometry(1.0, 1).triangle_count(), 3);
    }

    #[test]
    fn model_matrix_orients_disc_normal() {
        let center = Vec3::new(0.0, 0.8, -1.7);
        let matrix = portal_model_matrix(center, Vec3::X, Vec3::ONE);
        assert!(matrix.transform_point3(Vec3::ZERO).abs_diff_eq(center, 1e-6));
        assert!(matrix.transform_vector3(Vec3::Z).abs_diff_eq(Vec3::X, 1e-6));

        let identity = portal_model_matrix(Vec3::ZERO, Vec3::Z, Vec3::new(0.73, 0.76, 0.75));
        assert!((identity.transform_point3(Vec3::X).x - 0.73).abs() < 1e-6);
    }
}
