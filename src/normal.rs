use glam::Vec3;

use crate::mesh::Triangle;

/// Normal given to vertices no triangle contributes to.
pub const FALLBACK_NORMAL: Vec3 = Vec3::Y;

/// Unnormalized face normal, `(p2 - p0) x (p1 - p0)`.
pub fn face_normal(positions: [Vec3; 3]) -> Vec3 {
    let [p0, p1, p2] = positions;
    (p2 - p0).cross(p1 - p0)
}

/// Sum the face normals of every triangle into its three vertices, then
/// normalize.
pub fn accumulate_normals(positions: &[Vec3], triangles: &[Triangle]) -> Vec<Vec3> {
    let mut buffer = vec![Vec3::ZERO; positions.len()];
    for triangle in triangles {
        let indices = triangle.indices();
        let normal = face_normal(indices.map(|index| positions[index]));
        indices.iter().for_each(|index| buffer[*index] += normal);
    }
    buffer
        .into_iter()
        .map(|normal| {
            let normal = normal.normalize_or_zero();
            if normal == Vec3::ZERO {
                FALLBACK_NORMAL
            } else {
                normal
            }
        })
        .collect()
}
