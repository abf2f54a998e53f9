use glam::{Quat, Vec3};

use crate::transform::Transform;

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Joint {
    pub fn bind_transform(&self) -> Transform {
        Transform::from_rotation_translation(self.rotation, self.translation)
    }
}

/// Rebuild a unit quaternion from the x, y, z parts stored in the file.
///
/// The format keeps the real part implied and negative.
pub fn unit_quat_from_xyz(x: f32, y: f32, z: f32) -> Quat {
    let t = 1.0 - x * x - y * y - z * z;
    let w = if t < 0.0 { 0.0 } else { -t.sqrt() };
    Quat::from_xyzw(x, y, z, w)
}

#[cfg(test)]
mod test {
    use glam::Vec3;

    use super::unit_quat_from_xyz;

    #[test]
    fn test_implied_w() {
        let quat = unit_quat_from_xyz(0.0, 0.0, 0.0);
        assert_eq!(quat.w, -1.0);
        let quat = unit_quat_from_xyz(0.5, 0.5, 0.5);
        assert!((quat.w + 0.5).abs() < 1e-6);
        assert!(quat.is_normalized());
        // rounding may push the sum of squares past one
        let quat = unit_quat_from_xyz(1.0, 0.0001, 0.0);
        assert_eq!(quat.w, 0.0);
        assert!((quat * Vec3::Y).is_finite());
    }
}
