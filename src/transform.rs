use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecomposedTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DecomposedTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Lerp translation and scale, slerp rotation.
    pub fn interpolate(&self, other: &Self, progress: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, progress),
            rotation: self.rotation.slerp(other.rotation, progress).normalize(),
            scale: self.scale.lerp(other.scale, progress),
        }
    }
}

impl From<DecomposedTransform> for Mat4 {
    fn from(value: DecomposedTransform) -> Self {
        Mat4::from_translation(value.translation)
            * Mat4::from_quat(value.rotation)
            * Mat4::from_scale(value.scale)
    }
}

/// Affine transform of a single joint, stored as a matrix so that
/// composition stays associative even with non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(Mat4);

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self(Mat4::IDENTITY);

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self(matrix)
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self(Mat4::from_rotation_translation(rotation, translation))
    }

    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// `self` first, `child` relative to it.
    pub fn compose(&self, child: &Transform) -> Transform {
        Self(self.0 * child.0)
    }

    pub fn decompose(&self) -> DecomposedTransform {
        let (scale, rotation, translation) = self.0.to_scale_rotation_translation();
        DecomposedTransform {
            translation,
            rotation,
            scale,
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.0.transform_point3(point)
    }

    pub fn is_identity(&self) -> bool {
        self.0 == Mat4::IDENTITY
    }

    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
        self.0.abs_diff_eq(other.0, max_abs_diff)
    }
}

impl From<DecomposedTransform> for Transform {
    fn from(value: DecomposedTransform) -> Self {
        Self(value.into())
    }
}

impl From<Transform> for Mat4 {
    fn from(value: Transform) -> Self {
        value.0
    }
}

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec3};

    use super::{DecomposedTransform, Transform};

    #[test]
    fn test_compose_applies_child_in_parent_space() {
        let parent = Transform::from_rotation_translation(
            Quat::from_rotation_y(FRAC_PI_2),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let child = Transform::from_rotation_translation(Quat::IDENTITY, Vec3::X);
        let composed = parent.compose(&child);
        let point = composed.transform_point(Vec3::ZERO);
        assert!(point.abs_diff_eq(Vec3::new(0.0, 1.0, -1.0), 1e-5));
    }

    #[test]
    fn test_decompose() {
        let decomposed = DecomposedTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.3),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let back = Transform::from(decomposed).decompose();
        assert!(back.translation.abs_diff_eq(decomposed.translation, 1e-5));
        assert!(back.rotation.abs_diff_eq(decomposed.rotation, 1e-5));
        assert!(back.scale.abs_diff_eq(decomposed.scale, 1e-5));
    }

    #[test]
    fn test_interpolate_halfway() {
        let from = DecomposedTransform::IDENTITY;
        let to = DecomposedTransform {
            translation: Vec3::new(2.0, 0.0, 0.0),
            rotation: Quat::from_rotation_x(FRAC_PI_2),
            scale: Vec3::splat(3.0),
        };
        let half = from.interpolate(&to, 0.5);
        assert!(half.translation.abs_diff_eq(Vec3::X, 1e-6));
        assert!(half.scale.abs_diff_eq(Vec3::splat(2.0), 1e-6));
        assert!(half
            .rotation
            .abs_diff_eq(Quat::from_rotation_x(FRAC_PI_2 / 2.0), 1e-5));
    }
}
