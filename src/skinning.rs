use glam::Vec3;

use crate::{mesh::Mesh, normal::accumulate_normals, transform::Transform};

/// Mesh geometry for one set of joint transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

/// Linear blend of every weight's offset carried by its joint.
pub fn skin_positions(mesh: &Mesh, joints: &[Transform]) -> Vec<Vec3> {
    mesh.vertices
        .iter()
        .map(|vertex| {
            mesh.vertex_weights(vertex)
                .iter()
                .fold(Vec3::ZERO, |position, weight| {
                    position + joints[weight.joint].transform_point(weight.offset) * weight.bias
                })
        })
        .collect()
}

/// Skin positions, then rebuild normals from the skinned triangles.
pub fn skin_mesh(mesh: &Mesh, joints: &[Transform]) -> SkinnedMesh {
    let positions = skin_positions(mesh, joints);
    let normals = accumulate_normals(&positions, &mesh.triangles);
    SkinnedMesh { positions, normals }
}

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Quat, Vec2, Vec3};

    use super::{skin_mesh, skin_positions};
    use crate::{
        joint::Joint,
        mesh::{Mesh, Triangle, Vertex, Weight},
        model::{
            test::{quad_mesh, root_joint},
            AssetModel,
        },
        normal::FALLBACK_NORMAL,
        pose::{PoseResolver, PoseState},
        transform::Transform,
    };

    fn bind(model: &AssetModel) -> Vec<Transform> {
        PoseResolver::new(None).joint_transforms(&PoseState::Identity, model.joints())
    }

    #[test]
    fn test_single_weight_at_joint() {
        let translation = Vec3::new(0.25, -3.5, 17.0);
        let mesh = Mesh {
            texture: String::from("a"),
            vertices: vec![Vertex {
                tex_coord: Vec2::ZERO,
                weight_start: 0,
                weight_count: 1,
            }],
            weights: vec![Weight {
                joint: 0,
                bias: 1.0,
                offset: Vec3::ZERO,
            }],
            triangles: vec![],
        };
        let model = AssetModel::new(vec![root_joint(translation)], vec![mesh], vec![]).unwrap();
        let skinned = skin_mesh(&model.meshes()[0], &bind(&model));
        assert_eq!(skinned.positions, vec![translation]);
        assert_eq!(skinned.normals, vec![FALLBACK_NORMAL]);
    }

    #[test]
    fn test_offset_rotated_by_joint() {
        let joint = Joint {
            rotation: Quat::from_rotation_z(FRAC_PI_2),
            ..root_joint(Vec3::new(0.0, 0.0, 1.0))
        };
        let mut mesh = quad_mesh("a");
        mesh.weights[1].offset = Vec3::X;
        let model = AssetModel::new(vec![joint], vec![mesh], vec![]).unwrap();
        let positions = skin_positions(&model.meshes()[0], &bind(&model));
        assert!(positions[1].abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-6));
    }

    #[test]
    fn test_blended_weights() {
        let joints = vec![
            root_joint(Vec3::ZERO),
            Joint {
                name: String::from("tip"),
                parent: Some(0),
                ..root_joint(Vec3::new(0.0, 2.0, 0.0))
            },
        ];
        let mesh = Mesh {
            texture: String::from("a"),
            vertices: vec![Vertex {
                tex_coord: Vec2::ZERO,
                weight_start: 0,
                weight_count: 2,
            }],
            weights: vec![
                Weight {
                    joint: 0,
                    bias: 0.25,
                    offset: Vec3::X,
                },
                Weight {
                    joint: 1,
                    bias: 0.75,
                    offset: Vec3::X,
                },
            ],
            triangles: vec![],
        };
        let model = AssetModel::new(joints, vec![mesh], vec![]).unwrap();
        let positions = skin_positions(&model.meshes()[0], &bind(&model));
        assert!(positions[0].abs_diff_eq(Vec3::new(1.0, 1.5, 0.0), 1e-6));
    }

    #[test]
    fn test_normals_follow_pose() {
        let model =
            AssetModel::new(vec![root_joint(Vec3::ZERO)], vec![quad_mesh("a")], vec![]).unwrap();
        let mesh = &model.meshes()[0];
        let bind_normals = skin_mesh(mesh, &bind(&model)).normals;
        assert!(bind_normals
            .iter()
            .all(|normal| normal.abs_diff_eq(Vec3::Z, 1e-6)));

        let turned = [Transform::from_rotation_translation(
            Quat::from_rotation_x(-FRAC_PI_2),
            Vec3::ZERO,
        )];
        let posed_normals = skin_mesh(mesh, &turned).normals;
        assert!(posed_normals
            .iter()
            .all(|normal| normal.abs_diff_eq(Vec3::Y, 1e-5)));
        assert_eq!(mesh.triangles, vec![Triangle([0, 2, 1]), Triangle([0, 3, 2])]);
    }
}
