use crate::{
    animation::AnimationClip, joint::Joint, loader::ParseError, mesh::Mesh,
};

/// Largest accepted distance between a vertex's bias sum and one.
pub const BIAS_SUM_TOLERANCE: f32 = 1e-4;

/// Parsed asset. Only constructible through [`AssetModel::new`], which checks
/// every index so later stages can slice without bounds surprises.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetModel {
    joints: Vec<Joint>,
    meshes: Vec<Mesh>,
    clips: Vec<AnimationClip>,
}

impl AssetModel {
    pub fn new(
        joints: Vec<Joint>,
        meshes: Vec<Mesh>,
        clips: Vec<AnimationClip>,
    ) -> Result<Self, ParseError> {
        let model = Self {
            joints,
            meshes,
            clips,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn clip(&self, name: &str) -> Option<(usize, &AnimationClip)> {
        self.clips
            .iter()
            .enumerate()
            .find(|(_, clip)| clip.name == name)
    }

    fn validate(&self) -> Result<(), ParseError> {
        for (index, joint) in self.joints.iter().enumerate() {
            if let Some(parent) = joint.parent {
                if parent >= index {
                    return Err(ParseError::ForwardParent {
                        joint: index,
                        parent,
                    });
                }
            }
        }

        for (mesh_index, mesh) in self.meshes.iter().enumerate() {
            for (weight_index, weight) in mesh.weights.iter().enumerate() {
                if weight.joint >= self.joints.len() {
                    return Err(ParseError::JointOutOfRange {
                        mesh: mesh_index,
                        weight: weight_index,
                        joint: weight.joint,
                        joints: self.joints.len(),
                    });
                }
            }
            for (vertex_index, vertex) in mesh.vertices.iter().enumerate() {
                let end = vertex.weight_start.checked_add(vertex.weight_count);
                if end.map_or(true, |end| end > mesh.weights.len()) {
                    return Err(ParseError::WeightRangeOutOfBounds {
                        mesh: mesh_index,
                        vertex: vertex_index,
                        start: vertex.weight_start,
                        count: vertex.weight_count,
                        weights: mesh.weights.len(),
                    });
                }
                let sum = mesh.bias_sum(vertex);
                if !((sum - 1.0).abs() <= BIAS_SUM_TOLERANCE) {
                    return Err(ParseError::BadBiasSum {
                        mesh: mesh_index,
                        vertex: vertex_index,
                        sum,
                    });
                }
            }
            for (triangle_index, triangle) in mesh.triangles.iter().enumerate() {
                for vertex in triangle.indices() {
                    if vertex >= mesh.vertices.len() {
                        return Err(ParseError::VertexOutOfRange {
                            mesh: mesh_index,
                            triangle: triangle_index,
                            vertex,
                            vertices: mesh.vertices.len(),
                        });
                    }
                }
            }
        }

        for clip in &self.clips {
            let mut keys: Vec<_> = clip.keys.keys().copied().collect();
            keys.sort_unstable();
            for (frame, joint) in keys {
                if frame >= clip.frames {
                    return Err(ParseError::KeyFrameOutOfRange {
                        clip: clip.name.clone(),
                        frame,
                        frames: clip.frames,
                    });
                }
                if joint >= self.joints.len() {
                    return Err(ParseError::KeyJointOutOfRange {
                        clip: clip.name.clone(),
                        frame,
                        joint,
                        joints: self.joints.len(),
                    });
                }
            }
        }

        Ok(())
    }
}
