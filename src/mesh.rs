use std::ops::Range;

use glam::{Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub tex_coord: Vec2,
    pub weight_start: usize,
    pub weight_count: usize,
}

impl Vertex {
    pub fn weight_range(&self) -> Range<usize> {
        self.weight_start..self.weight_start.saturating_add(self.weight_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub joint: usize,
    pub bias: f32,
    /// Position relative to the joint.
    pub offset: Vec3,
}

/// Three vertex indices, winding order preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle(pub [usize; 3]);

impl Triangle {
    pub fn indices(&self) -> [usize; 3] {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Texture key exactly as written in the asset, e.g. `blocks/lamp.png`
    /// or an unresolved `#placeholder`.
    pub texture: String,
    pub vertices: Vec<Vertex>,
    pub weights: Vec<Weight>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Weights of a vertex. Ranges are checked when the model is built.
    pub fn vertex_weights(&self, vertex: &Vertex) -> &[Weight] {
        &self.weights[vertex.weight_range()]
    }

    pub fn bias_sum(&self, vertex: &Vertex) -> f32 {
        self.vertex_weights(vertex)
            .iter()
            .map(|weight| weight.bias)
            .sum()
    }
}
