use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use glam::{Vec2, Vec3, Vec4};

use crate::{
    index::AssetId,
    mesh::Mesh,
    normal::face_normal,
    skinning::{skin_mesh, SkinnedMesh},
    transform::Transform,
};

use self::{
    facing::Facing,
    format::{ElementUsage, VertexFormat},
    sprite::{Sprite, TextureTable},
};

pub mod facing;
pub mod format;
pub mod sprite;
pub mod view;

/// Fraction of the distance to the centroid that contracted UVs move.
pub const UV_CONTRACTION: f32 = 1.0 / 256.0;

/// A texture reference that could not be resolved while baking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeDiagnostic {
    pub model: AssetId,
    pub texture: String,
}

impl Display for BakeDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unresolved texture '{}' for model '{}'",
            self.texture, self.model
        )
    }
}

/// Unpacked attribute values, one per element of the vertex format.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedVertex {
    pub elements: Vec<Vec4>,
}

/// One triangle of baked geometry.
///
/// Vertex elements hold the uncontracted values; [`BakedQuad::pack`] applies
/// the contraction when `contract_uvs` is set.
#[derive(Debug, Clone)]
pub struct BakedQuad {
    pub face: Facing,
    pub sprite: Arc<dyn Sprite>,
    pub contract_uvs: bool,
    pub vertices: [BakedVertex; 3],
}

impl BakedQuad {
    /// Texture coordinates of the given element for the three vertices,
    /// contracted if the quad asks for it.
    pub fn uvs(&self, element: usize) -> [Vec2; 3] {
        let uvs = self.vertices.each_ref().map(|vertex| {
            vertex
                .elements
                .get(element)
                .map(|value| value.truncate().truncate())
                .unwrap_or(Vec2::ZERO)
        });
        if self.contract_uvs {
            contract_uvs(uvs, self.sprite.texels_per_unit())
        } else {
            uvs
        }
    }

    /// Serialize the three vertices in `format`, little-endian.
    pub fn pack(&self, format: &VertexFormat) -> Vec<u8> {
        let contracted = format
            .position_of(ElementUsage::Uv, 0)
            .filter(|_| self.contract_uvs)
            .map(|element| (element, self.uvs(element)));
        let mut output = Vec::with_capacity(format.stride() * self.vertices.len());
        for (vertex_index, vertex) in self.vertices.iter().enumerate() {
            for (element_index, element) in format.elements().iter().enumerate() {
                let mut value = vertex
                    .elements
                    .get(element_index)
                    .copied()
                    .unwrap_or(Vec4::ZERO);
                if let Some((uv_element, uvs)) = &contracted {
                    if *uv_element == element_index {
                        value.x = uvs[vertex_index].x;
                        value.y = uvs[vertex_index].y;
                    }
                }
                let normalized = element.is_normalized();
                for component in value.to_array().into_iter().take(element.count) {
                    element.kind.write(component, normalized, &mut output);
                }
            }
        }
        output
    }
}

fn contract_component(value: f32, centroid: f32, min_step: f32) -> f32 {
    let moved = value * (1.0 - UV_CONTRACTION) + centroid * UV_CONTRACTION;
    let delta = value - moved;
    if delta.abs() >= min_step {
        moved
    } else if (value - centroid).abs() < 2.0 * min_step {
        (value + centroid) / 2.0
    } else if delta < 0.0 {
        value + min_step
    } else {
        value - min_step
    }
}

/// Pull texture coordinates toward their centroid to keep sampling inside
/// the sprite. Moves at least `1 / (texels_per_unit * 256)` and never past
/// the centroid.
pub fn contract_uvs(uvs: [Vec2; 3], texels_per_unit: f32) -> [Vec2; 3] {
    let centroid = (uvs[0] + uvs[1] + uvs[2]) / 3.0;
    let min_step = if texels_per_unit > 0.0 {
        1.0 / (texels_per_unit * 256.0)
    } else {
        0.0
    };
    uvs.map(|uv| {
        Vec2::new(
            contract_component(uv.x, centroid.x, min_step),
            contract_component(uv.y, centroid.y, min_step),
        )
    })
}

/// Turns skinned meshes into [`BakedQuad`]s laid out in a vertex format.
#[derive(Debug, Clone, Copy)]
pub struct QuadBaker<'a> {
    format: &'a VertexFormat,
    textures: &'a TextureTable,
    contract_uvs: bool,
}

impl<'a> QuadBaker<'a> {
    pub fn new(format: &'a VertexFormat, textures: &'a TextureTable) -> Self {
        Self {
            format,
            textures,
            contract_uvs: true,
        }
    }

    pub fn with_contract_uvs(self, contract_uvs: bool) -> Self {
        Self {
            contract_uvs,
            ..self
        }
    }

    fn vertex(
        &self,
        position: Vec3,
        normal: Vec3,
        tex_coord: Vec2,
        sprite: &dyn Sprite,
    ) -> BakedVertex {
        let elements = self
            .format
            .elements()
            .iter()
            .map(|element| match element.usage {
                ElementUsage::Position => position.extend(1.0),
                ElementUsage::Normal => normal.extend(0.0),
                ElementUsage::Uv => Vec4::new(
                    sprite.interpolated_u(tex_coord.x * 16.0),
                    sprite.interpolated_v(tex_coord.y * 16.0),
                    0.0,
                    1.0,
                ),
                ElementUsage::Color | ElementUsage::Padding | ElementUsage::Generic => Vec4::ZERO,
            })
            .collect();
        BakedVertex { elements }
    }

    /// Append one record per triangle of an already skinned mesh.
    pub fn bake_mesh(&self, mesh: &Mesh, skinned: &SkinnedMesh, output: &mut Vec<BakedQuad>) {
        let sprite = self.textures.sprite(&mesh.texture);
        output.extend(mesh.triangles.iter().map(|triangle| {
            let indices = triangle.indices();
            let corners = indices.map(|index| skinned.positions[index]);
            let face = Facing::from_vector(face_normal(corners));
            BakedQuad {
                face,
                sprite: sprite.clone(),
                contract_uvs: self.contract_uvs,
                vertices: indices.map(|index| {
                    self.vertex(
                        skinned.positions[index],
                        skinned.normals[index],
                        mesh.vertices[index].tex_coord,
                        sprite.as_ref(),
                    )
                }),
            }
        }));
    }

    /// Skin every mesh with the given joint transforms and bake it, in mesh
    /// then triangle order.
    pub fn bake(&self, meshes: &[Mesh], joints: &[Transform]) -> Vec<BakedQuad> {
        let mut output = Vec::new();
        for mesh in meshes {
            let skinned = skin_mesh(mesh, joints);
            self.bake_mesh(mesh, &skinned, &mut output);
        }
        output
    }
}

#[cfg(test)]
mod test {
    use glam::{Vec2, Vec3, Vec4};

    use super::{
        contract_uvs, facing::Facing, format::VertexFormat, sprite::TextureTable, BakedQuad,
        QuadBaker,
    };
    use crate::{
        bake::sprite::test::tiled_lookup,
        index::AssetId,
        model::{
            test::{quad_mesh, root_joint},
            AssetModel,
        },
        pose::{PoseResolver, PoseState},
    };

    fn quad_model() -> AssetModel {
        AssetModel::new(
            vec![root_joint(Vec3::ZERO)],
            vec![quad_mesh("blocks/a.png")],
            vec![],
        )
        .unwrap()
    }

    fn textures(model: &AssetModel) -> TextureTable {
        let id = AssetId::parse("demo:models/block/quad.md5mesh");
        let mut requests = Vec::new();
        TextureTable::resolve(&id, model.meshes(), tiled_lookup(&mut requests))
    }

    #[test]
    fn test_one_record_per_triangle() {
        let model = quad_model();
        let textures = textures(&model);
        let joints =
            PoseResolver::new(None).joint_transforms(&PoseState::Identity, model.joints());
        let format = VertexFormat::item();
        let quads = QuadBaker::new(&format, &textures).bake(model.meshes(), &joints);

        assert_eq!(quads.len(), 2);
        let first = &quads[0];
        assert_eq!(first.face, Facing::South);
        assert_eq!(first.sprite.name(), "blocks/a");
        assert!(first.contract_uvs);
        // winding order of triangle 0 2 1
        let positions: Vec<Vec4> = first
            .vertices
            .iter()
            .map(|vertex| vertex.elements[0])
            .collect();
        assert_eq!(
            positions,
            vec![
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 1.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
            ]
        );
        for vertex in &first.vertices {
            assert_eq!(vertex.elements.len(), format.len());
            assert_eq!(vertex.elements[1], Vec4::ZERO);
            assert!(vertex.elements[3].abs_diff_eq(Vec4::new(0.0, 0.0, 1.0, 0.0), 1e-6));
            assert_eq!(vertex.elements[4], Vec4::ZERO);
        }
        assert_eq!(first.vertices[0].elements[2], Vec4::new(0.25, 0.25, 0.0, 1.0));
        assert_eq!(first.vertices[1].elements[2], Vec4::new(0.5, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_pack() {
        let model = quad_model();
        let textures = textures(&model);
        let joints =
            PoseResolver::new(None).joint_transforms(&PoseState::Identity, model.joints());
        let format = VertexFormat::block();
        let quads = QuadBaker::new(&format, &textures)
            .with_contract_uvs(false)
            .bake(model.meshes(), &joints);
        let packed = quads[1].pack(&format);
        assert_eq!(packed.len(), format.stride() * 3);
        // second vertex of triangle 0 3 2 sits at (0, 1, 0)
        let stride = format.stride();
        assert_eq!(packed[stride..stride + 4], 0.0f32.to_le_bytes());
        assert_eq!(packed[stride + 4..stride + 8], 1.0f32.to_le_bytes());
        assert_eq!(packed[stride + 12..stride + 16], [0, 0, 0, 0]);
        assert_eq!(packed[stride + 16..stride + 20], 0.25f32.to_le_bytes());

        let contracted = quads[1].clone();
        let contracted = BakedQuad {
            contract_uvs: true,
            ..contracted
        };
        assert_ne!(contracted.pack(&format), packed);
        assert_eq!(contracted.pack(&format).len(), packed.len());
    }

    #[test]
    fn test_contract_uvs() {
        let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let centroid = Vec2::splat(1.0 / 3.0);
        let contracted = contract_uvs(uvs, 16.0);
        for (before, after) in uvs.iter().zip(contracted) {
            let expected = *before + (centroid - *before) / 256.0;
            assert!(after.abs_diff_eq(expected, 1e-6));
        }

        // too small to move by the ratio: step by a texel fraction or stop at
        // the midpoint, never crossing the centroid
        let uvs = [Vec2::new(0.5, 0.5), Vec2::new(0.5001, 0.5), Vec2::new(0.5, 0.5001)];
        let centroid = (uvs[0] + uvs[1] + uvs[2]) / 3.0;
        let contracted = contract_uvs(uvs, 16.0);
        for (before, after) in uvs.iter().zip(contracted) {
            for axis in 0..2 {
                let (low, high) = if before[axis] <= centroid[axis] {
                    (before[axis], centroid[axis])
                } else {
                    (centroid[axis], before[axis])
                };
                assert!(after[axis] >= low && after[axis] <= high);
            }
        }
        assert_eq!(contract_uvs(uvs, 0.0).len(), 3);
    }
}
