use std::{collections::HashMap, io::Cursor, string::FromUtf8Error};

use binrw::prelude::*;
use glam::{Vec2, Vec3};

use crate::{
    animation::{AnimationClip, AnimationFlags, AnimationKey},
    joint::Joint,
    mesh::{Mesh, Triangle, Vertex, Weight},
    model::AssetModel,
};

use super::{parent_index, unit_rotation, ParseError};

pub const MAGIC: [u8; 4] = *b"MD5B";
pub const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Clone, BinRead)]
struct Md5bText {
    length: u32,
    #[br(count = length)]
    bytes: Vec<u8>,
}

impl Md5bText {
    fn try_into_string(self) -> Result<String, FromUtf8Error> {
        String::from_utf8(self.bytes)
    }
}

#[derive(Debug, Clone, BinRead)]
pub struct Md5bJoint {
    #[br(try_map = Md5bText::try_into_string)]
    pub name: String,
    pub parent: i32,
    pub translation: [f32; 3],
    /// x, y, z, w
    pub rotation: [f32; 4],
}

#[derive(Debug, Clone, BinRead)]
pub struct Md5bVertex {
    pub tex_coord: [f32; 2],
    pub weight_start: u32,
    pub weight_count: u32,
}

#[derive(Debug, Clone, BinRead)]
pub struct Md5bWeight {
    pub joint: u32,
    pub bias: f32,
    pub offset: [f32; 3],
}

#[derive(Debug, Clone, BinRead)]
pub struct Md5bMesh {
    #[br(try_map = Md5bText::try_into_string)]
    pub texture: String,
    vertex_count: u32,
    #[br(count = vertex_count)]
    pub vertices: Vec<Md5bVertex>,
    triangle_count: u32,
    #[br(count = triangle_count)]
    pub triangles: Vec<[u32; 3]>,
    weight_count: u32,
    #[br(count = weight_count)]
    pub weights: Vec<Md5bWeight>,
}

#[derive(Debug, Clone, BinRead)]
pub struct Md5bKey {
    pub frame: u32,
    pub joint: u32,
    #[br(assert((mask & !0b111) == 0, "unknown key mask bits {:#b}", mask))]
    mask: u8,
    #[br(if((mask & 0b001) != 0))]
    pub translation: Option<[f32; 3]>,
    #[br(if((mask & 0b010) != 0))]
    pub scale: Option<[f32; 3]>,
    #[br(if((mask & 0b100) != 0))]
    pub rotation: Option<[f32; 4]>,
}

#[derive(Debug, Clone, BinRead)]
pub struct Md5bClip {
    #[br(try_map = Md5bText::try_into_string)]
    pub name: String,
    #[br(map = AnimationFlags::from_bits)]
    pub flags: AnimationFlags,
    pub frames: u32,
    pub fps: f32,
    key_count: u32,
    #[br(count = key_count)]
    pub keys: Vec<Md5bKey>,
}

#[derive(Debug, Clone, BinRead)]
#[br(little, magic = b"MD5B")]
pub struct Md5bFile {
    pub version: u32,
    joint_count: u32,
    #[br(count = joint_count)]
    pub joints: Vec<Md5bJoint>,
    mesh_count: u32,
    #[br(count = mesh_count)]
    pub meshes: Vec<Md5bMesh>,
    clip_count: u32,
    #[br(count = clip_count)]
    pub clips: Vec<Md5bClip>,
}

impl Md5bFile {
    fn into_model(self) -> Result<AssetModel, ParseError> {
        if self.version != SUPPORTED_VERSION {
            return Err(ParseError::UnsupportedVersion(self.version.into()));
        }

        let joints = self
            .joints
            .into_iter()
            .enumerate()
            .map(|(index, joint)| {
                Ok(Joint {
                    name: joint.name,
                    parent: parent_index(index, joint.parent.into())?,
                    translation: Vec3::from_array(joint.translation),
                    rotation: unit_rotation(joint.rotation)?,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        let meshes = self
            .meshes
            .into_iter()
            .map(|mesh| Mesh {
                texture: mesh.texture,
                vertices: mesh
                    .vertices
                    .iter()
                    .map(|vertex| Vertex {
                        tex_coord: Vec2::from_array(vertex.tex_coord),
                        weight_start: vertex.weight_start as usize,
                        weight_count: vertex.weight_count as usize,
                    })
                    .collect(),
                weights: mesh
                    .weights
                    .iter()
                    .map(|weight| Weight {
                        joint: weight.joint as usize,
                        bias: weight.bias,
                        offset: Vec3::from_array(weight.offset),
                    })
                    .collect(),
                triangles: mesh
                    .triangles
                    .iter()
                    .map(|triangle| Triangle(triangle.map(|index| index as usize)))
                    .collect(),
            })
            .collect();

        let clips = self
            .clips
            .into_iter()
            .map(|clip| {
                let keys = clip
                    .keys
                    .iter()
                    .map(|key| {
                        let animation_key = AnimationKey {
                            translation: key.translation.map(Vec3::from_array),
                            scale: key.scale.map(Vec3::from_array),
                            rotation: key.rotation.map(unit_rotation).transpose()?,
                        };
                        Ok(((key.frame as usize, key.joint as usize), animation_key))
                    })
                    .collect::<Result<HashMap<_, _>, ParseError>>()?;
                Ok(AnimationClip {
                    name: clip.name,
                    flags: clip.flags,
                    frames: clip.frames as usize,
                    fps: clip.fps,
                    keys,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        AssetModel::new(joints, meshes, clips)
    }
}

pub fn parse(buffer: &[u8]) -> Result<AssetModel, ParseError> {
    let file = Md5bFile::read(&mut Cursor::new(buffer))?;
    file.into_model()
}
