use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    str::Utf8Error,
};

use glam::Quat;

use crate::{bake::view::ViewTransformKind, model::AssetModel, transform::DecomposedTransform};

/// `.md5b` reader with `binrw`.
pub mod binary;
/// `.md5mesh` token reader.
pub mod text;

pub const DEFAULT_POSE_CACHE_CAPACITY: usize = 16;

#[derive(Debug)]
pub enum ParseError {
    Format(binrw::Error),
    BadText(Utf8Error),
    UnexpectedEof {
        expected: &'static str,
    },
    UnexpectedToken {
        line: usize,
        expected: &'static str,
        found: String,
    },
    BadNumber {
        line: usize,
        token: String,
    },
    UnsupportedVersion(i64),
    /// Quaternion that is not finite or too short to normalize.
    BadRotation([f32; 4]),
    MissingField(&'static str),
    CountMismatch {
        section: &'static str,
        declared: usize,
        actual: usize,
    },
    BadElementIndex {
        line: usize,
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    BadParent {
        joint: usize,
        parent: i64,
    },
    ForwardParent {
        joint: usize,
        parent: usize,
    },
    JointOutOfRange {
        mesh: usize,
        weight: usize,
        joint: usize,
        joints: usize,
    },
    VertexOutOfRange {
        mesh: usize,
        triangle: usize,
        vertex: usize,
        vertices: usize,
    },
    WeightRangeOutOfBounds {
        mesh: usize,
        vertex: usize,
        start: usize,
        count: usize,
        weights: usize,
    },
    BadBiasSum {
        mesh: usize,
        vertex: usize,
        sum: f32,
    },
    KeyFrameOutOfRange {
        clip: String,
        frame: usize,
        frames: usize,
    },
    KeyJointOutOfRange {
        clip: String,
        frame: usize,
        joint: usize,
        joints: usize,
    },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Format(err) => Display::fmt(err, f),
            ParseError::BadText(err) => write!(f, "Model text is not UTF-8: {}", err),
            ParseError::UnexpectedEof { expected } => {
                write!(f, "Unexpected end of file, expected {}", expected)
            }
            ParseError::UnexpectedToken {
                line,
                expected,
                found,
            } => write!(f, "Line {}: expected {}, found {:?}", line, expected, found),
            ParseError::BadNumber { line, token } => {
                write!(f, "Line {}: bad number {:?}", line, token)
            }
            ParseError::UnsupportedVersion(version) => {
                write!(f, "Unsupported model version {}", version)
            }
            ParseError::BadRotation(rotation) => {
                write!(f, "Bad rotation quaternion {:?}", rotation)
            }
            ParseError::MissingField(field) => write!(f, "Missing {}", field),
            ParseError::CountMismatch {
                section,
                declared,
                actual,
            } => write!(
                f,
                "Declared {} {} but found {}",
                declared, section, actual
            ),
            ParseError::BadElementIndex {
                line,
                section,
                expected,
                actual,
            } => write!(
                f,
                "Line {}: {} index {} out of sequence, expected {}",
                line, section, actual, expected
            ),
            ParseError::BadParent { joint, parent } => {
                write!(f, "Joint {} has bad parent index {}", joint, parent)
            }
            ParseError::ForwardParent { joint, parent } => write!(
                f,
                "Joint {} references parent {} which is not defined before it",
                joint, parent
            ),
            ParseError::JointOutOfRange {
                mesh,
                weight,
                joint,
                joints,
            } => write!(
                f,
                "Mesh {} weight {} references joint {}, but only {} joints exist",
                mesh, weight, joint, joints
            ),
            ParseError::VertexOutOfRange {
                mesh,
                triangle,
                vertex,
                vertices,
            } => write!(
                f,
                "Mesh {} triangle {} references vertex {}, but only {} vertices exist",
                mesh, triangle, vertex, vertices
            ),
            ParseError::WeightRangeOutOfBounds {
                mesh,
                vertex,
                start,
                count,
                weights,
            } => write!(
                f,
                "Mesh {} vertex {} wants weights {}..{}, but only {} weights exist",
                mesh,
                vertex,
                start,
                start.saturating_add(*count),
                weights
            ),
            ParseError::BadBiasSum { mesh, vertex, sum } => write!(
                f,
                "Mesh {} vertex {} has weight biases summing to {}",
                mesh, vertex, sum
            ),
            ParseError::KeyFrameOutOfRange {
                clip,
                frame,
                frames,
            } => write!(
                f,
                "Animation {:?} has a key for frame {}, but only {} frames",
                clip, frame, frames
            ),
            ParseError::KeyJointOutOfRange {
                clip,
                frame,
                joint,
                joints,
            } => write!(
                f,
                "Animation {:?} frame {} references joint {}, but only {} joints exist",
                clip, frame, joint, joints
            ),
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::Format(err) => Some(err),
            ParseError::BadText(err) => Some(err),
            _ => None,
        }
    }
}

impl From<binrw::Error> for ParseError {
    fn from(value: binrw::Error) -> Self {
        ParseError::Format(value)
    }
}

impl From<Utf8Error> for ParseError {
    fn from(value: Utf8Error) -> Self {
        ParseError::BadText(value)
    }
}

/// Parse a model from raw bytes, picking the encoding from the leading magic.
pub fn parse(buffer: &[u8]) -> Result<AssetModel, ParseError> {
    if buffer.starts_with(&binary::MAGIC) {
        binary::parse(buffer)
    } else {
        text::parse(std::str::from_utf8(buffer)?)
    }
}

/// Shortest quaternion length accepted before normalizing.
const MIN_ROTATION_LENGTH: f32 = 1e-6;

/// Normalized rotation from `x, y, z, w`.
fn unit_rotation(rotation: [f32; 4]) -> Result<Quat, ParseError> {
    let quat = Quat::from_array(rotation);
    if quat.is_finite() && quat.length() >= MIN_ROTATION_LENGTH {
        Ok(quat.normalize())
    } else {
        Err(ParseError::BadRotation(rotation))
    }
}

#[inline]
fn parent_index(joint: usize, parent: i64) -> Result<Option<usize>, ParseError> {
    match parent {
        -1 => Ok(None),
        parent if parent < 0 => Err(ParseError::BadParent { joint, parent }),
        parent => Ok(Some(parent as usize)),
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct LoaderParams {
    /// File extensions, without the dot, that the loader accepts.
    pub extensions: Vec<String>,
    pub ambient_occlusion: bool,
    pub gui3d: bool,
    pub contract_uvs: bool,
    /// Number of poses a baked model remembers. Zero disables the cache.
    pub pose_cache_capacity: usize,
    pub view_transforms: HashMap<ViewTransformKind, DecomposedTransform>,
}

impl Default for LoaderParams {
    fn default() -> Self {
        Self {
            extensions: vec![String::from("md5mesh"), String::from("md5b")],
            ambient_occlusion: true,
            gui3d: true,
            contract_uvs: true,
            pose_cache_capacity: DEFAULT_POSE_CACHE_CAPACITY,
            view_transforms: HashMap::new(),
        }
    }
}

impl LoaderParams {
    pub(crate) fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod test {
    use super::{parse, LoaderParams, ParseError};

    #[test]
    fn test_rejects_non_utf8_text() {
        let result = parse(&[b'M', b'D', 0xff, 0xfe]);
        assert!(matches!(result, Err(ParseError::BadText(_))));
    }

    #[test]
    fn test_default_params() {
        let params = LoaderParams::default();
        assert!(params.accepts_extension("MD5MESH"));
        assert!(params.accepts_extension("md5b"));
        assert!(!params.accepts_extension("obj"));
        assert!(params.contract_uvs);
    }
}
