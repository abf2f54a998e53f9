use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementUsage {
    Position,
    Normal,
    Color,
    Uv,
    Padding,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    Float,
    UByte,
    Byte,
    UShort,
    Short,
    UInt,
    Int,
}

impl ElementKind {
    pub fn size(&self) -> usize {
        match self {
            ElementKind::UByte | ElementKind::Byte => 1,
            ElementKind::UShort | ElementKind::Short => 2,
            ElementKind::Float | ElementKind::UInt | ElementKind::Int => 4,
        }
    }

    /// Write one component. Normalized values map `[0, 1]` (unsigned) or
    /// `[-1, 1]` (signed) onto the integer range; other values are rounded.
    pub(crate) fn write(&self, value: f32, normalized: bool, output: &mut Vec<u8>) {
        fn integer(value: f32, normalized: bool, min: f64, max: f64) -> f64 {
            let value = value as f64;
            if normalized {
                let low = if min < 0.0 { -1.0 } else { 0.0 };
                (value.clamp(low, 1.0) * max).round()
            } else {
                value.round().clamp(min, max)
            }
        }
        match self {
            ElementKind::Float => output.extend_from_slice(&value.to_le_bytes()),
            ElementKind::UByte => {
                let value = integer(value, normalized, 0.0, u8::MAX as f64) as u8;
                output.push(value);
            }
            ElementKind::Byte => {
                let value = integer(value, normalized, i8::MIN as f64, i8::MAX as f64) as i8;
                output.extend_from_slice(&value.to_le_bytes());
            }
            ElementKind::UShort => {
                let value = integer(value, normalized, 0.0, u16::MAX as f64) as u16;
                output.extend_from_slice(&value.to_le_bytes());
            }
            ElementKind::Short => {
                let value = integer(value, normalized, i16::MIN as f64, i16::MAX as f64) as i16;
                output.extend_from_slice(&value.to_le_bytes());
            }
            ElementKind::UInt => {
                let value = integer(value, normalized, 0.0, u32::MAX as f64) as u32;
                output.extend_from_slice(&value.to_le_bytes());
            }
            ElementKind::Int => {
                let value = integer(value, normalized, i32::MIN as f64, i32::MAX as f64) as i32;
                output.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
}

/// One attribute of a vertex, `count` components of `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexElement {
    pub usage: ElementUsage,
    pub kind: ElementKind,
    pub count: usize,
    /// Distinguishes repeated usages, e.g. texture and lightmap coordinates.
    pub index: usize,
}

impl VertexElement {
    pub const fn new(usage: ElementUsage, kind: ElementKind, count: usize, index: usize) -> Self {
        Self {
            usage,
            kind,
            count,
            index,
        }
    }

    pub fn size(&self) -> usize {
        self.kind.size() * self.count
    }

    pub fn is_normalized(&self) -> bool {
        match self.usage {
            ElementUsage::Color | ElementUsage::Normal => true,
            ElementUsage::Uv => self.index == 0,
            _ => false,
        }
    }
}

impl Display for VertexElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}{} {}x{:?}",
            self.usage, self.index, self.count, self.kind
        )
    }
}

/// Ordered attribute layout of the vertices the host expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexFormat {
    elements: Vec<VertexElement>,
}

impl VertexFormat {
    pub const POSITION: VertexElement =
        VertexElement::new(ElementUsage::Position, ElementKind::Float, 3, 0);
    pub const COLOR: VertexElement =
        VertexElement::new(ElementUsage::Color, ElementKind::UByte, 4, 0);
    pub const TEX_0: VertexElement = VertexElement::new(ElementUsage::Uv, ElementKind::Float, 2, 0);
    pub const TEX_1: VertexElement = VertexElement::new(ElementUsage::Uv, ElementKind::Short, 2, 1);
    pub const NORMAL: VertexElement =
        VertexElement::new(ElementUsage::Normal, ElementKind::Byte, 3, 0);
    pub const PADDING: VertexElement =
        VertexElement::new(ElementUsage::Padding, ElementKind::Byte, 1, 0);

    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }

    /// Position, color, texture and lightmap coordinates.
    pub fn block() -> Self {
        Self::new(vec![
            Self::POSITION,
            Self::COLOR,
            Self::TEX_0,
            Self::TEX_1,
        ])
    }

    /// Position, color, texture coordinates, normal and padding.
    pub fn item() -> Self {
        Self::new(vec![
            Self::POSITION,
            Self::COLOR,
            Self::TEX_0,
            Self::NORMAL,
            Self::PADDING,
        ])
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bytes per packed vertex.
    pub fn stride(&self) -> usize {
        self.elements.iter().map(VertexElement::size).sum()
    }

    pub fn position_of(&self, usage: ElementUsage, index: usize) -> Option<usize> {
        self.elements
            .iter()
            .position(|element| element.usage == usage && element.index == index)
    }
}

#[cfg(test)]
mod test {
    use super::{ElementKind, ElementUsage, VertexFormat};

    #[test]
    fn test_presets() {
        let block = VertexFormat::block();
        assert_eq!(block.stride(), 28);
        assert_eq!(block.position_of(ElementUsage::Uv, 1), Some(3));
        assert_eq!(block.position_of(ElementUsage::Normal, 0), None);

        let item = VertexFormat::item();
        assert_eq!(item.stride(), 28);
        assert_eq!(item.position_of(ElementUsage::Normal, 0), Some(3));
        assert!(item.elements()[3].is_normalized());
        assert!(!block.elements()[3].is_normalized());
    }

    #[test]
    fn test_write_components() {
        let mut output = Vec::new();
        ElementKind::UByte.write(1.0, true, &mut output);
        ElementKind::UByte.write(2.0, true, &mut output);
        ElementKind::UByte.write(-0.5, true, &mut output);
        ElementKind::Byte.write(-1.0, true, &mut output);
        ElementKind::Byte.write(0.5, true, &mut output);
        assert_eq!(output, vec![255, 255, 0, (-127i8) as u8, 64]);

        output.clear();
        ElementKind::Short.write(240.4, false, &mut output);
        ElementKind::Float.write(0.25, false, &mut output);
        assert_eq!(output[..2], 240i16.to_le_bytes());
        assert_eq!(output[2..], 0.25f32.to_le_bytes());
    }
}
