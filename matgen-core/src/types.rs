//! Shader type descriptors.
//!
//! `SType` classifies every value that can flow through the material graph:
//! scalars, vectors, matrices, samplers, textures, buffers, UAVs and named
//! structs. Exactly one classification applies to a value at a time, so the
//! whole descriptor is a closed enum.

use crate::error::{GeneratorError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Half,
    Float,
    Double,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::UInt => "uint",
            ScalarKind::Half => "half",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    pub const ALL: [ScalarKind; 6] = [
        ScalarKind::Bool,
        ScalarKind::Int,
        ScalarKind::UInt,
        ScalarKind::Half,
        ScalarKind::Float,
        ScalarKind::Double,
    ];
}

/// Vector of 2 to 4 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorKind {
    pub scalar: ScalarKind,
    pub size: u8,
}

/// Matrix in HLSL row-by-column notation (`float3x4` = 3 rows, 4 columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixKind {
    pub scalar: ScalarKind,
    pub rows: u8,
    pub cols: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplerKind {
    SamplerState,
    SamplerComparisonState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureKind {
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Texture1DArray,
    Texture2DArray,
    TextureCubeArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferKind {
    Buffer,
    StructuredBuffer,
    ByteAddressBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UavBufferKind {
    RwBuffer,
    RwStructuredBuffer,
    RwByteAddressBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UavTextureKind {
    RwTexture1D,
    RwTexture2D,
    RwTexture3D,
}

/// A shader data type. One classification at a time; struct types carry the
/// struct name used for member-qualified expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SType {
    #[default]
    Unknown,
    Void,
    Scalar(ScalarKind),
    Vector(VectorKind),
    Matrix(MatrixKind),
    Sampler(SamplerKind),
    Texture(TextureKind),
    Buffer(BufferKind),
    UavBuffer(UavBufferKind),
    UavTexture(UavTextureKind),
    Struct(String),
}

impl SType {
    pub fn scalar(kind: ScalarKind) -> Self {
        SType::Scalar(kind)
    }

    pub fn vector(scalar: ScalarKind, size: u8) -> Self {
        debug_assert!((2..=4).contains(&size));
        SType::Vector(VectorKind { scalar, size })
    }

    pub fn float() -> Self {
        SType::Scalar(ScalarKind::Float)
    }

    pub fn float2() -> Self {
        SType::vector(ScalarKind::Float, 2)
    }

    pub fn float3() -> Self {
        SType::vector(ScalarKind::Float, 3)
    }

    pub fn float4() -> Self {
        SType::vector(ScalarKind::Float, 4)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SType::Unknown)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, SType::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, SType::Vector(_))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, SType::Matrix(_))
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, SType::Sampler(_))
    }

    pub fn is_texture(&self) -> bool {
        matches!(self, SType::Texture(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, SType::Struct(_))
    }

    /// Scalars, vectors and matrices take part in component-wise arithmetic.
    pub fn is_numeric(&self) -> bool {
        matches!(self, SType::Scalar(_) | SType::Vector(_) | SType::Matrix(_))
    }

    /// Component count for vectors, 1 for scalars.
    pub fn arity(&self) -> Option<u8> {
        match self {
            SType::Scalar(_) => Some(1),
            SType::Vector(v) => Some(v.size),
            _ => None,
        }
    }

    /// The canonical declared-type text, e.g. `float3` or `Texture2D`.
    pub fn name(&self) -> String {
        match self {
            SType::Unknown => "unknown".to_string(),
            SType::Void => "void".to_string(),
            SType::Scalar(s) => s.name().to_string(),
            SType::Vector(v) => format!("{}{}", v.scalar.name(), v.size),
            SType::Matrix(m) => format!("{}{}x{}", m.scalar.name(), m.rows, m.cols),
            SType::Sampler(s) => match s {
                SamplerKind::SamplerState => "SamplerState".to_string(),
                SamplerKind::SamplerComparisonState => "SamplerComparisonState".to_string(),
            },
            SType::Texture(t) => match t {
                TextureKind::Texture1D => "Texture1D",
                TextureKind::Texture2D => "Texture2D",
                TextureKind::Texture3D => "Texture3D",
                TextureKind::TextureCube => "TextureCube",
                TextureKind::Texture1DArray => "Texture1DArray",
                TextureKind::Texture2DArray => "Texture2DArray",
                TextureKind::TextureCubeArray => "TextureCubeArray",
            }
            .to_string(),
            SType::Buffer(b) => match b {
                BufferKind::Buffer => "Buffer",
                BufferKind::StructuredBuffer => "StructuredBuffer",
                BufferKind::ByteAddressBuffer => "ByteAddressBuffer",
            }
            .to_string(),
            SType::UavBuffer(b) => match b {
                UavBufferKind::RwBuffer => "RWBuffer",
                UavBufferKind::RwStructuredBuffer => "RWStructuredBuffer",
                UavBufferKind::RwByteAddressBuffer => "RWByteAddressBuffer",
            }
            .to_string(),
            SType::UavTexture(t) => match t {
                UavTextureKind::RwTexture1D => "RWTexture1D",
                UavTextureKind::RwTexture2D => "RWTexture2D",
                UavTextureKind::RwTexture3D => "RWTexture3D",
            }
            .to_string(),
            SType::Struct(name) => name.clone(),
        }
    }

    /// Inverse of [`name`](Self::name). Names that match no built-in type
    /// parse as struct types.
    pub fn parse(name: &str) -> SType {
        for scalar in ScalarKind::ALL {
            if name == scalar.name() {
                return SType::Scalar(scalar);
            }
            if let Some(rest) = name.strip_prefix(scalar.name()) {
                if let Some(v) = parse_vector_suffix(scalar, rest) {
                    return v;
                }
                if let Some(m) = parse_matrix_suffix(scalar, rest) {
                    return m;
                }
            }
        }
        match name {
            "void" => return SType::Void,
            "SamplerState" => return SType::Sampler(SamplerKind::SamplerState),
            "SamplerComparisonState" => {
                return SType::Sampler(SamplerKind::SamplerComparisonState)
            }
            "Texture1D" => return SType::Texture(TextureKind::Texture1D),
            "Texture2D" => return SType::Texture(TextureKind::Texture2D),
            "Texture3D" => return SType::Texture(TextureKind::Texture3D),
            "TextureCube" => return SType::Texture(TextureKind::TextureCube),
            "Texture1DArray" => return SType::Texture(TextureKind::Texture1DArray),
            "Texture2DArray" => return SType::Texture(TextureKind::Texture2DArray),
            "TextureCubeArray" => return SType::Texture(TextureKind::TextureCubeArray),
            "Buffer" => return SType::Buffer(BufferKind::Buffer),
            "StructuredBuffer" => return SType::Buffer(BufferKind::StructuredBuffer),
            "ByteAddressBuffer" => return SType::Buffer(BufferKind::ByteAddressBuffer),
            "RWBuffer" => return SType::UavBuffer(UavBufferKind::RwBuffer),
            "RWStructuredBuffer" => return SType::UavBuffer(UavBufferKind::RwStructuredBuffer),
            "RWByteAddressBuffer" => {
                return SType::UavBuffer(UavBufferKind::RwByteAddressBuffer)
            }
            "RWTexture1D" => return SType::UavTexture(UavTextureKind::RwTexture1D),
            "RWTexture2D" => return SType::UavTexture(UavTextureKind::RwTexture2D),
            "RWTexture3D" => return SType::UavTexture(UavTextureKind::RwTexture3D),
            _ => {}
        }
        SType::Struct(name.to_string())
    }

    /// Cast prefix text, e.g. `(float3)`. Only numeric types can be cast
    /// targets; asking for any other kind is a caller contract violation.
    pub fn cast_prefix(&self) -> Result<String> {
        if self.is_numeric() {
            Ok(format!("({})", self.name()))
        } else {
            Err(GeneratorError::TypeError(format!(
                "cannot cast to non-numeric type '{}'",
                self.name()
            )))
        }
    }

    /// Cast prefix for coercing `self` to `to`; empty when no cast is needed.
    pub fn cast_between(&self, to: &SType) -> Result<String> {
        if self == to {
            Ok(String::new())
        } else {
            to.cast_prefix()
        }
    }
}

/// Per-component arithmetic over mixed scalar/vector operands needs an
/// explicit component-wise cast on the scalar side.
pub fn needs_per_component_cast(a: &SType, b: &SType) -> bool {
    a != b && a.is_numeric() && b.is_numeric() && (a.is_scalar() != b.is_scalar())
}

fn parse_vector_suffix(scalar: ScalarKind, rest: &str) -> Option<SType> {
    if rest.len() == 1 {
        let size = rest.as_bytes()[0].wrapping_sub(b'0');
        if (2..=4).contains(&size) {
            return Some(SType::vector(scalar, size));
        }
    }
    None
}

fn parse_matrix_suffix(scalar: ScalarKind, rest: &str) -> Option<SType> {
    let bytes = rest.as_bytes();
    if bytes.len() == 3 && bytes[1] == b'x' {
        let rows = bytes[0].wrapping_sub(b'0');
        let cols = bytes[2].wrapping_sub(b'0');
        if (1..=4).contains(&rows) && (1..=4).contains(&cols) {
            return Some(SType::Matrix(MatrixKind { scalar, rows, cols }));
        }
    }
    None
}
