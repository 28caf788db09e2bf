//! Array types accepted and produced by the coercion step

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use ndarray::{Array2, ArrayD, Dimension, IxDyn};

use crate::image_pipeline::common::error::{DmError, Result};

/// Numeric element kind of an array.
///
/// `Bool`, `I64`, `U64` and `F64` can be handed to the writer but are
/// narrowed before anything is patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementKind {
    /// Size of one element in bytes.
    pub const fn width(self) -> usize {
        match self {
            ElementKind::Bool | ElementKind::I8 | ElementKind::U8 => 1,
            ElementKind::I16 | ElementKind::U16 => 2,
            ElementKind::I32 | ElementKind::U32 | ElementKind::F32 => 4,
            ElementKind::I64 | ElementKind::U64 | ElementKind::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::Bool => "bool",
            ElementKind::I8 => "int8",
            ElementKind::U8 => "uint8",
            ElementKind::I16 => "int16",
            ElementKind::U16 => "uint16",
            ElementKind::I32 => "int32",
            ElementKind::U32 => "uint32",
            ElementKind::I64 => "int64",
            ElementKind::U64 => "uint64",
            ElementKind::F32 => "float32",
            ElementKind::F64 => "float64",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An array of any dimensionality and element kind, as handed over by a
/// caller before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum InputArray {
    Bool(ArrayD<bool>),
    I8(ArrayD<i8>),
    U8(ArrayD<u8>),
    I16(ArrayD<i16>),
    U16(ArrayD<u16>),
    I32(ArrayD<i32>),
    U32(ArrayD<u32>),
    I64(ArrayD<i64>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

macro_rules! input_array_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<ArrayD<$ty>> for InputArray {
                fn from(array: ArrayD<$ty>) -> Self {
                    InputArray::$variant(array)
                }
            }

            impl From<Array2<$ty>> for InputArray {
                fn from(array: Array2<$ty>) -> Self {
                    InputArray::$variant(array.into_dyn())
                }
            }
        )*
    };
}

input_array_from! {
    Bool => bool,
    I8 => i8,
    U8 => u8,
    I16 => i16,
    U16 => u16,
    I32 => i32,
    U32 => u32,
    I64 => i64,
    U64 => u64,
    F32 => f32,
    F64 => f64,
}

macro_rules! with_input {
    ($input:expr, $array:ident => $body:expr) => {
        match $input {
            InputArray::Bool($array) => $body,
            InputArray::I8($array) => $body,
            InputArray::U8($array) => $body,
            InputArray::I16($array) => $body,
            InputArray::U16($array) => $body,
            InputArray::I32($array) => $body,
            InputArray::U32($array) => $body,
            InputArray::I64($array) => $body,
            InputArray::U64($array) => $body,
            InputArray::F32($array) => $body,
            InputArray::F64($array) => $body,
        }
    };
}

impl InputArray {
    pub fn kind(&self) -> ElementKind {
        match self {
            InputArray::Bool(_) => ElementKind::Bool,
            InputArray::I8(_) => ElementKind::I8,
            InputArray::U8(_) => ElementKind::U8,
            InputArray::I16(_) => ElementKind::I16,
            InputArray::U16(_) => ElementKind::U16,
            InputArray::I32(_) => ElementKind::I32,
            InputArray::U32(_) => ElementKind::U32,
            InputArray::I64(_) => ElementKind::I64,
            InputArray::U64(_) => ElementKind::U64,
            InputArray::F32(_) => ElementKind::F32,
            InputArray::F64(_) => ElementKind::F64,
        }
    }

    pub fn ndim(&self) -> usize {
        with_input!(self, array => array.ndim())
    }

    pub fn shape(&self) -> &[usize] {
        with_input!(self, array => array.shape())
    }

    /// Decodes a headerless dump of little-endian elements into an array of
    /// the given shape.
    pub fn from_le_bytes(kind: ElementKind, shape: &[usize], bytes: &[u8]) -> Result<Self> {
        let expected = shape
            .iter()
            .try_fold(kind.width(), |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| DmError::ShapeTooLarge(shape.to_vec()))?;
        if bytes.len() != expected {
            return Err(DmError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let count = expected / kind.width();
        let shape = IxDyn(shape);

        macro_rules! decode {
            ($variant:ident, $ty:ty, $read_into:path) => {{
                let mut values: Vec<$ty> = vec![Default::default(); count];
                $read_into(bytes, &mut values);
                InputArray::$variant(into_shape(shape, values)?)
            }};
        }

        let array = match kind {
            ElementKind::Bool => {
                InputArray::Bool(into_shape(shape, bytes.iter().map(|&b| b != 0).collect())?)
            }
            ElementKind::I8 => {
                InputArray::I8(into_shape(shape, bytes.iter().map(|&b| b as i8).collect())?)
            }
            ElementKind::U8 => InputArray::U8(into_shape(shape, bytes.to_vec())?),
            ElementKind::I16 => decode!(I16, i16, LittleEndian::read_i16_into),
            ElementKind::U16 => decode!(U16, u16, LittleEndian::read_u16_into),
            ElementKind::I32 => decode!(I32, i32, LittleEndian::read_i32_into),
            ElementKind::U32 => decode!(U32, u32, LittleEndian::read_u32_into),
            ElementKind::I64 => decode!(I64, i64, LittleEndian::read_i64_into),
            ElementKind::U64 => decode!(U64, u64, LittleEndian::read_u64_into),
            ElementKind::F32 => decode!(F32, f32, LittleEndian::read_f32_into),
            ElementKind::F64 => decode!(F64, f64, LittleEndian::read_f64_into),
        };
        Ok(array)
    }
}

fn into_shape<T>(shape: IxDyn, values: Vec<T>) -> Result<ArrayD<T>> {
    let ndim = shape.ndim();
    ArrayD::from_shape_vec(shape, values).map_err(|_| DmError::ShapeError(ndim))
}

/// A row-major 2-D array in one of the element kinds DM3 stores directly.
///
/// [`coerce`](crate::image_pipeline::array::coerce) hands these out in
/// standard layout; serialization walks logical order either way.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    I8(Array2<i8>),
    U8(Array2<u8>),
    I16(Array2<i16>),
    U16(Array2<u16>),
    I32(Array2<i32>),
    U32(Array2<u32>),
    F32(Array2<f32>),
}

macro_rules! with_pixels {
    ($pixels:expr, $array:ident => $body:expr) => {
        match $pixels {
            PixelArray::I8($array) => $body,
            PixelArray::U8($array) => $body,
            PixelArray::I16($array) => $body,
            PixelArray::U16($array) => $body,
            PixelArray::I32($array) => $body,
            PixelArray::U32($array) => $body,
            PixelArray::F32($array) => $body,
        }
    };
}

impl PixelArray {
    pub fn kind(&self) -> ElementKind {
        match self {
            PixelArray::I8(_) => ElementKind::I8,
            PixelArray::U8(_) => ElementKind::U8,
            PixelArray::I16(_) => ElementKind::I16,
            PixelArray::U16(_) => ElementKind::U16,
            PixelArray::I32(_) => ElementKind::I32,
            PixelArray::U32(_) => ElementKind::U32,
            PixelArray::F32(_) => ElementKind::F32,
        }
    }

    /// Number of rows (ny).
    pub fn rows(&self) -> usize {
        with_pixels!(self, array => array.nrows())
    }

    /// Number of columns (nx).
    pub fn cols(&self) -> usize {
        with_pixels!(self, array => array.ncols())
    }

    pub fn len(&self) -> usize {
        with_pixels!(self, array => array.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len() * self.kind().width()
    }

    /// Serializes the elements in row-major order, little-endian, with no
    /// padding.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            PixelArray::I8(array) => le_bytes(array, i8::to_le_bytes),
            PixelArray::U8(array) => le_bytes(array, u8::to_le_bytes),
            PixelArray::I16(array) => le_bytes(array, i16::to_le_bytes),
            PixelArray::U16(array) => le_bytes(array, u16::to_le_bytes),
            PixelArray::I32(array) => le_bytes(array, i32::to_le_bytes),
            PixelArray::U32(array) => le_bytes(array, u32::to_le_bytes),
            PixelArray::F32(array) => le_bytes(array, f32::to_le_bytes),
        }
    }
}

fn le_bytes<T: Copy, const N: usize>(array: &Array2<T>, encode: fn(T) -> [u8; N]) -> Vec<u8> {
    let mut out = Vec::with_capacity(array.len() * N);
    for &value in array.iter() {
        out.extend_from_slice(&encode(value));
    }
    out
}
