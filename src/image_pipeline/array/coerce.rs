use ndarray::{Array2, ArrayD, Ix2};
use tracing::{debug, warn};

use crate::image_pipeline::array::types::{ElementKind, InputArray, PixelArray};
use crate::image_pipeline::common::error::{DmError, Result};

/// The kind an input of `kind` ends up as after coercion.
pub const fn coerced_kind(kind: ElementKind) -> ElementKind {
    match kind {
        ElementKind::F64 => ElementKind::F32,
        ElementKind::I64 => ElementKind::I32,
        ElementKind::U64 => ElementKind::U32,
        ElementKind::Bool => ElementKind::F32,
        other => other,
    }
}

/// Converts a caller array into a row-major [`PixelArray`].
///
/// Dimensionality is checked on the input before any conversion. 64-bit
/// kinds are narrowed with `as` casts and anything without a DM3 storage
/// code becomes `f32`.
pub fn coerce(input: InputArray) -> Result<PixelArray> {
    let ndim = input.ndim();
    if ndim != 2 {
        return Err(DmError::ShapeError(ndim));
    }

    let source = input.kind();
    let target = coerced_kind(source);
    if source != target {
        warn!(from = %source, to = %target, "Narrowing array element kind");
    }

    let pixels = match input {
        InputArray::I8(array) => PixelArray::I8(to_2d(array)?),
        InputArray::U8(array) => PixelArray::U8(to_2d(array)?),
        InputArray::I16(array) => PixelArray::I16(to_2d(array)?),
        InputArray::U16(array) => PixelArray::U16(to_2d(array)?),
        InputArray::I32(array) => PixelArray::I32(to_2d(array)?),
        InputArray::U32(array) => PixelArray::U32(to_2d(array)?),
        InputArray::F32(array) => PixelArray::F32(to_2d(array)?),
        InputArray::F64(array) => PixelArray::F32(row_major(to_2d(array)?.mapv(|v| v as f32))),
        InputArray::I64(array) => PixelArray::I32(row_major(to_2d(array)?.mapv(|v| v as i32))),
        InputArray::U64(array) => PixelArray::U32(row_major(to_2d(array)?.mapv(|v| v as u32))),
        InputArray::Bool(array) => {
            PixelArray::F32(row_major(to_2d(array)?.mapv(|v| if v { 1.0 } else { 0.0 })))
        }
    };

    debug!(
        kind = %pixels.kind(),
        rows = pixels.rows(),
        cols = pixels.cols(),
        "Coerced array"
    );
    Ok(pixels)
}

fn to_2d<T: Clone>(array: ArrayD<T>) -> Result<Array2<T>> {
    let ndim = array.ndim();
    array
        .into_dimensionality::<Ix2>()
        .map(row_major)
        .map_err(|_| DmError::ShapeError(ndim))
}

fn row_major<T: Clone>(array: Array2<T>) -> Array2<T> {
    if array.is_standard_layout() {
        array
    } else {
        array.as_standard_layout().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, ArrayD, IxDyn, ShapeBuilder, array};

    #[test]
    fn coercion_table() {
        assert_eq!(coerced_kind(ElementKind::F64), ElementKind::F32);
        assert_eq!(coerced_kind(ElementKind::I64), ElementKind::I32);
        assert_eq!(coerced_kind(ElementKind::U64), ElementKind::U32);
        assert_eq!(coerced_kind(ElementKind::Bool), ElementKind::F32);
        for kind in [
            ElementKind::I8,
            ElementKind::U8,
            ElementKind::I16,
            ElementKind::U16,
            ElementKind::I32,
            ElementKind::U32,
            ElementKind::F32,
        ] {
            assert_eq!(coerced_kind(kind), kind);
        }
    }

    #[test]
    fn float64_becomes_float32() {
        let input = InputArray::from(Array2::<f64>::from_elem((4, 4), 0.25));
        let pixels = coerce(input).unwrap();
        assert_eq!(pixels.kind(), ElementKind::F32);
        assert_eq!(pixels.byte_len(), 64);
        assert_eq!(pixels, PixelArray::F32(Array2::from_elem((4, 4), 0.25f32)));
    }

    #[test]
    fn int64_wraps_into_int32() {
        let input = InputArray::from(array![[1i64, -1], [i64::from(i32::MAX) + 1, 7]]);
        let pixels = coerce(input).unwrap();
        assert_eq!(pixels, PixelArray::I32(array![[1, -1], [i32::MIN, 7]]));
    }

    #[test]
    fn uint64_becomes_uint32() {
        let pixels = coerce(InputArray::from(array![[5u64, 6]])).unwrap();
        assert_eq!(pixels, PixelArray::U32(array![[5, 6]]));
    }

    #[test]
    fn bool_falls_back_to_float32() {
        let pixels = coerce(InputArray::from(array![[true, false]])).unwrap();
        assert_eq!(pixels, PixelArray::F32(array![[1.0, 0.0]]));
    }

    #[test]
    fn supported_kinds_pass_through() {
        let pixels = coerce(InputArray::from(array![[1u16, 2], [3, 4]])).unwrap();
        assert_eq!(pixels, PixelArray::U16(array![[1, 2], [3, 4]]));
    }

    #[test]
    fn rejects_non_2d_before_conversion() {
        let cube = InputArray::from(ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2])));
        assert!(matches!(coerce(cube), Err(DmError::ShapeError(3))));

        let line = InputArray::from(ArrayD::<u8>::zeros(IxDyn(&[8])));
        assert!(matches!(coerce(line), Err(DmError::ShapeError(1))));
    }

    #[test]
    fn fortran_order_input_is_made_row_major() {
        let mut f_order = Array2::<i32>::zeros((2, 3).f());
        f_order.assign(&array![[0, 1, 2], [3, 4, 5]]);
        assert!(!f_order.is_standard_layout());

        let pixels = coerce(InputArray::from(f_order)).unwrap();
        match &pixels {
            PixelArray::I32(array) => assert!(array.is_standard_layout()),
            other => panic!("unexpected kind {:?}", other.kind()),
        }
        let expected: Vec<u8> = (0..6i32).flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(pixels.to_le_bytes(), expected);
    }
}
