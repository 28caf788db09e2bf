//! DM3 element type codes
//!
//! DM3 describes image elements twice: once in the raw array header that
//! sits right before the pixel bytes ("storage" code) and once in the image
//! display block after them ("display" code). The two enumerations are
//! unrelated and must not be mixed up.

use crate::image_pipeline::array::ElementKind;
use crate::image_pipeline::common::error::{DmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCodes {
    pub storage: u32,
    pub display: u32,
    /// Bytes per element, written as the image's pixel depth.
    pub width: u32,
}

/// Looks up both DM3 codes for `kind`.
///
/// 64-bit integers and `Bool` have no entry; coercion removes them before
/// this is called, so hitting `KindUnsupported` means a broken invariant.
pub fn type_codes(kind: ElementKind) -> Result<TypeCodes> {
    let (storage, display) = match kind {
        ElementKind::I8 => (10, 9),
        ElementKind::U8 => (10, 6),
        ElementKind::I16 => (2, 1),
        ElementKind::U16 => (4, 10),
        ElementKind::I32 => (3, 7),
        ElementKind::U32 => (5, 11),
        ElementKind::F32 => (6, 2),
        ElementKind::F64 => (7, 12),
        ElementKind::Bool | ElementKind::I64 | ElementKind::U64 => {
            return Err(DmError::KindUnsupported(kind));
        }
    };
    Ok(TypeCodes {
        storage,
        display,
        width: kind.width() as u32,
    })
}

/// Element width implied by a storage code, if the code is one we write.
pub fn width_for_storage_code(storage: u32) -> Option<usize> {
    match storage {
        10 => Some(1),
        2 | 4 => Some(2),
        3 | 5 | 6 => Some(4),
        7 => Some(8),
        _ => None,
    }
}

/// Recovers the element kind from a (storage, display) pair.
pub fn kind_for_codes(storage: u32, display: u32) -> Option<ElementKind> {
    let kind = match (storage, display) {
        (10, 9) => ElementKind::I8,
        (10, 6) => ElementKind::U8,
        (2, 1) => ElementKind::I16,
        (4, 10) => ElementKind::U16,
        (3, 7) => ElementKind::I32,
        (5, 11) => ElementKind::U32,
        (6, 2) => ElementKind::F32,
        (7, 12) => ElementKind::F64,
        _ => return None,
    };
    Some(kind)
}
