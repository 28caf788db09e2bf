use std::ops::Range;

use crate::image_pipeline::array::ElementKind;
use crate::image_pipeline::common::error::{DmError, Result};
use crate::image_pipeline::dm3::calibration::NativeCalibration;
use crate::image_pipeline::dm3::fields::{read_f32_le, read_u32_be, read_u32_le};
use crate::image_pipeline::dm3::template::{
    LENGTH_FIELD_BIAS, LENGTH_FIELD_OFFSET, OffsetMap, VERSION_OFFSET,
};
use crate::image_pipeline::dm3::type_codes::{kind_for_codes, width_for_storage_code};

/// The patched fields of a DM3 file, read back from their documented
/// positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerFields {
    pub version: u32,
    pub length_field: u32,
    pub file_len: usize,
    pub col: NativeCalibration,
    pub row: NativeCalibration,
    pub storage_code: u32,
    pub element_count: u32,
    pub display_code: u32,
    pub cols: u32,
    pub rows: u32,
    pub pixel_depth: u32,
    /// Byte range of the pixel data within the file.
    pub payload: Range<usize>,
}

impl ContainerFields {
    pub fn kind(&self) -> Option<ElementKind> {
        kind_for_codes(self.storage_code, self.display_code)
    }

    /// True when the size-dependent fields agree with each other and with
    /// the file length.
    pub fn is_consistent(&self) -> bool {
        let dims_match = self.cols as u64 * self.rows as u64 == self.element_count as u64;
        let depth_matches = width_for_storage_code(self.storage_code)
            .is_some_and(|width| width == self.pixel_depth as usize);
        self.length_field as usize + LENGTH_FIELD_BIAS == self.file_len && dims_match && depth_matches
    }
}

/// Reads every field the writer patches out of `bytes`.
pub fn inspect(bytes: &[u8], offsets: &OffsetMap) -> Result<ContainerFields> {
    let be = |name: &str, at: usize| {
        read_u32_be(bytes, at).ok_or_else(|| truncated(name, at, bytes.len()))
    };
    let f32_le = |name: &str, at: usize| {
        read_f32_le(bytes, at).ok_or_else(|| truncated(name, at, bytes.len()))
    };

    let storage_code = be("storage code", offsets.storage_code)?;
    let element_count = be("element count", offsets.element_count)?;
    let width = width_for_storage_code(storage_code).ok_or_else(|| {
        DmError::MalformedContainer(format!("unknown storage type code {storage_code}"))
    })?;

    let payload_end = (element_count as usize)
        .checked_mul(width)
        .and_then(|len| len.checked_add(offsets.payload_start))
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            DmError::MalformedContainer(format!(
                "{element_count} elements of {width} bytes do not fit in {} bytes",
                bytes.len()
            ))
        })?;

    let le = |name: &str, rel: usize| {
        read_u32_le(bytes, payload_end + rel)
            .ok_or_else(|| truncated(name, payload_end + rel, bytes.len()))
    };

    Ok(ContainerFields {
        version: be("version", VERSION_OFFSET)?,
        length_field: be("length", LENGTH_FIELD_OFFSET)?,
        file_len: bytes.len(),
        col: NativeCalibration {
            scale: f32_le("column scale", offsets.col_scale)?,
            origin: f32_le("column origin", offsets.col_origin)?,
        },
        row: NativeCalibration {
            scale: f32_le("row scale", offsets.row_scale)?,
            origin: f32_le("row origin", offsets.row_origin)?,
        },
        storage_code,
        element_count,
        display_code: le("display code", offsets.suffix_display_code)?,
        cols: le("column count", offsets.suffix_cols)?,
        rows: le("row count", offsets.suffix_rows)?,
        pixel_depth: le("pixel depth", offsets.suffix_pixel_depth)?,
        payload: offsets.payload_start..payload_end,
    })
}

fn truncated(name: &str, at: usize, len: usize) -> DmError {
    DmError::MalformedContainer(format!("{name} field at {at} is past the end of a {len}-byte file"))
}
