use tracing::debug;

use crate::image_pipeline::array::PixelArray;
use crate::image_pipeline::common::error::{DmError, Result};
use crate::image_pipeline::dm3::calibration::{CalibrationSpec, to_native};
use crate::image_pipeline::dm3::fields::{to_u32, write_f32_le, write_u32_be, write_u32_le};
use crate::image_pipeline::dm3::template::ReferenceTemplate;
use crate::image_pipeline::dm3::type_codes::type_codes;

/// Private working copy of one write: the template's bytes before and after
/// its pixel data, both patched for the new image, plus the new pixel bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedBuffer {
    pub prefix: Vec<u8>,
    pub payload: Vec<u8>,
    pub suffix: Vec<u8>,
}

impl PatchedBuffer {
    pub fn len(&self) -> usize {
        self.prefix.len() + self.payload.len() + self.suffix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Copies the template around its pixel data and rewrites every field that
/// depends on the new image.
///
/// Prefix fields sit at absolute positions: calibration as f32 LE, array
/// info as u32 BE. Suffix fields are u32 LE at positions relative to the
/// suffix start, which is why the suffix is patched as its own buffer.
/// A zero-length axis is rejected with [`DmError::EmptyArray`].
pub fn patch(
    template: &ReferenceTemplate,
    pixels: &PixelArray,
    calibration: &CalibrationSpec,
) -> Result<PatchedBuffer> {
    let (rows, cols) = (pixels.rows(), pixels.cols());
    if rows == 0 || cols == 0 {
        return Err(DmError::EmptyArray { rows, cols });
    }

    let offsets = template.offsets();
    let codes = type_codes(pixels.kind())?;

    let payload = pixels.to_le_bytes();
    to_u32(payload.len())?;
    let count = to_u32(pixels.len())?;
    let cols = to_u32(cols)?;
    let rows = to_u32(rows)?;

    let col = to_native(calibration.col);
    let row = to_native(calibration.row);

    let mut prefix = template.prefix().to_vec();
    write_f32_le(&mut prefix, offsets.col_scale, col.scale);
    write_f32_le(&mut prefix, offsets.col_origin, col.origin);
    write_f32_le(&mut prefix, offsets.row_scale, row.scale);
    write_f32_le(&mut prefix, offsets.row_origin, row.origin);
    write_u32_be(&mut prefix, offsets.storage_code, codes.storage);
    write_u32_be(&mut prefix, offsets.element_count, count);

    let mut suffix = template.suffix().to_vec();
    write_u32_le(&mut suffix, offsets.suffix_display_code, codes.display);
    write_u32_le(&mut suffix, offsets.suffix_cols, cols);
    write_u32_le(&mut suffix, offsets.suffix_rows, rows);
    write_u32_le(&mut suffix, offsets.suffix_pixel_depth, codes.width);

    debug!(
        storage_code = codes.storage,
        display_code = codes.display,
        cols,
        rows,
        payload_len = payload.len(),
        suffix_start = prefix.len() + payload.len(),
        "Patched template"
    );

    Ok(PatchedBuffer {
        prefix,
        payload,
        suffix,
    })
}
