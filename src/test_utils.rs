//! Shared fixtures for unit tests.

use std::sync::Arc;

use ndarray::Array2;

use crate::image_pipeline::dm3::{OffsetMap, ReferenceTemplate, blank_template};
use crate::image_pipeline::{ElementKind, InputArray};

/// A compact offset map with the same shape as the reference one: odd
/// calibration offsets, big-endian array info right before a 6-element int32
/// payload, and four display fields in a 40-byte suffix.
pub(crate) fn small_offsets() -> OffsetMap {
    OffsetMap {
        template_len: 120,
        col_origin: 13,
        col_scale: 21,
        row_origin: 29,
        row_scale: 37,
        storage_code: 48,
        element_count: 52,
        payload_start: 56,
        original_kind: ElementKind::I32,
        original_count: 6,
        suffix_display_code: 3,
        suffix_cols: 11,
        suffix_rows: 19,
        suffix_pixel_depth: 27,
    }
}

pub(crate) fn small_template() -> Arc<ReferenceTemplate> {
    let offsets = small_offsets();
    let bytes = blank_template(&offsets).unwrap();
    Arc::new(ReferenceTemplate::from_bytes(bytes, offsets).unwrap())
}

pub(crate) fn reference_template() -> Arc<ReferenceTemplate> {
    let offsets = OffsetMap::REFERENCE_DM3;
    let bytes = blank_template(&offsets).unwrap();
    Arc::new(ReferenceTemplate::from_bytes(bytes, offsets).unwrap())
}

/// 4x4 int32 ramp, 0..15 in row-major order.
pub(crate) fn ramp_4x4() -> InputArray {
    InputArray::from(Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as i32))
}
