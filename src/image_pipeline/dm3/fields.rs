//! Fixed-width field access inside a DM3 byte buffer.
//!
//! Writers index directly: every position they receive has already been
//! checked against the buffer by `OffsetMap::check_layout`. Readers are
//! bounds-checked because they also run on arbitrary files.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::image_pipeline::common::error::{DmError, Result};

pub(crate) const FIELD_WIDTH: usize = 4;

pub(crate) fn write_u32_be(bytes: &mut [u8], at: usize, value: u32) {
    BigEndian::write_u32(&mut bytes[at..at + FIELD_WIDTH], value);
}

pub(crate) fn write_u32_le(bytes: &mut [u8], at: usize, value: u32) {
    LittleEndian::write_u32(&mut bytes[at..at + FIELD_WIDTH], value);
}

pub(crate) fn write_f32_le(bytes: &mut [u8], at: usize, value: f32) {
    LittleEndian::write_f32(&mut bytes[at..at + FIELD_WIDTH], value);
}

pub(crate) fn read_u32_be(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at.checked_add(FIELD_WIDTH)?).map(BigEndian::read_u32)
}

pub(crate) fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at.checked_add(FIELD_WIDTH)?).map(LittleEndian::read_u32)
}

pub(crate) fn read_f32_le(bytes: &[u8], at: usize) -> Option<f32> {
    bytes.get(at..at.checked_add(FIELD_WIDTH)?).map(LittleEndian::read_f32)
}

/// Narrows a size to the 32-bit fields DM3 uses for counts and lengths.
pub(crate) fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| DmError::PayloadTooLarge { bytes: value })
}
