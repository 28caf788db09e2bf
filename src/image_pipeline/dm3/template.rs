//! Reference DM3 template and its verified offset map
//!
//! A DM3 file is a tag tree whose pixel bytes sit in the middle of the file.
//! Rather than encoding the tree, we keep a known-good file produced by
//! DigitalMicrograph and only rewrite the handful of fields that depend on
//! the image. [`OffsetMap`] says where those fields are; [`ReferenceTemplate`]
//! pairs it with the bytes and checks that the two agree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, info};

use crate::image_pipeline::array::ElementKind;
use crate::image_pipeline::common::error::{DmError, Result};
use crate::image_pipeline::dm3::fields::{
    self, FIELD_WIDTH, read_f32_le, read_u32_be, read_u32_le, write_f32_le, write_u32_be,
    write_u32_le,
};
use crate::image_pipeline::dm3::type_codes::type_codes;

/// Structural version word at the start of every DM3 file.
pub const DM3_VERSION: u32 = 3;
/// Position of the big-endian version word.
pub const VERSION_OFFSET: usize = 0;
/// Position of the big-endian file length field.
pub const LENGTH_FIELD_OFFSET: usize = 4;
/// The length field holds the file length minus this many bytes.
pub const LENGTH_FIELD_BIAS: usize = 20;

/// Positions of every field the writer rewrites.
///
/// Calibration and array-info positions are absolute and always fall before
/// the pixel data. The four image-display positions are relative to the end
/// of the pixel data, because that region moves with the payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffsetMap {
    /// Exact length of the template these offsets were taken from.
    pub template_len: usize,
    /// Column (x) axis scale, f32 LE.
    pub col_scale: usize,
    /// Column (x) axis origin, f32 LE.
    pub col_origin: usize,
    /// Row (y) axis scale, f32 LE.
    pub row_scale: usize,
    /// Row (y) axis origin, f32 LE.
    pub row_origin: usize,
    /// Array storage type code, u32 BE.
    pub storage_code: usize,
    /// Array element count, u32 BE.
    pub element_count: usize,
    /// First pixel byte.
    pub payload_start: usize,
    /// Element kind of the template's own pixel data.
    pub original_kind: ElementKind,
    /// Element count of the template's own pixel data.
    pub original_count: usize,
    /// Display type code, u32 LE, relative to the end of the pixel data.
    pub suffix_display_code: usize,
    /// Column count, u32 LE, relative to the end of the pixel data.
    pub suffix_cols: usize,
    /// Row count, u32 LE, relative to the end of the pixel data.
    pub suffix_rows: usize,
    /// Bytes per element, u32 LE, relative to the end of the pixel data.
    pub suffix_pixel_depth: usize,
}

impl OffsetMap {
    /// Offsets verified by a full parse of the bundled
    /// `reference_template.dm3` (a GMS-produced 87x87 int32 image).
    pub const REFERENCE_DM3: OffsetMap = OffsetMap {
        template_len: 192_708,
        col_scale: 152_465,
        col_origin: 152_441,
        row_scale: 152_559,
        row_origin: 152_535,
        storage_code: 152_656,
        element_count: 152_660,
        payload_start: 152_664,
        original_kind: ElementKind::I32,
        original_count: 7_569,
        suffix_display_code: 23,
        suffix_cols: 61,
        suffix_rows: 80,
        suffix_pixel_depth: 109,
    };

    /// One past the template's last pixel byte.
    pub const fn original_payload_end(&self) -> usize {
        self.payload_start + self.original_count * self.original_kind.width()
    }

    pub const fn original_payload_len(&self) -> usize {
        self.original_count * self.original_kind.width()
    }

    fn prefix_fields(&self) -> [(&'static str, usize); 7] {
        [
            ("version", VERSION_OFFSET),
            ("length", LENGTH_FIELD_OFFSET),
            ("col_scale", self.col_scale),
            ("col_origin", self.col_origin),
            ("row_scale", self.row_scale),
            ("row_origin", self.row_origin),
            ("storage_code", self.storage_code),
        ]
    }

    fn suffix_fields(&self) -> [(&'static str, usize); 4] {
        [
            ("display_code", self.suffix_display_code),
            ("cols", self.suffix_cols),
            ("rows", self.suffix_rows),
            ("pixel_depth", self.suffix_pixel_depth),
        ]
    }

    /// Checks that every field fits in a buffer of `len` bytes laid out as
    /// these offsets describe.
    pub fn check_layout(&self, len: usize) -> Result<()> {
        type_codes(self.original_kind)?;

        let payload_end = self
            .original_count
            .checked_mul(self.original_kind.width())
            .and_then(|bytes| bytes.checked_add(self.payload_start))
            .ok_or_else(|| DmError::TemplateMismatch("payload end overflows".into()))?;
        if payload_end > len {
            return Err(DmError::TemplateMismatch(format!(
                "payload ends at {payload_end} but the template is {len} bytes"
            )));
        }

        let element_count = ("element_count", self.element_count);
        for (name, at) in self.prefix_fields().into_iter().chain([element_count]) {
            if at.saturating_add(FIELD_WIDTH) > self.payload_start {
                return Err(DmError::TemplateMismatch(format!(
                    "{name} field at {at} overlaps the payload at {}",
                    self.payload_start
                )));
            }
        }

        let suffix_len = len - payload_end;
        for (name, at) in self.suffix_fields() {
            if at.saturating_add(FIELD_WIDTH) > suffix_len {
                return Err(DmError::TemplateMismatch(format!(
                    "{name} field at +{at} runs past the {suffix_len}-byte suffix"
                )));
            }
        }
        Ok(())
    }
}

impl Default for OffsetMap {
    fn default() -> Self {
        Self::REFERENCE_DM3
    }
}

/// An immutable DM3 file used as the skeleton for every write.
#[derive(Debug)]
pub struct ReferenceTemplate {
    bytes: Vec<u8>,
    offsets: OffsetMap,
}

type TemplateCache = Mutex<HashMap<(PathBuf, OffsetMap, bool), Arc<ReferenceTemplate>>>;

static SHARED_TEMPLATES: OnceLock<TemplateCache> = OnceLock::new();

impl ReferenceTemplate {
    /// Reads a template from disk. With `verify` the contents are checked
    /// against `offsets` as in [`ReferenceTemplate::from_bytes`]; without it
    /// only the layout is checked.
    pub fn load<P: AsRef<Path>>(path: P, offsets: OffsetMap, verify: bool) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| DmError::TemplateReadError(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), len = bytes.len(), "Loaded reference template");

        if verify {
            Self::from_bytes(bytes, offsets)
        } else {
            Self::from_bytes_unverified(bytes, offsets)
        }
    }

    /// Loads a template once per process and hands out shared copies.
    pub fn shared<P: AsRef<Path>>(path: P, offsets: OffsetMap, verify: bool) -> Result<Arc<Self>> {
        let key = (path.as_ref().to_path_buf(), offsets, verify);
        let cache = SHARED_TEMPLATES.get_or_init(Default::default);

        if let Some(template) = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            debug!(path = %key.0.display(), "Reusing cached reference template");
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(Self::load(&key.0, offsets, verify)?);
        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(template)))
    }

    /// Wraps template bytes after checking every field `offsets` names
    /// holds the value a DM3 file of the declared original image would.
    pub fn from_bytes(bytes: Vec<u8>, offsets: OffsetMap) -> Result<Self> {
        let template = Self::from_bytes_unverified(bytes, offsets)?;
        template.verify()?;
        Ok(template)
    }

    /// Wraps template bytes, checking only that every offset is in bounds.
    pub fn from_bytes_unverified(bytes: Vec<u8>, offsets: OffsetMap) -> Result<Self> {
        offsets.check_layout(bytes.len())?;
        Ok(Self { bytes, offsets })
    }

    fn verify(&self) -> Result<()> {
        let o = &self.offsets;
        let len = self.bytes.len();
        if len != o.template_len {
            return Err(mismatch("template length", o.template_len, len));
        }

        let version = read_u32_be(&self.bytes, VERSION_OFFSET).unwrap_or_default();
        if version != DM3_VERSION {
            return Err(mismatch("version", DM3_VERSION as usize, version as usize));
        }

        let length_field = read_u32_be(&self.bytes, LENGTH_FIELD_OFFSET).unwrap_or_default();
        if length_field as usize + LENGTH_FIELD_BIAS != len {
            return Err(mismatch(
                "length field",
                len.saturating_sub(LENGTH_FIELD_BIAS),
                length_field as usize,
            ));
        }

        let codes = type_codes(o.original_kind)?;
        let checks = [
            (
                "storage code",
                codes.storage,
                read_u32_be(&self.bytes, o.storage_code),
            ),
            (
                "element count",
                fields::to_u32(o.original_count)?,
                read_u32_be(&self.bytes, o.element_count),
            ),
            (
                "display code",
                codes.display,
                read_u32_le(self.suffix(), o.suffix_display_code),
            ),
            (
                "pixel depth",
                codes.width,
                read_u32_le(self.suffix(), o.suffix_pixel_depth),
            ),
        ];
        for (name, expected, found) in checks {
            let found = found.unwrap_or_default();
            if found != expected {
                return Err(mismatch(name, expected as usize, found as usize));
            }
        }

        let cols = read_u32_le(self.suffix(), o.suffix_cols).unwrap_or_default() as usize;
        let rows = read_u32_le(self.suffix(), o.suffix_rows).unwrap_or_default() as usize;
        if cols * rows != o.original_count {
            return Err(DmError::TemplateMismatch(format!(
                "image is {cols}x{rows} but the array holds {} elements",
                o.original_count
            )));
        }

        debug!(
            cols,
            rows,
            kind = %o.original_kind,
            col_scale = read_f32_le(&self.bytes, o.col_scale),
            row_scale = read_f32_le(&self.bytes, o.row_scale),
            "Reference template verified"
        );
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Everything before the pixel data.
    pub fn prefix(&self) -> &[u8] {
        &self.bytes[..self.offsets.payload_start]
    }

    /// Everything after the template's own pixel data.
    pub fn suffix(&self) -> &[u8] {
        &self.bytes[self.offsets.original_payload_end()..]
    }
}

fn mismatch(field: &str, expected: usize, found: usize) -> DmError {
    DmError::TemplateMismatch(format!("{field} is {found}, expected {expected}"))
}

/// Builds a stand-in that passes [`ReferenceTemplate::from_bytes`] for
/// `offsets`: filler bytes with the header, array-info and image-display
/// fields set for an uncalibrated single-row image of the original kind.
///
/// DM3 readers will not open it. It exists so the writer can be exercised
/// where the real template is not available.
pub fn blank_template(offsets: &OffsetMap) -> Result<Vec<u8>> {
    offsets.check_layout(offsets.template_len)?;
    let codes = type_codes(offsets.original_kind)?;

    let mut bytes: Vec<u8> = (0..offsets.template_len).map(|i| (i % 251) as u8).collect();
    write_u32_be(&mut bytes, VERSION_OFFSET, DM3_VERSION);
    write_u32_be(
        &mut bytes,
        LENGTH_FIELD_OFFSET,
        fields::to_u32(offsets.template_len - LENGTH_FIELD_BIAS)?,
    );
    write_f32_le(&mut bytes, offsets.col_scale, 1.0);
    write_f32_le(&mut bytes, offsets.col_origin, 0.0);
    write_f32_le(&mut bytes, offsets.row_scale, 1.0);
    write_f32_le(&mut bytes, offsets.row_origin, 0.0);
    write_u32_be(&mut bytes, offsets.storage_code, codes.storage);
    write_u32_be(
        &mut bytes,
        offsets.element_count,
        fields::to_u32(offsets.original_count)?,
    );

    let suffix_start = offsets.original_payload_end();
    let suffix = &mut bytes[suffix_start..];
    write_u32_le(suffix, offsets.suffix_display_code, codes.display);
    write_u32_le(suffix, offsets.suffix_cols, fields::to_u32(offsets.original_count)?);
    write_u32_le(suffix, offsets.suffix_rows, 1);
    write_u32_le(suffix, offsets.suffix_pixel_depth, codes.width);
    Ok(bytes)
}
