//! Pixel calibration conversion
//!
//! Callers describe an axis as `physical = offset + index * scale`. DM3 stores
//! `physical = (index - origin) * scale`, so `origin = -offset / scale`.

use tracing::warn;

/// One axis in the caller's `physical = offset + index * scale` convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    pub scale: f64,
    pub offset: f64,
}

impl AxisCalibration {
    pub const fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }
}

/// Calibration for both image axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationSpec {
    /// y axis, one entry per row.
    pub row: AxisCalibration,
    /// x axis, one entry per column.
    pub col: AxisCalibration,
}

/// Axis description as reported by an upstream reader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisInfo {
    /// Array axis this entry calibrates; `None` for axes that are not part of
    /// the array (e.g. a signal axis).
    pub index_in_array: Option<usize>,
    pub scale: f64,
    pub offset: f64,
}

impl CalibrationSpec {
    pub const fn new(row: AxisCalibration, col: AxisCalibration) -> Self {
        Self { row, col }
    }

    /// Fills in whichever of the two axes are given, defaulting the rest.
    pub fn from_optional(row: Option<AxisCalibration>, col: Option<AxisCalibration>) -> Self {
        Self {
            row: row.unwrap_or_default(),
            col: col.unwrap_or_default(),
        }
    }

    /// Picks the row (index 0) and column (index 1) entries out of an axis
    /// list. Later entries for the same index win; other indices are ignored.
    pub fn from_axes(axes: &[AxisInfo]) -> Self {
        let mut spec = Self::default();
        for axis in axes {
            let entry = AxisCalibration::new(axis.scale, axis.offset);
            match axis.index_in_array {
                Some(0) => spec.row = entry,
                Some(1) => spec.col = entry,
                _ => {}
            }
        }
        spec
    }
}

/// One axis in DM3's `physical = (index - origin) * scale` convention, at
/// the precision the file stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeCalibration {
    pub scale: f32,
    pub origin: f32,
}

/// Converts to DM3's convention.
///
/// A zero scale is written unchanged, but the origin is computed as if the
/// scale were 1.0 so it stays finite.
pub fn to_native(axis: AxisCalibration) -> NativeCalibration {
    let divisor = if axis.scale == 0.0 {
        warn!(offset = axis.offset, "Zero calibration scale, origin computed with scale 1.0");
        1.0
    } else {
        axis.scale
    };
    NativeCalibration {
        scale: axis.scale as f32,
        origin: (-axis.offset / divisor) as f32,
    }
}
