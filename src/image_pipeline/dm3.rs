//! DM3 writing module
//!
//! Produces Gatan DigitalMicrograph 3 files by patching a verbatim copy of a
//! reference file. Only the pixel data and the fields that describe it are
//! rewritten, so every structural byte comes from a file DigitalMicrograph
//! itself produced.

mod assemble;
pub mod calibration;
mod fields;
mod inspect;
mod patch;
pub mod template;
mod template_writer;
pub mod type_codes;
pub mod types;
mod writer;

pub use assemble::assemble;
pub use calibration::{AxisCalibration, AxisInfo, CalibrationSpec, NativeCalibration, to_native};
pub use inspect::{ContainerFields, inspect};
pub use patch::{PatchedBuffer, patch};
pub use template::{DM3_VERSION, OffsetMap, ReferenceTemplate, blank_template};
pub use template_writer::TemplateDm3Writer;
pub use type_codes::{TypeCodes, type_codes};
pub use types::{WriteConfig, WriteConfigBuilder, WriteOutcome, check_version};
pub use writer::ContainerWriter;
