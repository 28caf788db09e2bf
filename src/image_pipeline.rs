//! Image writing pipeline module
//!
//! This module turns 2-D numeric arrays into DigitalMicrograph 3 files, with
//! separate modules for array intake, DM3 template patching, and conversion
//! orchestration.

pub mod array;
pub mod common;
pub mod conversions;
pub mod dm3;

pub use common::{
    DmError,
    PipelineTimings,
    Result,
};

pub use array::{
    ElementKind,
    InputArray,
    PixelArray,
};

pub use dm3::{
    AxisCalibration,
    AxisInfo,
    CalibrationSpec,
    ContainerFields,
    ContainerWriter,
    OffsetMap,
    ReferenceTemplate,
    TemplateDm3Writer,
    WriteConfig,
    WriteConfigBuilder,
    WriteOutcome,
};

pub use conversions::{
    Dm3Pipeline,
    write_container,
    write_container_with,
};
