//! Common utilities module
//!
//! This module contains the error type and step timing shared across the pipeline.

pub mod error;
pub mod timing;

pub use error::{DmError, Result};
pub use timing::{PipelineTimings, StepTiming, Timer};
