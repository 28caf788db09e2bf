use thiserror::Error;

use crate::image_pipeline::array::ElementKind;

#[derive(Error, Debug)]
pub enum DmError {
    #[error("Unsupported DM version {0}: only DM3 (version 3) is supported")]
    UnsupportedVersion(u32),

    #[error("Expected a 2-D array, got {0}-D")]
    ShapeError(usize),

    #[error("No DM3 type code for element kind {0}")]
    KindUnsupported(ElementKind),

    #[error("Invalid image dimensions: rows={rows}, cols={cols}")]
    EmptyArray { rows: usize, cols: usize },

    #[error("Shape {0:?} has more bytes than can be addressed")]
    ShapeTooLarge(Vec<usize>),

    #[error("Payload of {bytes} bytes does not fit the 32-bit DM3 length fields")]
    PayloadTooLarge { bytes: usize },

    #[error("Element buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Failed to read reference template: {0}")]
    TemplateReadError(String),

    #[error("Reference template does not match its offset map: {0}")]
    TemplateMismatch(String),

    #[error("Malformed DM3 container: {0}")]
    MalformedContainer(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DmError {
    /// True for errors caused by the arguments of a call rather than by the
    /// environment. Repeating such a call cannot succeed.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DmError::UnsupportedVersion(_)
                | DmError::ShapeError(_)
                | DmError::EmptyArray { .. }
                | DmError::ShapeTooLarge(_)
                | DmError::PayloadTooLarge { .. }
                | DmError::BufferSizeMismatch { .. }
        )
    }

    /// True for filesystem failures that a batch driver may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DmError::TemplateReadError(_) | DmError::OutputWriteError(_) | DmError::IoError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DmError>;
