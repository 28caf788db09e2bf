//! DM3 write configuration types

use std::path::{Path, PathBuf};

use crate::image_pipeline::common::error::{DmError, Result};
use crate::image_pipeline::dm3::template::{DM3_VERSION, OffsetMap};

/// Environment variable that overrides the bundled template location.
pub const TEMPLATE_ENV_VAR: &str = "DM3PATCH_TEMPLATE";

/// Where the reference template ships with the crate.
pub const BUNDLED_TEMPLATE: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/assets/reference_template.dm3");

pub fn default_template_path() -> PathBuf {
    std::env::var_os(TEMPLATE_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(BUNDLED_TEMPLATE))
}

/// Fails unless `version` is the one structural version we can patch.
pub fn check_version(version: u32) -> Result<()> {
    if version == DM3_VERSION {
        Ok(())
    } else {
        Err(DmError::UnsupportedVersion(version))
    }
}

/// Result of writing to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { bytes: usize },
    /// The destination existed and overwriting was disabled.
    Skipped,
}

/// Configuration for array to DM3 conversion
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// Reference DM3 file every output is patched from
    pub template_path: PathBuf,
    /// Positions of the patched fields inside the template
    pub offsets: OffsetMap,
    /// Requested DM structural version; only 3 is accepted
    pub version: u32,
    /// Whether an existing destination file is replaced or left alone
    pub overwrite: bool,
    /// Whether to check the template contents against `offsets` on load
    pub validate_template: bool,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            template_path: default_template_path(),
            offsets: OffsetMap::REFERENCE_DM3,
            version: DM3_VERSION,
            overwrite: true,
            validate_template: true,
        }
    }
}

impl WriteConfig {
    pub fn builder() -> WriteConfigBuilder {
        WriteConfigBuilder::default()
    }
}

/// Builder for WriteConfig
#[derive(Default)]
pub struct WriteConfigBuilder {
    template_path: Option<PathBuf>,
    offsets: Option<OffsetMap>,
    version: Option<u32>,
    overwrite: Option<bool>,
    validate_template: Option<bool>,
}

impl WriteConfigBuilder {
    pub fn template_path(mut self, path: impl AsRef<Path>) -> Self {
        self.template_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn offsets(mut self, offsets: OffsetMap) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn validate_template(mut self, validate: bool) -> Self {
        self.validate_template = Some(validate);
        self
    }

    pub fn build(self) -> WriteConfig {
        let default = WriteConfig::default();
        WriteConfig {
            template_path: self.template_path.unwrap_or(default.template_path),
            offsets: self.offsets.unwrap_or(default.offsets),
            version: self.version.unwrap_or(default.version),
            overwrite: self.overwrite.unwrap_or(default.overwrite),
            validate_template: self.validate_template.unwrap_or(default.validate_template),
        }
    }
}
