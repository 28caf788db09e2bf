use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::image_pipeline::array::PixelArray;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::dm3::assemble::assemble;
use crate::image_pipeline::dm3::calibration::CalibrationSpec;
use crate::image_pipeline::dm3::patch::patch;
use crate::image_pipeline::dm3::template::ReferenceTemplate;
use crate::image_pipeline::dm3::types::WriteConfig;
use crate::image_pipeline::dm3::writer::ContainerWriter;

/// Writes DM3 files by patching a shared reference template.
///
/// Cloning is cheap and every clone reads the same template, so one writer
/// can be handed to as many threads as needed.
#[derive(Debug, Clone)]
pub struct TemplateDm3Writer {
    template: Arc<ReferenceTemplate>,
}

impl TemplateDm3Writer {
    pub fn new(template: Arc<ReferenceTemplate>) -> Self {
        Self { template }
    }

    /// Uses the process-wide cached template named by `config`.
    pub fn from_config(config: &WriteConfig) -> Result<Self> {
        let template = ReferenceTemplate::shared(
            &config.template_path,
            config.offsets,
            config.validate_template,
        )?;
        Ok(Self::new(template))
    }

    pub fn template(&self) -> &ReferenceTemplate {
        &self.template
    }

    /// Produces the complete file in memory.
    pub fn render(&self, pixels: &PixelArray, calibration: &CalibrationSpec) -> Result<Vec<u8>> {
        let buffer = patch(&self.template, pixels, calibration)?;
        assemble(buffer)
    }
}

impl ContainerWriter for TemplateDm3Writer {
    fn write_container(
        &self,
        pixels: &PixelArray,
        calibration: &CalibrationSpec,
        output: &mut dyn Write,
    ) -> Result<()> {
        debug!("Encoding DM3 image: {}x{}", pixels.cols(), pixels.rows());

        let bytes = self.render(pixels, calibration)?;
        output.write_all(&bytes)?;

        debug!("DM3 encoding complete, {} bytes", bytes.len());
        Ok(())
    }
}
