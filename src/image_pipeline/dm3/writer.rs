use std::io::Write;

use crate::image_pipeline::array::PixelArray;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::dm3::calibration::CalibrationSpec;

pub trait ContainerWriter {
    fn write_container(
        &self,
        pixels: &PixelArray,
        calibration: &CalibrationSpec,
        output: &mut dyn Write,
    ) -> Result<()>;
}
