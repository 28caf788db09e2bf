use std::fs::Permissions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::{info, instrument};

use crate::image_pipeline::{
    array::{InputArray, PixelArray, coerce},
    common::{
        error::{DmError, Result},
        timing::PipelineTimings,
    },
    dm3::{
        AxisCalibration, CalibrationSpec, ContainerWriter, TemplateDm3Writer, WriteConfig,
        WriteOutcome, check_version,
    },
};

pub struct Dm3Pipeline<W: ContainerWriter> {
    writer: W,
    config: WriteConfig,
}

impl Dm3Pipeline<TemplateDm3Writer> {
    /// Checks the requested version, then loads (or reuses) the template.
    pub fn new(config: WriteConfig) -> Result<Self> {
        check_version(config.version)?;
        let writer = TemplateDm3Writer::from_config(&config)?;
        Ok(Self { writer, config })
    }
}

impl<W: ContainerWriter> Dm3Pipeline<W> {
    pub fn with_custom(writer: W, config: WriteConfig) -> Result<Self> {
        check_version(config.version)?;
        Ok(Self { writer, config })
    }

    fn validate_dimensions(&self, pixels: &PixelArray) -> Result<()> {
        let (rows, cols) = (pixels.rows(), pixels.cols());
        if rows == 0 || cols == 0 {
            return Err(DmError::EmptyArray { rows, cols });
        }
        Ok(())
    }

    fn prepare(&self, array: InputArray, timings: &mut PipelineTimings) -> Result<PixelArray> {
        let pixels = timings.time("coerce", || coerce(array))?;
        self.validate_dimensions(&pixels)?;
        Ok(pixels)
    }

    fn encode(
        &self,
        pixels: &PixelArray,
        calibration: Option<CalibrationSpec>,
        output: &mut dyn Write,
        timings: &mut PipelineTimings,
    ) -> Result<()> {
        let calibration = calibration.unwrap_or_default();
        timings.time("render", || {
            self.writer.write_container(pixels, &calibration, output)
        })
    }

    #[instrument(skip_all, fields(kind = %array.kind(), shape = ?array.shape()))]
    pub fn convert(
        &self,
        array: InputArray,
        calibration: Option<CalibrationSpec>,
        output: &mut dyn Write,
    ) -> Result<()> {
        self.convert_with_timings(array, calibration, output)
            .map(|_| ())
    }

    pub fn convert_with_timings(
        &self,
        array: InputArray,
        calibration: Option<CalibrationSpec>,
        output: &mut dyn Write,
    ) -> Result<PipelineTimings> {
        let mut timings = PipelineTimings::new();
        info!("Starting array to DM3 conversion");

        let pixels = self.prepare(array, &mut timings)?;
        self.encode(&pixels, calibration, output, &mut timings)?;

        info!(
            "Conversion complete: {}x{} {} in {:.3}ms",
            pixels.cols(),
            pixels.rows(),
            pixels.kind(),
            timings.total_duration().as_secs_f64() * 1000.0
        );
        Ok(timings)
    }

    /// Renders the whole file into memory.
    pub fn render(&self, array: InputArray, calibration: Option<CalibrationSpec>) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.convert(array, calibration, &mut bytes)?;
        Ok(bytes)
    }

    #[instrument(skip_all, fields(output = %output_path.as_ref().display()))]
    pub fn convert_file<P: AsRef<Path>>(
        &self,
        array: InputArray,
        calibration: Option<CalibrationSpec>,
        output_path: P,
    ) -> Result<WriteOutcome> {
        self.convert_file_with_timings(array, calibration, output_path)
            .map(|(outcome, _)| outcome)
    }

    pub fn convert_file_with_timings<P: AsRef<Path>>(
        &self,
        array: InputArray,
        calibration: Option<CalibrationSpec>,
        output_path: P,
    ) -> Result<(WriteOutcome, PipelineTimings)> {
        let output_path = output_path.as_ref();
        let mut timings = PipelineTimings::new();

        let pixels = self.prepare(array, &mut timings)?;

        if !self.config.overwrite && output_path.exists() {
            info!(output = %output_path.display(), "Skipped, output exists");
            return Ok((WriteOutcome::Skipped, timings));
        }

        let mut bytes = Vec::new();
        self.encode(&pixels, calibration, &mut bytes, &mut timings)?;
        let outcome = timings.time("write_output", || {
            write_atomically(output_path, &bytes, self.config.overwrite)
        })?;
        if outcome == WriteOutcome::Skipped {
            info!(output = %output_path.display(), "Skipped, output appeared during write");
            return Ok((outcome, timings));
        }

        info!(
            output = %output_path.display(),
            bytes = bytes.len(),
            "Wrote {}x{} {} image",
            pixels.cols(),
            pixels.rows(),
            pixels.kind()
        );
        Ok((WriteOutcome::Written { bytes: bytes.len() }, timings))
    }

    pub fn config(&self) -> &WriteConfig {
        &self.config
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

/// Writes `bytes` to a temporary file next to `path` and renames it into
/// place, so `path` holds either its old content or the complete new file.
///
/// An existing destination keeps its permissions; a new one gets the usual
/// umask-filtered default. With `overwrite` off the rename refuses to
/// replace a file, and one that appeared since the caller checked is left
/// alone and reported as [`WriteOutcome::Skipped`].
pub(super) fn write_atomically(
    path: &Path,
    bytes: &[u8],
    overwrite: bool,
) -> Result<WriteOutcome> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let output_error =
        |e: std::io::Error| DmError::OutputWriteError(format!("{}: {}", path.display(), e));

    let existing = std::fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut builder = tempfile::Builder::new();
    builder.prefix(".dm3patch").suffix(".tmp");
    if let Some(permissions) = default_permissions() {
        builder.permissions(permissions);
    }
    let mut file = builder.tempfile_in(dir).map_err(output_error)?;
    if let Some(permissions) = existing {
        file.as_file().set_permissions(permissions).map_err(output_error)?;
    }
    file.write_all(bytes).map_err(output_error)?;
    file.flush().map_err(output_error)?;

    if overwrite {
        file.persist(path).map_err(|e| output_error(e.error))?;
    } else {
        match file.persist_noclobber(path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                return Ok(WriteOutcome::Skipped);
            }
            Err(e) => return Err(output_error(e.error)),
        }
    }
    Ok(WriteOutcome::Written { bytes: bytes.len() })
}

/// Mode requested for new files; the process umask still applies.
#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o666))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

/// Writes `array` as a DM3 file at `output_path` using the default template
/// (`$DM3PATCH_TEMPLATE`, else the bundled `assets/reference_template.dm3`).
///
/// `version` and the array's dimensionality are checked before the template
/// is loaded or the destination touched. Missing calibrations default to
/// scale 1.0 and offset 0.0. Returns [`DmError::TemplateReadError`] when the
/// template file is missing or unreadable.
pub fn write_container<P: AsRef<Path>>(
    output_path: P,
    array: impl Into<InputArray>,
    row_calibration: Option<AxisCalibration>,
    col_calibration: Option<AxisCalibration>,
    version: u32,
) -> Result<()> {
    let config = WriteConfig::builder().version(version).build();
    write_container_with(&config, output_path, array, row_calibration, col_calibration)?;
    Ok(())
}

/// [`write_container`] with an explicit configuration, so the template,
/// offsets and overwrite policy can be chosen by the caller.
pub fn write_container_with<P: AsRef<Path>>(
    config: &WriteConfig,
    output_path: P,
    array: impl Into<InputArray>,
    row_calibration: Option<AxisCalibration>,
    col_calibration: Option<AxisCalibration>,
) -> Result<WriteOutcome> {
    check_version(config.version)?;
    let array = array.into();
    if array.ndim() != 2 {
        return Err(DmError::ShapeError(array.ndim()));
    }

    let pipeline = Dm3Pipeline::new(config.clone())?;
    let calibration = CalibrationSpec::from_optional(row_calibration, col_calibration);
    pipeline.convert_file(array, Some(calibration), output_path)
}
