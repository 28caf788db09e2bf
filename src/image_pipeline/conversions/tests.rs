use std::io::Write;
use std::sync::{Arc, Mutex};

use ndarray::{Array2, ArrayD, IxDyn};

use crate::image_pipeline::array::{ElementKind, InputArray, PixelArray};
use crate::image_pipeline::common::error::{DmError, Result};
use crate::image_pipeline::conversions::array_to_dm3::write_atomically;
use crate::image_pipeline::conversions::{Dm3Pipeline, write_container};
use crate::image_pipeline::dm3::{
    AxisCalibration, CalibrationSpec, ContainerWriter, OffsetMap, TemplateDm3Writer, WriteConfig,
    WriteOutcome, inspect,
};
use crate::test_utils::{ramp_4x4, reference_template, small_template};

struct MockWriter {
    should_fail: bool,
    written: Arc<Mutex<Vec<(PixelArray, CalibrationSpec)>>>,
}

impl ContainerWriter for MockWriter {
    fn write_container(
        &self,
        pixels: &PixelArray,
        calibration: &CalibrationSpec,
        output: &mut dyn Write,
    ) -> Result<()> {
        if self.should_fail {
            return Err(DmError::OutputWriteError("Mock write error".to_string()));
        }
        self.written
            .lock()
            .unwrap()
            .push((pixels.clone(), *calibration));
        output.write_all(b"DM3")?;
        Ok(())
    }
}

fn mock_pipeline(should_fail: bool) -> (Dm3Pipeline<MockWriter>, Arc<Mutex<Vec<(PixelArray, CalibrationSpec)>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail,
        written: written.clone(),
    };
    let pipeline = Dm3Pipeline::with_custom(writer, WriteConfig::default()).unwrap();
    (pipeline, written)
}

#[test]
fn test_successful_conversion() {
    let (pipeline, written) = mock_pipeline(false);

    let mut output = Vec::new();
    pipeline.convert(ramp_4x4(), None, &mut output).unwrap();

    assert_eq!(output, b"DM3");
    let written = written.lock().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].0.kind(), ElementKind::I32);
    assert_eq!(written[0].1, CalibrationSpec::default());
}

#[test]
fn test_writer_receives_coerced_array() {
    let (pipeline, written) = mock_pipeline(false);
    let input = InputArray::from(Array2::<f64>::zeros((2, 3)));

    pipeline.convert(input, None, &mut Vec::new()).unwrap();

    let written = written.lock().unwrap();
    assert_eq!(written[0].0, PixelArray::F32(Array2::zeros((2, 3))));
}

#[test]
fn test_writer_failure() {
    let (pipeline, _) = mock_pipeline(true);
    let result = pipeline.convert(ramp_4x4(), None, &mut Vec::new());
    assert!(matches!(result, Err(DmError::OutputWriteError(_))));
}

#[test]
fn test_shape_error_never_reaches_writer() {
    let (pipeline, written) = mock_pipeline(false);
    let cube = InputArray::from(ArrayD::<i32>::zeros(IxDyn(&[2, 2, 2])));

    let result = pipeline.convert(cube, None, &mut Vec::new());

    assert!(matches!(result, Err(DmError::ShapeError(3))));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_empty_array_rejected() {
    let (pipeline, written) = mock_pipeline(false);
    let empty = InputArray::from(Array2::<u8>::zeros((0, 5)));

    let result = pipeline.convert(empty, None, &mut Vec::new());

    assert!(matches!(result, Err(DmError::EmptyArray { rows: 0, cols: 5 })));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_unsupported_version_rejected_up_front() {
    let writer = MockWriter {
        should_fail: false,
        written: Arc::default(),
    };
    let config = WriteConfig::builder().version(4).build();
    assert!(matches!(
        Dm3Pipeline::with_custom(writer, config),
        Err(DmError::UnsupportedVersion(4))
    ));
}

#[test]
fn test_convert_with_timings_records_steps() {
    let (pipeline, _) = mock_pipeline(false);
    let timings = pipeline
        .convert_with_timings(ramp_4x4(), None, &mut Vec::new())
        .unwrap();
    assert!(timings.get_step("coerce").is_some());
    assert!(timings.get_step("render").is_some());
}

#[test]
fn test_convert_file_writes_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dm3");
    std::fs::write(&path, vec![0u8; 4096]).unwrap();

    let (pipeline, _) = mock_pipeline(false);
    let (outcome, timings) = pipeline
        .convert_file_with_timings(ramp_4x4(), None, &path)
        .unwrap();

    assert_eq!(outcome, WriteOutcome::Written { bytes: 3 });
    assert_eq!(std::fs::read(&path).unwrap(), b"DM3");
    assert!(timings.get_step("write_output").is_some());
}

#[test]
fn test_convert_file_skips_existing_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dm3");
    std::fs::write(&path, b"old").unwrap();

    let written = Arc::new(Mutex::new(Vec::new()));
    let writer = MockWriter {
        should_fail: false,
        written: written.clone(),
    };
    let config = WriteConfig::builder().overwrite(false).build();
    let pipeline = Dm3Pipeline::with_custom(writer, config).unwrap();

    let outcome = pipeline.convert_file(ramp_4x4(), None, &path).unwrap();

    assert_eq!(outcome, WriteOutcome::Skipped);
    assert_eq!(std::fs::read(&path).unwrap(), b"old");
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_failed_write_leaves_destination_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dm3");
    std::fs::write(&path, b"previous").unwrap();

    let (pipeline, _) = mock_pipeline(true);
    assert!(pipeline.convert_file(ramp_4x4(), None, &path).is_err());

    assert_eq!(std::fs::read(&path).unwrap(), b"previous");
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn test_missing_output_directory_is_output_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.dm3");

    let (pipeline, _) = mock_pipeline(false);
    let err = pipeline.convert_file(ramp_4x4(), None, &path).unwrap_err();

    assert!(matches!(err, DmError::OutputWriteError(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_template_pipeline_round_trip() {
    let writer = TemplateDm3Writer::new(reference_template());
    let pipeline = Dm3Pipeline::with_custom(writer, WriteConfig::default()).unwrap();
    let calibration = CalibrationSpec::new(
        AxisCalibration::new(0.5, 0.0),
        AxisCalibration::new(0.5, 0.0),
    );

    let bytes = pipeline.render(ramp_4x4(), Some(calibration)).unwrap();
    let fields = inspect(&bytes, &OffsetMap::REFERENCE_DM3).unwrap();

    assert_eq!(fields.kind(), Some(ElementKind::I32));
    assert_eq!(fields.element_count, 16);
    assert_eq!((fields.cols, fields.rows, fields.pixel_depth), (4, 4, 4));
    assert!(fields.is_consistent());
}

#[test]
fn test_pipelines_share_one_template_across_threads() {
    let writer = TemplateDm3Writer::new(small_template());
    let expected = writer
        .render(
            &PixelArray::U8(Array2::from_elem((3, 3), 7)),
            &CalibrationSpec::default(),
        )
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let writer = writer.clone();
            std::thread::spawn(move || {
                writer
                    .render(
                        &PixelArray::U8(Array2::from_elem((3, 3), 7)),
                        &CalibrationSpec::default(),
                    )
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_write_container_checks_version_before_anything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.dm3");

    let err = write_container(&path, Array2::<f32>::zeros((2, 2)), None, None, 4).unwrap_err();

    assert!(matches!(err, DmError::UnsupportedVersion(4)));
    assert!(err.is_caller_error());
    assert!(!path.exists());
}

#[test]
fn test_write_container_checks_shape_before_anything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.dm3");

    let cube = ArrayD::<f32>::zeros(IxDyn(&[2, 2, 2]));
    let err = write_container(&path, cube, None, None, 3).unwrap_err();

    assert!(matches!(err, DmError::ShapeError(3)));
    assert!(!path.exists());
}

#[cfg(unix)]
fn mode(path: &std::path::Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[cfg(unix)]
#[test]
fn test_new_output_gets_default_file_mode() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("plain.bin");
    std::fs::write(&reference, b"x").unwrap();
    let path = dir.path().join("fresh.dm3");

    let (pipeline, _) = mock_pipeline(false);
    pipeline.convert_file(ramp_4x4(), None, &path).unwrap();

    assert_eq!(mode(&path), mode(&reference));
}

#[cfg(unix)]
#[test]
fn test_overwrite_keeps_existing_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dm3");
    std::fs::write(&path, b"old").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

    let (pipeline, _) = mock_pipeline(false);
    pipeline.convert_file(ramp_4x4(), None, &path).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"DM3");
    assert_eq!(mode(&path), 0o640);
}

#[test]
fn test_atomic_write_without_overwrite_never_replaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dm3");
    std::fs::write(&path, b"arrived first").unwrap();

    let outcome = write_atomically(&path, b"DM3", false).unwrap();

    assert_eq!(outcome, WriteOutcome::Skipped);
    assert_eq!(std::fs::read(&path).unwrap(), b"arrived first");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_atomic_write_without_overwrite_creates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.dm3");

    let outcome = write_atomically(&path, b"DM3", false).unwrap();

    assert_eq!(outcome, WriteOutcome::Written { bytes: 3 });
    assert_eq!(std::fs::read(&path).unwrap(), b"DM3");
}
