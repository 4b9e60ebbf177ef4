#[allow(dead_code)]
mod common;

use czi_stitcher_core::consts::{CZI_AUTOSTITCH_OPTION, STACK_FILENAME};
use czi_stitcher_core::error::StitcherError;
use czi_stitcher_core::io::{FormatEngine, ReaderOptions};
use czi_stitcher_core::pipeline::{normalize, NoOpReporter};

use common::{
    read_all_planes, read_u16, sample_value, write_acquisition, write_rgb_preview, CountingFormat,
    CHANNELS, TILES_X, TILES_Y,
};

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

#[test]
fn test_normalize_copies_series_and_planes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.czi");
    let output = dir.path().join(STACK_FILENAME);
    write_acquisition(&input, 16);

    let format = CountingFormat::default();
    let result = normalize(&format, &input, &output, (2048, 2048), &NoOpReporter).unwrap();
    assert_eq!(result, output);

    let stack = read_all_planes(&output);
    assert_eq!(stack.len(), (TILES_X * TILES_Y) as usize);
    for (series, planes) in stack.iter().enumerate() {
        assert_eq!(planes.len(), CHANNELS as usize);
        for (channel, plane) in planes.iter().enumerate() {
            assert_eq!(plane.len(), 16 * 16 * 2);
            assert_eq!(read_u16(plane, 0), sample_value(series, channel, 0));
            assert_eq!(read_u16(plane, 200), sample_value(series, channel, 200));
        }
    }
    assert_eq!(read_all_planes(&input), stack);
}

#[test]
fn test_normalize_disables_autostitch() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.czi");
    write_acquisition(&input, 8);

    let format = CountingFormat::default();
    normalize(&format, &input, &dir.path().join(STACK_FILENAME), (64, 64), &NoOpReporter).unwrap();

    let opened = format.opened.lock().unwrap();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].1.get(CZI_AUTOSTITCH_OPTION), Some("false"));
}

#[test]
fn test_normalize_keeps_acquisition_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.czi");
    let output = dir.path().join(STACK_FILENAME);
    write_acquisition(&input, 8);

    normalize(&CountingFormat::default(), &input, &output, (8, 8), &NoOpReporter).unwrap();

    let format = CountingFormat::default();
    let reader = format.open(&output, &ReaderOptions::default()).unwrap();
    let metadata = reader.metadata();
    assert_eq!(metadata.image_count(), 4);
    assert_eq!(metadata.filter_set_count(), 3);
    assert_eq!(metadata.image_name(0), Some("sample.czi #1"));
}

#[test]
fn test_normalize_copies_interleaved_rgb_series() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("preview.ome.tif");
    let output = dir.path().join(STACK_FILENAME);
    let bytes = write_rgb_preview(&input, 8, 6);

    normalize(&CountingFormat::default(), &input, &output, (2048, 2048), &NoOpReporter).unwrap();

    let stack = read_all_planes(&output);
    assert_eq!(stack, vec![vec![bytes]]);
    let reader = CountingFormat::default()
        .open(&output, &ReaderOptions::default())
        .unwrap();
    assert_eq!(reader.samples_per_pixel(), 3);
}

// ---------------------------------------------------------------------------
// Caching and errors
// ---------------------------------------------------------------------------

#[test]
fn test_normalize_existing_output_skips_reader() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.czi");
    let output = dir.path().join(STACK_FILENAME);
    write_acquisition(&input, 8);
    std::fs::write(&output, b"not really a stack").unwrap();

    let format = CountingFormat::default();
    let result = normalize(&format, &input, &output, (8, 8), &NoOpReporter).unwrap();

    assert_eq!(result, output);
    assert_eq!(format.open_count(), 0);
    assert_eq!(format.create_count(), 0);
    assert_eq!(std::fs::read(&output).unwrap(), b"not really a stack");
}

#[test]
fn test_normalize_second_run_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.czi");
    let output = dir.path().join(STACK_FILENAME);
    write_acquisition(&input, 8);

    let format = CountingFormat::default();
    normalize(&format, &input, &output, (8, 8), &NoOpReporter).unwrap();
    normalize(&format, &input, &output, (8, 8), &NoOpReporter).unwrap();

    assert_eq!(format.open_count(), 1);
    assert_eq!(format.create_count(), 1);
}

#[test]
fn test_normalize_missing_input_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.czi");
    let output = dir.path().join(STACK_FILENAME);

    let format = CountingFormat::default();
    let err = normalize(&format, &input, &output, (8, 8), &NoOpReporter).unwrap_err();

    assert!(matches!(err, StitcherError::NotFound(ref p) if *p == input));
    assert!(!output.exists());
    assert_eq!(format.create_count(), 0);
}

#[test]
fn test_normalize_unreadable_input_leaves_no_stack() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.czi");
    let output = dir.path().join(STACK_FILENAME);
    std::fs::write(&input, b"this is not an image").unwrap();

    let err = normalize(&CountingFormat::default(), &input, &output, (8, 8), &NoOpReporter).unwrap_err();

    assert!(matches!(err, StitcherError::FormatRead { .. }));
    assert!(!output.exists());
}
