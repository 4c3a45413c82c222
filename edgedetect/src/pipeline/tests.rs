use ::common::test_utils::test_output_dir;

use super::*;
use crate::common::test_utils::{gradient_gray8, padded_gray8, write_png, CountingBackend};
use crate::filter::{kernels, Axis, FilterFamily};

fn host_context() -> AcceleratorContext {
    AcceleratorContext::with_backend(crate::device::HostBackend::new())
}

// =============================================================================
// Output naming
// =============================================================================

#[test]
fn output_name_inserts_suffix_before_extension() {
    assert_eq!(
        make_output_file_name(Path::new("photo.png")),
        PathBuf::from("photo_edges.png")
    );
    assert_eq!(
        make_output_file_name(Path::new("a.b.png")),
        PathBuf::from("a.b_edges.png")
    );
}

#[test]
fn output_name_without_extension_appends_suffix() {
    assert_eq!(
        make_output_file_name(Path::new("photo")),
        PathBuf::from("photo_edges")
    );
}

#[test]
fn output_name_ignores_dots_in_directories() {
    assert_eq!(
        make_output_file_name(Path::new("data.v2/photo")),
        PathBuf::from("data.v2/photo_edges")
    );
    assert_eq!(
        make_output_file_name(Path::new("data.v2/scan.tif")),
        PathBuf::from("data.v2/scan_edges.tif")
    );
}

#[test]
fn output_name_keeps_leading_and_trailing_dots() {
    assert_eq!(
        make_output_file_name(Path::new(".png")),
        PathBuf::from("_edges.png")
    );
    assert_eq!(
        make_output_file_name(Path::new("scan.")),
        PathBuf::from("scan_edges.")
    );
}

#[cfg(unix)]
#[test]
fn output_name_keeps_non_unicode_bytes() {
    use std::os::unix::ffi::OsStrExt;

    let input = Path::new(std::ffi::OsStr::from_bytes(b"dir/caf\xE9.png"));
    assert_eq!(
        make_output_file_name(input).as_os_str().as_bytes(),
        b"dir/caf\xE9_edges.png"
    );
}

// =============================================================================
// Processing
// =============================================================================

#[test]
fn process_writes_auto_named_output_with_same_extent() {
    let dir = test_output_dir("pipeline_auto_name");
    let input = dir.join("ramp.png");
    write_png(&input, &gradient_gray8(9, 6));

    let context = host_context();
    let pipeline = Pipeline::new(&context, FilterRequest::default(), false);
    let output = pipeline.process_image(&input, None).unwrap();

    assert_eq!(output, dir.join("ramp_edges.png"));
    let result = PixelBuffer::read_file(&output).unwrap();
    assert_eq!(result.desc().width, 9);
    assert_eq!(result.desc().height, 6);
}

#[test]
fn process_matches_reference_for_padded_input() {
    let dir = test_output_dir("pipeline_reference");
    let input = dir.join("padded.png");
    let source = padded_gray8(5, 4, 8);
    write_png(&input, &source);

    let context = host_context();
    let request = FilterRequest::new(FilterFamily::Prewitt, Axis::Vertical);
    let pipeline = Pipeline::new(&context, request, false);
    let output = pipeline
        .process_image(&input, Some(&dir.join("out.png")))
        .unwrap();

    let mut expected = vec![0u8; 5 * 4];
    let (op, _) = select_operation(request);
    kernels::apply(op, source.bytes(), 8, &mut expected, 5, 5, 4);

    let result = PixelBuffer::read_file(&output).unwrap();
    for y in 0..4u32 {
        assert_eq!(result.row(y), &expected[y as usize * 5..(y as usize + 1) * 5]);
    }
}

#[test]
fn scharr_to_tiff_keeps_signed_samples() {
    let dir = test_output_dir("pipeline_scharr_tiff");
    let input = dir.join("ramp.png");
    write_png(&input, &gradient_gray8(6, 6));

    let context = host_context();
    let request = FilterRequest::new(FilterFamily::Scharr, Axis::Vertical);
    let pipeline = Pipeline::new(&context, request, true);
    let output = pipeline
        .process_image(&input, Some(&dir.join("scharr.tif")))
        .unwrap();

    let file = std::fs::File::open(&output).unwrap();
    let mut decoder = ::tiff::decoder::Decoder::new(file).unwrap();
    assert_eq!(decoder.dimensions().unwrap(), (6, 6));
    assert!(matches!(
        decoder.read_image().unwrap(),
        ::tiff::decoder::DecodingResult::I16(_)
    ));
}

#[test]
fn one_pixel_image_is_processed() {
    let dir = test_output_dir("pipeline_one_pixel");
    let input = dir.join("dot.png");
    write_png(&input, &PixelBuffer::from_gray8(1, 1, vec![77]).unwrap());

    let context = host_context();
    for family in [
        FilterFamily::Scharr,
        FilterFamily::Sobel,
        FilterFamily::Prewitt,
        FilterFamily::Roberts,
    ] {
        for axis in [Axis::Horizontal, Axis::Vertical] {
            let pipeline = Pipeline::new(&context, FilterRequest::new(family, axis), false);
            let output = pipeline
                .process_image(&input, Some(&dir.join("dot_out.png")))
                .unwrap();
            let result = PixelBuffer::read_file(&output).unwrap();
            assert_eq!(result.desc().width, 1);
            assert_eq!(result.desc().height, 1);
            assert_eq!(result.sample(0, 0), 0);
        }
    }
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn missing_input_fails_before_touching_the_device() {
    let (backend, counters) = CountingBackend::new(None);
    let context = AcceleratorContext::with_backend(backend);
    let pipeline = Pipeline::new(&context, FilterRequest::default(), false);

    let result = pipeline.process_image(Path::new("/nonexistent/in.png"), None);
    assert!(matches!(result, Err(Error::Decode { .. })));
    assert_eq!(counters.allocations(), 0);
}

#[test]
fn encode_failure_is_reported_after_releasing_buffers() {
    let dir = test_output_dir("pipeline_encode_failure");
    let input = dir.join("ramp.png");
    write_png(&input, &gradient_gray8(4, 4));

    let (backend, counters) = CountingBackend::new(None);
    let context = AcceleratorContext::with_backend(backend);
    let pipeline = Pipeline::new(&context, FilterRequest::default(), true);

    let result = pipeline.process_image(&input, Some(&dir.join("out.unknown")));
    assert!(matches!(result, Err(Error::Encode { .. })));
    assert_eq!(counters.allocations(), 2);
    assert_eq!(counters.releases(), 2);
}
