//! FFmpeg decoder backend integration tests.
//!
//! Fixture-based tests require files from `tests/fixtures/generate_fixtures.sh`
//! and return early when they are missing.

use std::{fs, path::Path};

use frameshard::{
    FfmpegBackend, FrameOutputOptions, FrameShardError, InputFileSet, PixelFormat,
    SampleRatePolicy, VideoHandle, VideoOutcome, Worker, WorkerIdentity, WorkerOptions,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_audio_only_path() -> &'static str {
    "tests/fixtures/sample_audio_only.mp4"
}

fn sample_truncated_path() -> &'static str {
    "tests/fixtures/sample_truncated.mp4"
}

fn open(path: impl AsRef<Path>) -> Result<VideoHandle, FrameShardError> {
    VideoHandle::open(&FfmpegBackend::new(), path, &FrameOutputOptions::default())
}

// ── unreadable inputs ──────────────────────────────────────────────

#[test]
fn zero_byte_file_is_unreadable() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("empty.mp4");
    fs::write(&path, b"").expect("Failed to write file");

    let result = open(&path);
    assert!(matches!(result, Err(FrameShardError::UnreadableVideo { .. })));
}

#[test]
fn garbage_file_is_unreadable() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = directory.path().join("invalid.mp4");
    fs::write(&path, b"this is not a media file").expect("Failed to write file");

    let error = open(&path).unwrap_err();
    assert!(!error.is_fatal());
    assert!(
        error.to_string().contains("Unreadable video"),
        "Error message should mention the unreadable video: {error}",
    );
}

#[test]
fn missing_file_is_unreadable() {
    let result = open("this_file_does_not_exist.mp4");
    assert!(matches!(result, Err(FrameShardError::UnreadableVideo { .. })));
}

#[test]
fn audio_only_file_is_unreadable() {
    let path = sample_audio_only_path();
    if !Path::new(path).exists() {
        return;
    }

    let error = open(path).unwrap_err();
    assert!(
        error.to_string().contains("no video stream"),
        "Error should mention the missing video stream: {error}",
    );
}

// ── decoding ───────────────────────────────────────────────────────

#[test]
fn decodes_every_frame_in_order() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut handle = open(path).expect("Failed to open fixture");
    assert!((handle.native_frame_rate() - 30.0).abs() < 0.01);

    let mut expected = 0;
    while let Some(frame) = handle.next_frame().expect("Decode error") {
        assert_eq!(frame.native_index, expected);
        assert_eq!((frame.image.width(), frame.image.height()), (160, 120));
        expected += 1;
    }
    assert_eq!(expected, 60);
    assert_eq!(handle.frames_delivered(), 60);

    // Exhausted handles stay exhausted.
    assert!(handle.next_frame().expect("no error after end").is_none());
}

#[test]
fn output_options_apply_to_decoded_frames() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let output = FrameOutputOptions {
        pixel_format: PixelFormat::Gray8,
        width: Some(80),
        ..FrameOutputOptions::default()
    };
    let mut handle =
        VideoHandle::open(&FfmpegBackend::new(), path, &output).expect("Failed to open fixture");
    let frame = handle
        .next_frame()
        .expect("Decode error")
        .expect("at least one frame");

    assert!(matches!(frame.image, image::DynamicImage::ImageLuma8(_)));
    assert_eq!((frame.image.width(), frame.image.height()), (80, 60));
}

#[test]
fn truncated_file_is_never_fatal() {
    let path = sample_truncated_path();
    if !Path::new(path).exists() {
        return;
    }

    // Depending on where the cut lands the file is either unreadable or
    // decodes partially; either way the handle reports rather than panics.
    if let Ok(mut handle) = open(path) {
        let mut delivered = 0;
        while let Ok(Some(_)) = handle.next_frame() {
            delivered += 1;
        }
        assert!(delivered <= 60);
    }
}

// ── end to end ─────────────────────────────────────────────────────

#[test]
fn worker_skips_bad_files_and_extracts_good_ones() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let input_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output_dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(input_dir.path().join("a_broken.mp4"), b"").expect("Failed to write file");
    fs::copy(path, input_dir.path().join("b_sample.mp4")).expect("Failed to copy fixture");

    let input = InputFileSet::from_directory(input_dir.path(), &[]).expect("Failed to list");
    let options = WorkerOptions::new()
        .with_policy(SampleRatePolicy::from_frames_per_second(10.0).expect("valid rate"));
    let report = Worker::new(WorkerIdentity::single(), output_dir.path(), options)
        .expect("worker")
        .run(&input, &FfmpegBackend::new())
        .expect("run should not fail");

    assert_eq!(
        report.get(Path::new("a_broken.mp4")).unwrap().outcome,
        VideoOutcome::Failure
    );
    let sample = report.get(Path::new("b_sample.mp4")).unwrap();
    assert_eq!(sample.outcome, VideoOutcome::Success);
    assert_eq!(sample.frames_decoded, 60);
    assert_eq!(sample.frames_written, 20);
    assert!(output_dir
        .path()
        .join("b_sample.mp4/frame_00000057.png")
        .exists());
}
