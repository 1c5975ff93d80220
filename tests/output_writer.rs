//! Output naming and frame writing tests.

use std::{collections::HashSet, fs, path::Path};

use frameshard::{FrameShardError, ImageFormat, InputFileSet, OutputLayout};
use image::{DynamicImage, RgbImage, RgbaImage};

fn test_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(8, 6, |x, y| {
        image::Rgb([(x * 30) as u8, (y * 40) as u8, 128])
    }))
}

// ── naming ─────────────────────────────────────────────────────────

#[test]
fn frame_paths_follow_the_layout() {
    let layout = OutputLayout::new("/out", ImageFormat::Png);
    assert_eq!(
        layout.frame_path(Path::new("clip.mp4"), 42),
        Path::new("/out/clip.mp4/frame_00000042.png")
    );

    let jpeg = OutputLayout::new("/out", ImageFormat::Jpeg);
    assert_eq!(
        jpeg.relative_path(Path::new("clip.mp4"), 7),
        Path::new("clip.mp4/frame_00000007.jpg")
    );
}

#[test]
fn distinct_frames_never_share_a_path() {
    let layout = OutputLayout::new("/out", ImageFormat::Png);
    let mut seen = HashSet::new();
    for video in ["clip.mp4", "clip.mov", "other.mp4"] {
        for index in 0..200 {
            assert!(seen.insert(layout.frame_path(Path::new(video), index)));
        }
    }
}

#[test]
fn nested_identifiers_keep_their_parents() {
    let input = InputFileSet::new("/in", ["x/a.mp4", "y/a.mp4"]);
    let layout = OutputLayout::new("/out", ImageFormat::Png);

    let paths: HashSet<_> = input
        .files()
        .iter()
        .map(|video| layout.frame_path(video, 0))
        .collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(Path::new("/out/x/a.mp4/frame_00000000.png")));
    assert!(paths.contains(Path::new("/out/y/a.mp4/frame_00000000.png")));
}

#[test]
fn identifiers_cannot_escape_the_output_root() {
    let layout = OutputLayout::new("/out", ImageFormat::Png);
    assert_eq!(
        layout.frame_path(Path::new("/abs/clip.mp4"), 1),
        Path::new("/out/abs/clip.mp4/frame_00000001.png")
    );
    assert_eq!(
        layout.frame_path(Path::new("../clip.mp4"), 1),
        Path::new("/out/clip.mp4/frame_00000001.png")
    );
}

#[test]
fn padded_names_sort_numerically() {
    let layout = OutputLayout::new("/out", ImageFormat::Png);
    let mut names: Vec<String> = [9_u64, 10, 100, 99_999, 1_000_000]
        .iter()
        .map(|&index| {
            layout
                .relative_path(Path::new("v.mp4"), index)
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    let numeric = names.clone();
    names.sort();
    assert_eq!(names, numeric);
}

#[test]
fn image_format_parsing() {
    assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
    assert_eq!("jpeg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
    assert_eq!(".jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
    assert_eq!("tif".parse::<ImageFormat>().unwrap(), ImageFormat::Tiff);
    assert!(matches!(
        "webm".parse::<ImageFormat>(),
        Err(FrameShardError::Configuration(_))
    ));
}

// ── writing ────────────────────────────────────────────────────────

#[test]
fn write_creates_directories_and_decodable_images() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let layout = OutputLayout::new(directory.path(), ImageFormat::Png);

    let record = layout
        .write(Path::new("clip.mp4"), 3, &test_image())
        .expect("Failed to write frame");

    assert_eq!(record.relative_path, Path::new("clip.mp4/frame_00000003.png"));
    let written = directory.path().join(&record.relative_path);
    assert_eq!(fs::metadata(&written).unwrap().len(), record.bytes_written);

    let decoded = image::open(&written).expect("Failed to decode written frame");
    assert_eq!((decoded.width(), decoded.height()), (8, 6));
}

#[test]
fn rewriting_is_idempotent() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let layout = OutputLayout::new(directory.path(), ImageFormat::Png);
    let video = Path::new("clip.mp4");

    let first = layout.write(video, 0, &test_image()).expect("first write");
    let bytes_first = fs::read(directory.path().join(&first.relative_path)).unwrap();
    let second = layout.write(video, 0, &test_image()).expect("second write");
    let bytes_second = fs::read(directory.path().join(&second.relative_path)).unwrap();

    assert_eq!(first, second);
    assert_eq!(bytes_first, bytes_second);
}

#[test]
fn jpeg_drops_alpha() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let layout = OutputLayout::new(directory.path(), ImageFormat::Jpeg);
    let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255])));

    let record = layout
        .write(Path::new("clip.mp4"), 0, &rgba)
        .expect("JPEG write should succeed for RGBA input");
    assert!(record.bytes_written > 0);
}

#[test]
fn unwritable_root_reports_a_write_error() {
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let blocker = directory.path().join("not-a-directory");
    fs::write(&blocker, b"file").expect("Failed to write blocker");

    let layout = OutputLayout::new(&blocker, ImageFormat::Png);
    let result = layout.write(Path::new("clip.mp4"), 0, &test_image());
    match result {
        Err(FrameShardError::Write { path, .. }) => {
            assert_eq!(path, blocker.join("clip.mp4/frame_00000000.png"));
        }
        other => panic!("expected write error, got {other:?}"),
    }
}
