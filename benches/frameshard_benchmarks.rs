//! Benchmarks for sharding, sampling, frame output and end-to-end runs.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! End-to-end benchmarks require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{fs, hint::black_box, path::Path};

use criterion::Criterion;
use frameshard::{
    FfmpegBackend, FfmpegLogLevel, FrameSampler, ImageFormat, InputFileSet, OutputLayout,
    SampleRatePolicy, Worker, WorkerIdentity, WorkerOptions, assign, set_ffmpeg_log_level,
};
use image::{DynamicImage, RgbImage};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn synthetic_input(count: usize) -> InputFileSet {
    InputFileSet::new(
        "/videos",
        (0..count).map(|index| format!("video_{index:06}.mp4")),
    )
}

fn benchmark_sharding(criterion: &mut Criterion) {
    let input = synthetic_input(100_000);

    criterion.bench_function("assign 100k videos to 64 workers", |bencher| {
        bencher.iter(|| {
            for ordinal in 0..64 {
                black_box(assign(&input, ordinal, 64).unwrap());
            }
        });
    });

    criterion.bench_function("canonicalise 100k video names", |bencher| {
        bencher.iter(|| black_box(synthetic_input(100_000)));
    });
}

fn benchmark_sampling(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("sampler over 1M frames");

    for (label, policy) in [
        ("every frame", SampleRatePolicy::EveryFrame),
        ("1 fps of 29.97", SampleRatePolicy::Cadence { frames_per_second: 1.0 }),
        ("10 fps of 29.97", SampleRatePolicy::Cadence { frames_per_second: 10.0 }),
    ] {
        group.bench_function(label, |bencher| {
            bencher.iter(|| {
                let mut sampler = FrameSampler::new(policy, 30000.0 / 1001.0).unwrap();
                let emitted = (0..1_000_000_u64)
                    .filter(|&index| sampler.should_emit(index))
                    .count();
                black_box(emitted)
            });
        });
    }

    group.finish();
}

fn benchmark_writing(criterion: &mut Criterion) {
    let directory = tempfile::tempdir().unwrap();
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(640, 360, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }));

    let mut group = criterion.benchmark_group("write 640x360 frame");
    for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Bmp] {
        let layout = OutputLayout::new(directory.path(), format);
        group.bench_function(format.extension(), |bencher| {
            let mut index = 0_u64;
            bencher.iter(|| {
                index += 1;
                black_box(layout.write(Path::new("bench.mp4"), index % 16, &image).unwrap())
            });
        });
    }
    group.finish();
}

fn fixture_input(copies: usize) -> Option<(tempfile::TempDir, InputFileSet)> {
    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return None;
    }
    let directory = tempfile::tempdir().unwrap();
    for copy in 0..copies {
        fs::copy(SAMPLE_VIDEO, directory.path().join(format!("clip_{copy}.mp4"))).unwrap();
    }
    let input = InputFileSet::from_directory(directory.path(), &[]).unwrap();
    Some((directory, input))
}

fn benchmark_worker(criterion: &mut Criterion) {
    set_ffmpeg_log_level(FfmpegLogLevel::Error);
    let Some((_input_dir, input)) = fixture_input(4) else {
        return;
    };
    let output_dir = tempfile::tempdir().unwrap();
    let options = WorkerOptions::new()
        .with_policy(SampleRatePolicy::Cadence { frames_per_second: 1.0 })
        .with_image_format(ImageFormat::Bmp);
    let worker = Worker::new(WorkerIdentity::single(), output_dir.path(), options).unwrap();
    let backend = FfmpegBackend::new();

    criterion.bench_function("worker run (4 videos, 1 fps)", |bencher| {
        bencher.iter(|| black_box(worker.run(&input, &backend).unwrap()));
    });

    #[cfg(feature = "rayon")]
    criterion.bench_function("worker run_parallel (4 videos, 1 fps)", |bencher| {
        bencher.iter(|| black_box(worker.run_parallel(&input, &backend).unwrap()));
    });
}

criterion::criterion_group!(
    benches,
    benchmark_sharding,
    benchmark_sampling,
    benchmark_writing,
    benchmark_worker,
);
criterion::criterion_main!(benches);
