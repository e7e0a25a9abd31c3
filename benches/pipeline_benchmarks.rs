//! Benchmarks for quality estimation, stream registration and whole-file
//! transcoding.
//!
//! Run with: cargo bench
//!
//! The transcoding benchmark requires `tests/fixtures/sample_video.mp4`.

use std::{hint::black_box, path::Path, time::Duration};

use criterion::Criterion;
use vtranscode::{
    FfmpegLogLevel, HardwareAccelerationMode, MediaKind, MediaType, StreamDescriptor,
    StreamRegistry, Subtype, TargetFactor, TranscodeOptions, Transcoder, VideoDetails,
    quality::{audio_target_byte_rate, complexity_from_rate_per_pixel, estimate_complexity},
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn hd_descriptor() -> StreamDescriptor {
    let decoded = MediaType::video(
        Subtype::Nv12,
        VideoDetails {
            width: 1920,
            height: 1080,
            frame_rate: None,
            pixel_aspect_ratio: None,
            progressive: true,
            all_samples_independent: true,
        },
    );
    StreamDescriptor::new(decoded, 8_000_000)
}

fn benchmark_quality_estimation(criterion: &mut Criterion) {
    let descriptor = hd_descriptor();
    let target = TargetFactor::DEFAULT;

    criterion.bench_function("estimate complexity (1080p)", |bencher| {
        bencher.iter(|| estimate_complexity(black_box(&descriptor), black_box(target)));
    });

    criterion.bench_function("complexity sweep (100 targets)", |bencher| {
        bencher.iter(|| {
            (1..=100)
                .map(|step| complexity_from_rate_per_pixel(black_box(0.3), f64::from(step) / 100.0))
                .sum::<u32>()
        });
    });

    criterion.bench_function("audio byte-rate ladder", |bencher| {
        bencher.iter(|| audio_target_byte_rate(black_box(19_000)));
    });
}

fn benchmark_registry(criterion: &mut Criterion) {
    criterion.bench_function("register 64 streams", |bencher| {
        bencher.iter(|| {
            let mut registry = StreamRegistry::new();
            for index in 0..64 {
                let kind = match index % 3 {
                    0 => MediaKind::Video,
                    1 => MediaKind::Audio,
                    _ => MediaKind::Other,
                };
                let _ = registry.register_stream(index * 2, kind);
            }
            registry
        });
    });

    let mut registry = StreamRegistry::new();
    for index in 0..64 {
        let _ = registry.register_stream(index, MediaKind::Audio);
    }
    criterion.bench_function("lookup 64 streams", |bencher| {
        bencher.iter(|| {
            (0..64)
                .filter_map(|index| registry.lookup(black_box(index)))
                .count()
        });
    });
}

fn benchmark_transcode(criterion: &mut Criterion) {
    vtranscode::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let directory = tempfile::tempdir().unwrap();
    let output = directory.path().join("bench.mp4");

    let mut group = criterion.benchmark_group("transcode");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));
    group.bench_function("software h264", |bencher| {
        bencher.iter(|| {
            let options = TranscodeOptions::new()
                .with_hardware_acceleration(HardwareAccelerationMode::Software);
            Transcoder::open(SAMPLE_VIDEO, options)
                .unwrap()
                .run(&output)
                .unwrap()
        });
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_quality_estimation,
    benchmark_registry,
    benchmark_transcode
);
criterion::criterion_main!(benches);
