//! Pipeline driver tests.
//!
//! A scripted reader replays read results and a recording writer captures
//! what reaches the encoders, so every scenario is deterministic.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{RecordingWriter, ScriptedReader, Step, WriterCall, aac, h264, subtitles};
use vtranscode::{
    AsyncSampleSource, EncodingSink, MediaKind, NoOpProgress, Pipeline, PipelineState,
    ProgressCallback, ProgressInfo, ReadFlags, ReadResult, TargetFactor, TranscodeError,
    VideoCodec,
};

fn pipeline(reader: ScriptedReader) -> Pipeline<ScriptedReader, RecordingWriter> {
    pipeline_with_progress(reader, Arc::new(NoOpProgress))
}

fn pipeline_with_progress(
    reader: ScriptedReader,
    progress: Arc<dyn ProgressCallback>,
) -> Pipeline<ScriptedReader, RecordingWriter> {
    let source = AsyncSampleSource::new(reader).unwrap();
    let sink = EncodingSink::new(
        RecordingWriter::new(),
        TargetFactor::new(0.5).unwrap(),
        VideoCodec::H264,
    );
    Pipeline::new(source, sink, progress)
}

fn av_reader() -> ScriptedReader {
    ScriptedReader::new(vec![h264(1280, 720, Some(4_000_000)), aac(48_000, 2, 16_000)])
}

#[derive(Default)]
struct RecordingProgress {
    reports: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.reports.lock().unwrap().push(info.clone());
    }
}

// ── Termination ────────────────────────────────────────────────────

#[test]
fn runs_until_end_of_stream() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then_read(ReadResult::sample(1, 0, 1))
        .then_read(ReadResult::sample(0, 33_333, 2))
        .then_read(ReadResult::sample(1, 21_333, 3).with_flags(ReadFlags::END_OF_STREAM))
        .then_read(ReadResult::sample(0, 66_666, 99));
    let mut pipeline = pipeline(reader);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let summary = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), PipelineState::Finished);
    assert_eq!(summary.output_streams, 2);
    assert_eq!(summary.samples_written, 4);
    assert_eq!(summary.reads, 4);
    assert!(!summary.hardware_accelerated);

    let (source, sink) = pipeline.into_parts();
    assert_eq!(source.requests_issued(), source.results_consumed());
    assert!(!source.is_request_in_flight());

    let writer = sink.into_writer();
    assert_eq!(writer.samples(), vec![(0, 0), (1, 1), (0, 2), (1, 3)]);
    assert_eq!(writer.finalize_count(), 1);
    assert_eq!(writer.calls.last(), Some(&WriterCall::Finalize));
}

#[test]
fn pure_end_of_stream_read_finishes() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 40_000));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.samples_written, 1);
    assert_eq!(summary.reads, 2);
}

#[test]
fn threaded_completions_match_requests() {
    let mut reader = av_reader().threaded();
    for index in 0..30_i64 {
        reader = reader.then_read(ReadResult::sample((index % 2) as usize, index * 10_000, index));
    }
    let reader = reader.then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 300_000));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.samples_written, 30);
    assert_eq!(summary.reads, 31);

    let (source, sink) = pipeline.into_parts();
    assert_eq!(source.requests_issued(), source.results_consumed());
    let samples: Vec<i64> = sink.writer().samples().iter().map(|(_, sample)| *sample).collect();
    assert_eq!(samples, (0..30).collect::<Vec<_>>());
}

#[test]
#[should_panic(expected = "only be run once")]
fn running_twice_panics() {
    let mut pipeline = pipeline(av_reader());
    pipeline.run().unwrap();
    let _ = pipeline.run();
}

// ── Stream discovery ───────────────────────────────────────────────

#[test]
fn new_stream_is_added_before_its_first_sample() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then(Step::Reveal(aac(44_100, 1, 12_000)))
        .then_read(ReadResult::sample(2, 10_000, 1).with_flags(ReadFlags::NEW_STREAM))
        .then_read(ReadResult::sample(2, 20_000, 2))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 30_000));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.output_streams, 3);
    assert_eq!(summary.streams_discovered, 1);

    let entry = pipeline.sink().entry(2).unwrap();
    assert_eq!(entry.kind, MediaKind::Audio);
    assert_eq!(entry.sink_index, Some(2));

    let calls = &pipeline.sink().writer().calls;
    let third_stream = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| matches!(call, WriterCall::AddStream(_)))
        .nth(2)
        .map(|(position, _)| position)
        .unwrap();
    let first_sample = calls
        .iter()
        .position(|call| matches!(call, WriterCall::Sample(2, _)))
        .unwrap();
    assert!(third_stream < first_sample);
    assert_eq!(
        pipeline.sink().writer().samples(),
        vec![(0, 0), (2, 1), (2, 2)]
    );
}

#[test]
fn excluded_streams_never_reach_the_writer() {
    let reader = ScriptedReader::new(vec![
        h264(640, 480, Some(1_000_000)),
        subtitles(),
        aac(48_000, 2, 16_000),
    ])
    .then_read(ReadResult::sample(1, 0, 100))
    .then_read(ReadResult::sample(2, 0, 1))
    .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 0));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.output_streams, 2);
    assert_eq!(summary.samples_written, 2);
    assert_eq!(pipeline.sink().writer().samples(), vec![(1, 1)]);
}

#[test]
fn late_unsupported_stream_is_deselected() {
    let reader = av_reader()
        .then(Step::Reveal(subtitles()))
        .then_read(ReadResult::event(2, ReadFlags::NEW_STREAM, 0))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 0));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.output_streams, 2);
    assert_eq!(summary.streams_discovered, 0);
    assert_eq!(pipeline.source().excluded_streams().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn native_format_change_refreshes_descriptors() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then(Step::ChangeNative(0, h264(1920, 1080, Some(4_000_000))))
        .then_read(
            ReadResult::sample(0, 33_333, 1).with_flags(ReadFlags::NATIVE_TYPE_CHANGED),
        )
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 66_666));
    let mut pipeline = pipeline(reader);
    let before = pipeline.sink().descriptor(0).cloned();
    assert_eq!(before, None);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.format_changes, 1);
    assert_eq!(summary.output_streams, 2);

    let video = pipeline.sink().descriptor(0).unwrap();
    let details = video.decoded_type.video_details().unwrap();
    assert_eq!((details.width, details.height), (1920, 1080));
    assert_eq!(pipeline.sink().descriptor(1).unwrap().kind, MediaKind::Audio);

    let writer = pipeline.sink().writer();
    assert_eq!(writer.stream_settings().len(), 2);
    assert_eq!(writer.samples(), vec![(0, 0), (0, 1)]);
}

#[test]
fn unchanged_formats_are_not_counted() {
    let reader = av_reader()
        .then_read(ReadResult::sample(1, 0, 0).with_flags(ReadFlags::NATIVE_TYPE_CHANGED))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 10_000));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.format_changes, 0);
}

// ── Gaps ───────────────────────────────────────────────────────────

#[test]
fn gaps_are_forwarded_once_and_in_order() {
    let reader = av_reader()
        .then_read(ReadResult::sample(1, 0, 0))
        .then_read(ReadResult::event(1, ReadFlags::GAP, 2_000_000))
        .then_read(ReadResult::event(1, ReadFlags::GAP, 2_000_000))
        .then_read(ReadResult::event(1, ReadFlags::GAP, 1_000_000))
        .then_read(ReadResult::sample(1, 2_500_000, 1))
        .then_read(ReadResult::event(1, ReadFlags::GAP | ReadFlags::END_OF_STREAM, 4_000_000));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.gaps_placed, 2);

    let writer = pipeline.sink().writer();
    assert_eq!(writer.gaps(), vec![(1, 2_000_000), (1, 4_000_000)]);
    let gap_position = writer
        .calls
        .iter()
        .position(|call| *call == WriterCall::Gap(1, 4_000_000))
        .unwrap();
    let finalize_position = writer
        .calls
        .iter()
        .position(|call| *call == WriterCall::Finalize)
        .unwrap();
    assert!(gap_position < finalize_position);
}

#[test]
fn gap_and_new_stream_on_one_read_are_both_handled() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then(Step::Reveal(aac(48_000, 2, 16_000)))
        .then_read(
            ReadResult::event(0, ReadFlags::GAP, 1_500_000).with_flags(ReadFlags::NEW_STREAM),
        )
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 2_000_000));
    let mut pipeline = pipeline(reader);

    let summary = pipeline.run().unwrap();
    assert_eq!(summary.gaps_placed, 1);
    assert_eq!(summary.streams_discovered, 1);
    assert_eq!(summary.output_streams, 3);
}

// ── Failures ───────────────────────────────────────────────────────

#[test]
fn read_error_fails_the_session() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then_read(ReadResult::failure(1, "decoder reported corrupt data"));
    let mut pipeline = pipeline(reader);

    let error = pipeline.run().unwrap_err();
    assert!(matches!(error, TranscodeError::Engine { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(pipeline.sink().writer().finalize_count(), 0);
}

#[test]
fn writer_error_fails_the_session() {
    let reader = av_reader()
        .then_read(ReadResult::sample(0, 0, 0))
        .then_read(ReadResult::sample(0, 33_333, 13))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 66_666));
    let source = AsyncSampleSource::new(reader).unwrap();
    let mut writer = RecordingWriter::new();
    writer.fail_write_at = Some(13);
    let sink = EncodingSink::new(writer, TargetFactor::DEFAULT, VideoCodec::H264);
    let mut pipeline = Pipeline::new(source, sink, Arc::new(NoOpProgress));

    let error = pipeline.run().unwrap_err();
    assert!(error.to_string().contains("write sample"));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

// ── Progress ───────────────────────────────────────────────────────

#[test]
fn progress_reports_on_percent_changes_and_finishes() {
    let reader = av_reader()
        .with_duration(Some(Duration::from_secs(1)))
        .then_read(ReadResult::sample(0, 0, 0))
        .then_read(ReadResult::sample(0, 250_000, 1))
        .then_read(ReadResult::sample(1, 251_000, 2))
        .then_read(ReadResult::sample(0, 500_000, 3))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 1_000_000));
    let progress = Arc::new(RecordingProgress::default());
    let mut pipeline = pipeline_with_progress(reader, progress.clone());

    pipeline.run().unwrap();

    let reports = progress.reports.lock().unwrap();
    let percents: Vec<u32> = reports.iter().map(|report| report.percent).collect();
    assert_eq!(percents, vec![0, 25, 50, 100, 100]);
    assert!(reports.last().unwrap().finished);
    assert_eq!(reports.last().unwrap().steps, 40);
    assert_eq!(reports[2].steps, 20);
}

#[test]
fn unknown_duration_reports_only_the_final_summary() {
    let reader = av_reader()
        .with_duration(None)
        .then_read(ReadResult::sample(0, 0, 0))
        .then_read(ReadResult::event(0, ReadFlags::END_OF_STREAM, 40_000));
    let progress = Arc::new(RecordingProgress::default());
    let mut pipeline = pipeline_with_progress(reader, progress.clone());

    pipeline.run().unwrap();

    let reports = progress.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].finished);
}
