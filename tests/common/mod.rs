//! In-memory engine doubles shared by the integration tests.
//!
//! [`ScriptedReader`] replays a fixed list of read results and
//! [`RecordingWriter`] records every call it receives. Samples are plain
//! timestamps so tests can follow them through the pipeline.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use vtranscode::{
    AudioDetails, CompletionSink, EncoderSettings, MediaReader, MediaType, MediaWriter,
    ReadFlags, ReadResult, Subtype, TranscodeError, VideoDetails, media_type::Ratio,
};

/// Sample type exchanged by the doubles: the sample's timestamp.
pub type TestSample = i64;

/// One step of a [`ScriptedReader`] script.
pub enum Step {
    /// Make a new stream visible to `native_type` queries.
    Reveal(MediaType),
    /// Replace the native type of an existing stream.
    ChangeNative(usize, MediaType),
    /// Complete the current read with this result.
    Read(ReadResult<TestSample>),
}

/// A stream known to the reader.
#[derive(Debug, Clone)]
pub struct FakeStream {
    pub native: MediaType,
    pub selected: bool,
    pub decode_type: Option<MediaType>,
}

/// Scripted decode engine.
pub struct ScriptedReader {
    pub streams: Vec<FakeStream>,
    pub script: VecDeque<Step>,
    pub calls: Vec<String>,
    pub duration: Option<Duration>,
    pub file_size: Option<u64>,
    pub threaded: bool,
}

impl ScriptedReader {
    pub fn new(natives: Vec<MediaType>) -> Self {
        Self {
            streams: natives
                .into_iter()
                .map(|native| FakeStream {
                    native,
                    selected: false,
                    decode_type: None,
                })
                .collect(),
            script: VecDeque::new(),
            calls: Vec::new(),
            duration: Some(Duration::from_secs(10)),
            file_size: None,
            threaded: false,
        }
    }

    /// Deliver completions from a freshly spawned thread.
    pub fn threaded(mut self) -> Self {
        self.threaded = true;
        self
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_file_size(mut self, file_size: Option<u64>) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn then(mut self, step: Step) -> Self {
        self.script.push_back(step);
        self
    }

    pub fn then_read(self, result: ReadResult<TestSample>) -> Self {
        self.then(Step::Read(result))
    }

    /// Number of calls whose description starts with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|call| call.starts_with(prefix)).count()
    }

    fn stream(&self, stream_index: usize) -> Result<&FakeStream, TranscodeError> {
        self.streams
            .get(stream_index)
            .ok_or_else(|| TranscodeError::engine("stream", format!("no stream {stream_index}")))
    }
}

impl MediaReader for ScriptedReader {
    type Sample = TestSample;

    fn select_all_streams(&mut self) -> Result<(), TranscodeError> {
        self.calls.push("select_all".to_string());
        for stream in &mut self.streams {
            stream.selected = true;
        }
        Ok(())
    }

    fn deselect_stream(&mut self, stream_index: usize) -> Result<(), TranscodeError> {
        self.calls.push(format!("deselect {stream_index}"));
        if let Some(stream) = self.streams.get_mut(stream_index) {
            stream.selected = false;
        }
        Ok(())
    }

    fn is_selected(&mut self, stream_index: usize) -> Result<bool, TranscodeError> {
        Ok(self.stream(stream_index)?.selected)
    }

    fn native_type(&mut self, stream_index: usize) -> Result<Option<MediaType>, TranscodeError> {
        Ok(self.streams.get(stream_index).map(|stream| stream.native.clone()))
    }

    fn set_decode_type(
        &mut self,
        stream_index: usize,
        media_type: &MediaType,
    ) -> Result<(), TranscodeError> {
        self.calls
            .push(format!("decode {stream_index} {}", media_type.subtype));
        let stream = self
            .streams
            .get_mut(stream_index)
            .ok_or_else(|| TranscodeError::engine("set decode type", "no such stream"))?;
        stream.decode_type = Some(media_type.clone());
        Ok(())
    }

    fn current_type(&mut self, stream_index: usize) -> Result<MediaType, TranscodeError> {
        let stream = self.stream(stream_index)?;
        match &stream.decode_type {
            Some(decoded) => Ok(decoded.clone()),
            None if stream.native.subtype.is_uncompressed() => Ok(stream.native.clone()),
            None => Err(TranscodeError::engine("current type", "decoder not configured")),
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    fn request_sample(
        &mut self,
        completion: CompletionSink<TestSample>,
    ) -> Result<(), TranscodeError> {
        self.calls.push("request".to_string());

        let result = loop {
            match self.script.pop_front() {
                Some(Step::Reveal(native)) => self.streams.push(FakeStream {
                    native,
                    selected: false,
                    decode_type: None,
                }),
                Some(Step::ChangeNative(stream_index, native)) => {
                    if let Some(stream) = self.streams.get_mut(stream_index) {
                        stream.native = native;
                    }
                }
                Some(Step::Read(result)) => break result,
                None => break ReadResult::event(0, ReadFlags::END_OF_STREAM, 0),
            }
        };

        if self.threaded {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(2));
                completion.deliver(result);
            });
        } else {
            completion.deliver(result);
        }
        Ok(())
    }
}

/// Call recorded by [`RecordingWriter`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriterCall {
    AddStream(EncoderSettings),
    Sample(u16, TestSample),
    Gap(u16, i64),
    Finalize,
}

/// Recording encode engine.
#[derive(Default)]
pub struct RecordingWriter {
    pub calls: Vec<WriterCall>,
    pub input_types: Vec<MediaType>,
    pub fail_write_at: Option<TestSample>,
    pub index_offset: u16,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<(u16, TestSample)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::Sample(sink, sample) => Some((*sink, *sample)),
                _ => None,
            })
            .collect()
    }

    pub fn gaps(&self) -> Vec<(u16, i64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::Gap(sink, timestamp) => Some((*sink, *timestamp)),
                _ => None,
            })
            .collect()
    }

    pub fn stream_settings(&self) -> Vec<EncoderSettings> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::AddStream(settings) => Some(settings.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn finalize_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, WriterCall::Finalize))
            .count()
    }
}

impl MediaWriter for RecordingWriter {
    type Sample = TestSample;

    fn add_stream(
        &mut self,
        settings: &EncoderSettings,
        input_type: &MediaType,
    ) -> Result<u16, TranscodeError> {
        let sink_index = self.input_types.len() as u16 + self.index_offset;
        self.calls.push(WriterCall::AddStream(settings.clone()));
        self.input_types.push(input_type.clone());
        Ok(sink_index)
    }

    fn write_sample(&mut self, sink_index: u16, sample: TestSample) -> Result<(), TranscodeError> {
        if self.fail_write_at == Some(sample) {
            return Err(TranscodeError::engine("write sample", "encoder rejected the sample"));
        }
        self.calls.push(WriterCall::Sample(sink_index, sample));
        Ok(())
    }

    fn write_gap(&mut self, sink_index: u16, timestamp: i64) -> Result<(), TranscodeError> {
        self.calls.push(WriterCall::Gap(sink_index, timestamp));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), TranscodeError> {
        self.calls.push(WriterCall::Finalize);
        Ok(())
    }
}

// ── Media type builders ────────────────────────────────────────────

/// Compressed H.264 video with a declared bit rate.
pub fn h264(width: u32, height: u32, bit_rate: Option<u32>) -> MediaType {
    let media_type = MediaType::video(
        Subtype::Encoded("h264".to_string()),
        VideoDetails {
            width,
            height,
            frame_rate: Some(Ratio::new(30, 1)),
            pixel_aspect_ratio: None,
            progressive: false,
            all_samples_independent: false,
        },
    );
    match bit_rate {
        Some(bit_rate) => media_type.with_average_bit_rate(bit_rate),
        None => media_type,
    }
}

/// Compressed AAC audio.
pub fn aac(sample_rate: u32, channels: u16, bytes_per_second: u32) -> MediaType {
    MediaType::audio(
        Subtype::Encoded("aac".to_string()),
        AudioDetails {
            sample_rate,
            channels,
            bits_per_sample: None,
            channel_mask: Some(0x3),
            average_bytes_per_second: Some(bytes_per_second),
            block_alignment: None,
            all_samples_independent: true,
        },
    )
}

/// Uncompressed 16-bit PCM audio.
pub fn pcm(sample_rate: u32, channels: u16) -> MediaType {
    let block_alignment = u32::from(channels) * 2;
    MediaType::audio(
        Subtype::Pcm,
        AudioDetails {
            sample_rate,
            channels,
            bits_per_sample: Some(16),
            channel_mask: None,
            average_bytes_per_second: Some(block_alignment * sample_rate),
            block_alignment: Some(block_alignment),
            all_samples_independent: true,
        },
    )
}

/// A subtitle stream.
pub fn subtitles() -> MediaType {
    MediaType::other("subrip")
}
