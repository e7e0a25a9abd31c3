//! Source-to-sink stream index mapping.
//!
//! Source streams and sink streams live in two index spaces that evolve
//! independently: the source may contain streams that are never encoded,
//! and new source streams can appear mid-file. [`StreamRegistry`] keeps the
//! mapping between them as an append-only arena indexed by source stream
//! index.

use crate::{error::TranscodeError, media_type::MediaKind};

/// Registry record for one source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntry {
    /// Kind the stream was registered with.
    pub kind: MediaKind,
    /// Index of the sink stream receiving its samples. `None` for streams
    /// that are not encoded.
    pub sink_index: Option<u16>,
}

/// Append-only map from source stream index to [`StreamEntry`].
///
/// Slots for source indices that were skipped during registration (streams
/// that were never selected) stay empty.
#[derive(Debug, Clone, Default)]
pub struct StreamRegistry {
    entries: Vec<Option<StreamEntry>>,
    sink_stream_count: u16,
}

impl StreamRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source stream and assign it a sink stream index.
    ///
    /// Video and audio streams get the next dense sink index. Any other
    /// kind occupies its source slot without a sink index and is reported
    /// as [`TranscodeError::UnsupportedStreamKind`], which callers recover
    /// from by excluding the stream.
    ///
    /// # Panics
    ///
    /// Panics if `source_index` is not greater than every index registered
    /// before.
    pub fn register_stream(
        &mut self,
        source_index: usize,
        kind: MediaKind,
    ) -> Result<u16, TranscodeError> {
        assert!(
            source_index >= self.entries.len(),
            "source stream {source_index} registered out of order (registry holds {} slots)",
            self.entries.len()
        );

        self.entries.resize(source_index, None);

        match kind {
            MediaKind::Video | MediaKind::Audio => {
                let sink_index = self.sink_stream_count;
                self.sink_stream_count = sink_index.checked_add(1).ok_or_else(|| {
                    TranscodeError::engine("register stream", "too many output streams")
                })?;
                self.entries.push(Some(StreamEntry {
                    kind,
                    sink_index: Some(sink_index),
                }));
                Ok(sink_index)
            }
            MediaKind::Other => {
                self.entries.push(Some(StreamEntry {
                    kind,
                    sink_index: None,
                }));
                Err(TranscodeError::UnsupportedStreamKind { source_index, kind })
            }
        }
    }

    /// Look up the entry for a source stream.
    ///
    /// Returns `None` for source slots that were skipped during
    /// registration.
    ///
    /// # Panics
    ///
    /// Panics if `source_index` lies beyond the registered range.
    pub fn lookup(&self, source_index: usize) -> Option<StreamEntry> {
        assert!(
            source_index < self.entries.len(),
            "source stream {source_index} looked up before being registered (registry holds {} slots)",
            self.entries.len()
        );
        self.entries[source_index]
    }

    /// Whether `source_index` lies within the registered range.
    pub fn contains(&self, source_index: usize) -> bool {
        source_index < self.entries.len()
    }

    /// Number of source slots, including skipped ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no stream was registered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sink streams assigned so far.
    pub fn sink_stream_count(&self) -> u16 {
        self.sink_stream_count
    }

    /// Iterate over registered entries with their source index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, StreamEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.map(|entry| (index, entry)))
    }
}
