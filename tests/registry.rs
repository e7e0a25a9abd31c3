//! Stream index registry and gap tracker tests.

use vtranscode::{GapTracker, MediaKind, StreamEntry, StreamRegistry, TranscodeError};

// ── Registration ───────────────────────────────────────────────────

#[test]
fn new_registry_is_empty() {
    let registry = StreamRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.sink_stream_count(), 0);
}

#[test]
fn sink_indices_are_dense_for_video_and_audio() {
    let mut registry = StreamRegistry::new();
    assert_eq!(registry.register_stream(0, MediaKind::Video).unwrap(), 0);
    assert_eq!(registry.register_stream(1, MediaKind::Audio).unwrap(), 1);
    assert_eq!(registry.register_stream(2, MediaKind::Audio).unwrap(), 2);
    assert_eq!(registry.sink_stream_count(), 3);
}

#[test]
fn other_kind_takes_a_slot_but_no_sink_index() {
    let mut registry = StreamRegistry::new();
    registry.register_stream(0, MediaKind::Video).unwrap();

    let result = registry.register_stream(1, MediaKind::Other);
    assert!(matches!(
        result,
        Err(TranscodeError::UnsupportedStreamKind {
            source_index: 1,
            kind: MediaKind::Other
        })
    ));
    assert!(result.unwrap_err().is_recoverable());

    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.lookup(1),
        Some(StreamEntry {
            kind: MediaKind::Other,
            sink_index: None
        })
    );

    assert_eq!(registry.register_stream(2, MediaKind::Audio).unwrap(), 1);
}

#[test]
fn skipped_source_indices_stay_empty() {
    let mut registry = StreamRegistry::new();
    registry.register_stream(0, MediaKind::Video).unwrap();
    registry.register_stream(3, MediaKind::Audio).unwrap();

    assert_eq!(registry.len(), 4);
    assert_eq!(registry.lookup(1), None);
    assert_eq!(registry.lookup(2), None);
    assert_eq!(registry.lookup(3).unwrap().sink_index, Some(1));

    let registered: Vec<usize> = registry.iter().map(|(index, _)| index).collect();
    assert_eq!(registered, vec![0, 3]);
}

#[test]
fn lookup_returns_registered_kinds() {
    let kinds = [
        MediaKind::Video,
        MediaKind::Audio,
        MediaKind::Other,
        MediaKind::Audio,
        MediaKind::Video,
    ];
    let mut registry = StreamRegistry::new();
    for (index, kind) in kinds.into_iter().enumerate() {
        let _ = registry.register_stream(index, kind);
    }

    let mut last_sink = None;
    for (index, kind) in kinds.into_iter().enumerate() {
        let entry = registry.lookup(index).unwrap();
        assert_eq!(entry.kind, kind);
        if let Some(sink_index) = entry.sink_index {
            let expected = last_sink.map_or(0, |last: u16| last + 1);
            assert_eq!(sink_index, expected, "sink indices must be contiguous");
            last_sink = Some(sink_index);
        }
    }
    assert_eq!(last_sink, Some(3));
}

// ── Contract violations ────────────────────────────────────────────

#[test]
#[should_panic(expected = "registered out of order")]
fn registering_out_of_order_panics() {
    let mut registry = StreamRegistry::new();
    registry.register_stream(2, MediaKind::Video).unwrap();
    let _ = registry.register_stream(1, MediaKind::Audio);
}

#[test]
#[should_panic(expected = "registered out of order")]
fn registering_twice_panics() {
    let mut registry = StreamRegistry::new();
    registry.register_stream(0, MediaKind::Video).unwrap();
    let _ = registry.register_stream(0, MediaKind::Video);
}

#[test]
#[should_panic(expected = "before being registered")]
fn lookup_beyond_range_panics() {
    let mut registry = StreamRegistry::new();
    registry.register_stream(0, MediaKind::Video).unwrap();
    let _ = registry.lookup(1);
}

// ── Gap tracker ────────────────────────────────────────────────────

#[test]
fn gap_tracker_accepts_only_increasing_timestamps() {
    let mut gaps = GapTracker::new();
    assert_eq!(gaps.last_gap(0), None);

    assert!(gaps.advance(0, 1_000));
    assert!(!gaps.advance(0, 1_000));
    assert!(!gaps.advance(0, 500));
    assert!(gaps.advance(0, 2_000));
    assert_eq!(gaps.last_gap(0), Some(2_000));
}

#[test]
fn gap_tracker_is_per_stream() {
    let mut gaps = GapTracker::new();
    assert!(gaps.advance(0, 5_000));
    assert!(gaps.advance(1, 1_000));
    assert_eq!(gaps.last_gap(0), Some(5_000));
    assert_eq!(gaps.last_gap(1), Some(1_000));
}
