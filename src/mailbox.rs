//! Completion delivery for asynchronous sample reads.
//!
//! A read engine completes each sample request by handing a [`ReadResult`]
//! to a [`CompletionSink`]. The reader side blocks in [`Mailbox::wait`]
//! until that result arrives. The mailbox holds a single slot: at most one
//! read is ever in flight, so a second completion before the first was
//! consumed is a protocol violation. It is logged and turned into a failed
//! result rather than silently dropping either read.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;

bitflags! {
    /// Stream events reported alongside a completed read.
    ///
    /// Several flags may be set on the same read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadFlags: u32 {
        /// The read failed; the session cannot continue.
        const ERROR = 0x0001;
        /// The source has no more samples.
        const END_OF_STREAM = 0x0002;
        /// A stream not reported before appeared in the source.
        const NEW_STREAM = 0x0004;
        /// The native format of one or more source streams changed.
        const NATIVE_TYPE_CHANGED = 0x0010;
        /// The stream's timeline has a gap at the reported timestamp.
        const GAP = 0x0100;
    }
}

/// Outcome of one asynchronous sample read.
#[derive(Debug)]
pub struct ReadResult<S> {
    /// Source stream the read refers to.
    pub stream_index: usize,
    /// Events reported with the read.
    pub flags: ReadFlags,
    /// Timestamp in microseconds.
    pub timestamp: i64,
    /// Decoded sample, absent on pure event reads.
    pub sample: Option<S>,
    /// Engine-reported reason when [`ReadFlags::ERROR`] is set.
    pub error: Option<String>,
}

impl<S> ReadResult<S> {
    /// A read that produced a sample.
    pub fn sample(stream_index: usize, timestamp: i64, sample: S) -> Self {
        Self {
            stream_index,
            flags: ReadFlags::empty(),
            timestamp,
            sample: Some(sample),
            error: None,
        }
    }

    /// A read that only reports events.
    pub fn event(stream_index: usize, flags: ReadFlags, timestamp: i64) -> Self {
        Self {
            stream_index,
            flags,
            timestamp,
            sample: None,
            error: None,
        }
    }

    /// A failed read.
    pub fn failure(stream_index: usize, reason: impl Into<String>) -> Self {
        Self {
            stream_index,
            flags: ReadFlags::ERROR,
            timestamp: 0,
            sample: None,
            error: Some(reason.into()),
        }
    }

    /// Add event flags to the result.
    #[must_use]
    pub fn with_flags(mut self, flags: ReadFlags) -> Self {
        self.flags |= flags;
        self
    }
}

struct Shared<S> {
    slot: Mutex<Option<ReadResult<S>>>,
    available: Condvar,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, Option<ReadResult<S>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end: a one-slot mailbox for read results.
pub struct Mailbox<S> {
    shared: Arc<Shared<S>>,
}

/// Sending end handed to the read engine.
pub struct CompletionSink<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for CompletionSink<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> Default for Mailbox<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Mailbox<S> {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                available: Condvar::new(),
            }),
        }
    }

    /// Get a sink that completes reads into this mailbox.
    pub fn sink(&self) -> CompletionSink<S> {
        CompletionSink {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Block until a result is delivered, then take it.
    pub fn wait(&self) -> ReadResult<S> {
        let mut slot = self.shared.lock();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self
                .shared
                .available
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Take a delivered result without blocking.
    pub fn try_take(&self) -> Option<ReadResult<S>> {
        self.shared.lock().take()
    }
}

impl<S> CompletionSink<S> {
    /// Deliver the result of the outstanding read and wake the waiter.
    pub fn deliver(&self, result: ReadResult<S>) {
        let mut slot = self.shared.lock();
        if let Some(pending) = slot.as_ref() {
            log::error!(
                "Read of stream {} completed while the result for stream {} was still pending",
                result.stream_index,
                pending.stream_index
            );
            *slot = Some(ReadResult::failure(
                result.stream_index,
                "a second read completed before the first result was consumed",
            ));
        } else {
            *slot = Some(result);
        }
        self.shared.available.notify_one();
    }
}
