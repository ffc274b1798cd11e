use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::trace;

use crate::constants::PROGRESS_SCALE;

/// Receives upload progress in permille (0-1000).
///
/// Called from the upload task; callers that own a single-threaded context
/// should forward the value rather than do work in place.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, permille: u16);
}

impl<F> ProgressSink for F
where
    F: Fn(u16) + Send + Sync,
{
    fn on_progress(&self, permille: u16) {
        self(permille)
    }
}

/// `floor(written * 1000 / total)`, clamped to the scale.
pub fn permille(written: u64, total: u64) -> u16 {
    if total == 0 {
        return PROGRESS_SCALE as u16;
    }
    let written = written.min(total) as u128;
    ((written * PROGRESS_SCALE as u128) / total as u128) as u16
}

struct TrackerState {
    written: u64,
    last: Option<u16>,
    closed: bool,
}

/// Counts body bytes for one request and forwards permille progress.
///
/// Only increasing values are forwarded. Once [`ProgressTracker::close`]
/// returns, the sink is never called again.
pub struct ProgressTracker {
    sink: Option<Arc<dyn ProgressSink>>,
    total: u64,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    pub fn new(sink: Option<Arc<dyn ProgressSink>>, total: u64) -> Self {
        ProgressTracker {
            sink,
            total,
            state: Mutex::new(TrackerState {
                written: 0,
                last: None,
                closed: false,
            }),
        }
    }

    /// Record `bytes` more written to the wire
    pub fn record(&self, bytes: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return;
        }
        state.written = state.written.saturating_add(bytes);
        let progress = permille(state.written, self.total);
        trace!("progress: {} ({} / {})", progress, state.written, self.total);

        if state.last.map_or(true, |last| progress > last) {
            state.last = Some(progress);
            // Sink runs under the lock so close() cannot overtake it
            if let Some(sink) = &self.sink {
                sink.on_progress(progress);
            }
        }
    }

    /// Stop forwarding progress. Called before the terminal outcome is delivered.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
    }

    pub fn bytes_written(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).written
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Wrap a body stream so every chunk handed to the transport is counted.
pub fn counting_stream<S>(
    inner: S,
    tracker: Arc<ProgressTracker>,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    inner.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            tracker.record(bytes.len() as u64);
        }
        chunk
    })
}
