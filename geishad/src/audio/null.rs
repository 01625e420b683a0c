//! Clock-driven output with no sound device
//!
//! Each track is probed with symphonia (so unplayable files fail to open the
//! same way they would on a device) and then "played" against the tokio
//! clock. A small task per handle sleeps until the virtual playhead reaches
//! the end and reports a natural completion.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use super::probe::probe_track;
use super::{
    relative_seek_target, AudioHandle, AudioOutput, CompletionGate, CompletionReason,
    CompletionSender,
};
use crate::error::Result;
use crate::playback::queue::Track;

/// Output backend that plays tracks against the clock
#[derive(Debug, Default, Clone)]
pub struct NullOutput;

impl NullOutput {
    pub fn new() -> Self {
        info!("Using null audio output (no sound device)");
        Self
    }
}

impl AudioOutput for NullOutput {
    fn open(&self, track: &Track, completion: CompletionSender) -> Result<Arc<dyn AudioHandle>> {
        let info = probe_track(track.as_path())?;
        debug!("Opened {} ({:.1}s)", track, info.duration.as_secs_f64());

        let handle = Arc::new(NullHandle::new(info.duration, CompletionGate::new(completion)));
        tokio::spawn(run_clock(Arc::clone(&handle)));
        Ok(handle)
    }
}

/// Virtual playhead: position at the last transport change plus the
/// instant playback resumed (None while paused)
#[derive(Debug)]
struct Playhead {
    offset: Duration,
    resumed_at: Option<Instant>,
}

impl Playhead {
    fn elapsed(&self, total: Duration) -> Duration {
        let running = self.resumed_at.map(|t| t.elapsed()).unwrap_or_default();
        (self.offset + running).min(total)
    }

    fn freeze(&mut self, total: Duration) {
        self.offset = self.elapsed(total);
        self.resumed_at = None;
    }
}

/// Handle returned by [`NullOutput`]
#[derive(Debug)]
pub struct NullHandle {
    total: Duration,
    playhead: Mutex<Playhead>,
    changed: Notify,
    gate: CompletionGate,
}

impl NullHandle {
    fn new(total: Duration, gate: CompletionGate) -> Self {
        Self {
            total,
            playhead: Mutex::new(Playhead {
                offset: Duration::ZERO,
                resumed_at: Some(Instant::now()),
            }),
            changed: Notify::new(),
            gate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Playhead> {
        self.playhead.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time left before the natural end, None while paused
    fn remaining(&self) -> Option<Duration> {
        let playhead = self.lock();
        playhead
            .resumed_at
            .map(|_| self.total.saturating_sub(playhead.elapsed(self.total)))
    }

    fn set_position(&self, position: Duration) {
        let mut playhead = self.lock();
        playhead.offset = position.min(self.total);
        if playhead.resumed_at.is_some() {
            playhead.resumed_at = Some(Instant::now());
        }
        drop(playhead);
        self.changed.notify_one();
    }
}

async fn run_clock(handle: Arc<NullHandle>) {
    loop {
        if handle.gate.has_fired() {
            break;
        }

        match handle.remaining() {
            None => handle.changed.notified().await,
            Some(remaining) => {
                tokio::select! {
                    _ = tokio::time::sleep(remaining) => {
                        if handle.remaining() == Some(Duration::ZERO) {
                            handle.gate.fire(CompletionReason::Natural);
                            break;
                        }
                    }
                    _ = handle.changed.notified() => {}
                }
            }
        }
    }
}

impl AudioHandle for NullHandle {
    fn play(&self) {
        let mut playhead = self.lock();
        if playhead.resumed_at.is_none() {
            playhead.resumed_at = Some(Instant::now());
        }
        drop(playhead);
        self.changed.notify_one();
    }

    fn pause(&self) {
        self.lock().freeze(self.total);
        self.changed.notify_one();
    }

    fn toggle(&self) {
        if self.is_paused() {
            self.play();
        } else {
            self.pause();
        }
    }

    fn seek_relative(&self, forward: bool) {
        let elapsed = self.lock().elapsed(self.total);
        self.set_position(relative_seek_target(elapsed, self.total, forward));
    }

    fn seek_absolute(&self, position: Duration) {
        self.set_position(position);
    }

    fn progress(&self) -> (Duration, Duration) {
        (self.lock().elapsed(self.total), self.total)
    }

    fn is_paused(&self) -> bool {
        self.lock().resumed_at.is_none()
    }

    fn teardown(&self, reason: CompletionReason) {
        if self.gate.fire(reason) {
            debug!("Null handle torn down ({:?})", reason);
        }
        self.changed.notify_one();
    }
}
