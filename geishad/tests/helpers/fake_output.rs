//! Scriptable Audio Output
//!
//! Opens succeed unless the track was marked unplayable. Handles never end on
//! their own; tests end them with [`FakeHandle::finish`], or with
//! [`FakeHandle::finish_deferred`] + [`FakeHandle::release`] to hold a natural
//! completion in flight while the actor handles other messages.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geishad::audio::{AudioHandle, AudioOutput, CompletionReason, CompletionSender};
use geishad::playback::Track;
use geishad::{Error, Result};

/// Length every fake track reports
pub const FAKE_TOTAL: Duration = Duration::from_secs(100);

#[derive(Default)]
struct FakeState {
    unplayable: HashSet<String>,
    attempts: Vec<String>,
    handles: Vec<Arc<FakeHandle>>,
    overlapping_open: bool,
    open_delay: Duration,
}

#[derive(Default)]
pub struct FakeOutput {
    state: Mutex<FakeState>,
}

impl FakeOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every future open of `track` fail
    pub fn fail_on(&self, track: &str) {
        self.state.lock().unwrap().unplayable.insert(track.to_string());
    }

    /// Block the calling thread this long in every open, like a slow probe
    pub fn set_open_delay(&self, delay: Duration) {
        self.state.lock().unwrap().open_delay = delay;
    }

    /// Every track an open was attempted for, in order
    pub fn attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Tracks that opened successfully, in order
    pub fn opened(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .handles
            .iter()
            .map(|h| h.track.clone())
            .collect()
    }

    /// Most recently opened handle
    pub fn current(&self) -> Arc<FakeHandle> {
        Arc::clone(
            self.state
                .lock()
                .unwrap()
                .handles
                .last()
                .expect("no handle opened yet"),
        )
    }

    /// True if an open was ever attempted while a handle was still live
    pub fn saw_overlapping_open(&self) -> bool {
        self.state.lock().unwrap().overlapping_open
    }
}

impl AudioOutput for FakeOutput {
    fn open(&self, track: &Track, completion: CompletionSender) -> Result<Arc<dyn AudioHandle>> {
        let delay = self.state.lock().unwrap().open_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.state.lock().unwrap();
        state.attempts.push(track.to_string());
        if state.handles.iter().any(|h| !h.has_completed()) {
            state.overlapping_open = true;
        }

        if state.unplayable.contains(track.as_str()) {
            return Err(Error::Decode(format!("cannot open {track}")));
        }

        let handle = Arc::new(FakeHandle {
            track: track.to_string(),
            completion,
            completed: AtomicBool::new(false),
            held: Mutex::new(None),
            transport: Mutex::new((Duration::ZERO, false)),
            teardowns: Mutex::new(Vec::new()),
        });
        state.handles.push(Arc::clone(&handle));
        Ok(handle)
    }
}

pub struct FakeHandle {
    pub track: String,
    completion: CompletionSender,
    completed: AtomicBool,
    held: Mutex<Option<CompletionReason>>,
    /// (position, paused)
    transport: Mutex<(Duration, bool)>,
    teardowns: Mutex<Vec<CompletionReason>>,
}

impl FakeHandle {
    fn complete(&self, reason: CompletionReason) -> bool {
        if self.completed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.completion.send(reason);
        true
    }

    pub fn has_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Play to the end now
    pub fn finish(&self) {
        self.complete(CompletionReason::Natural);
    }

    /// Reach the end, but hold the notification until [`release`](Self::release)
    pub fn finish_deferred(&self) {
        if !self.completed.swap(true, Ordering::SeqCst) {
            *self.held.lock().unwrap() = Some(CompletionReason::Natural);
        }
    }

    pub fn release(&self) {
        if let Some(reason) = self.held.lock().unwrap().take() {
            let _ = self.completion.send(reason);
        }
    }

    /// Every teardown reason requested, including ignored repeats
    pub fn teardowns(&self) -> Vec<CompletionReason> {
        self.teardowns.lock().unwrap().clone()
    }

    pub fn position(&self) -> Duration {
        self.transport.lock().unwrap().0
    }

    pub fn set_position(&self, position: Duration) {
        self.transport.lock().unwrap().0 = position;
    }
}

impl AudioHandle for FakeHandle {
    fn play(&self) {
        self.transport.lock().unwrap().1 = false;
    }

    fn pause(&self) {
        self.transport.lock().unwrap().1 = true;
    }

    fn toggle(&self) {
        let mut transport = self.transport.lock().unwrap();
        transport.1 = !transport.1;
    }

    fn seek_relative(&self, forward: bool) {
        let mut transport = self.transport.lock().unwrap();
        transport.0 = geishad::audio::relative_seek_target(transport.0, FAKE_TOTAL, forward);
    }

    fn seek_absolute(&self, position: Duration) {
        self.transport.lock().unwrap().0 = position.min(FAKE_TOTAL);
    }

    fn progress(&self) -> (Duration, Duration) {
        (self.transport.lock().unwrap().0, FAKE_TOTAL)
    }

    fn is_paused(&self) -> bool {
        self.transport.lock().unwrap().1
    }

    fn teardown(&self, reason: CompletionReason) {
        self.teardowns.lock().unwrap().push(reason);
        self.complete(reason);
    }
}
