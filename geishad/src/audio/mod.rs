//! Audio Output boundary
//!
//! The player actor only sees the two traits below. A backend opens a track
//! into a handle; the handle later reports completion exactly once through the
//! channel it was opened with, from whatever thread it runs on.
//!
//! Backends:
//! - [`null::NullOutput`]: probes the file, then plays it against the clock
//! - `device::DeviceOutput` (feature `device`): decodes and plays on a cpal device

pub mod null;
pub mod probe;

#[cfg(feature = "device")]
pub mod device;
#[cfg(feature = "device")]
pub mod resampler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;

use geisha_common::config::OutputBackend;

use crate::error::Result;
use crate::playback::queue::Track;

pub use null::NullOutput;

/// Fraction of the total duration moved by one relative seek
pub const SEEK_STEP: f64 = 0.02;

/// Why a handle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// Track played to the end
    Natural,
    /// Torn down by a skip control
    Skip,
    /// Torn down by a prev control
    Prev,
    /// Torn down by a queue change that already moved the cursor
    Noop,
}

/// Channel a handle reports its completion on
pub type CompletionSender = mpsc::UnboundedSender<CompletionReason>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<CompletionReason>;

/// Run blocking backend work (probing, decoding) off the async scheduler
///
/// On a multi-thread runtime the current worker hands its other tasks away
/// first. A current-thread runtime cannot do that, so the call runs inline.
pub(crate) fn block_in_place<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// Opens tracks into playable handles
pub trait AudioOutput: Send + Sync {
    /// Open `track`; the returned handle starts playing immediately
    fn open(&self, track: &Track, completion: CompletionSender) -> Result<Arc<dyn AudioHandle>>;
}

/// One open, playable instance of a track
///
/// Transport methods are called from the actor while rendering continues on
/// another thread; implementations serialize access internally.
pub trait AudioHandle: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn toggle(&self);

    /// Move the playhead by [`SEEK_STEP`] of the total duration
    fn seek_relative(&self, forward: bool);

    fn seek_absolute(&self, position: Duration);

    /// (elapsed, total)
    fn progress(&self) -> (Duration, Duration);

    fn is_paused(&self) -> bool;

    /// Stop playback and report `reason`. Idempotent: only the first
    /// completion (natural end or teardown) is ever reported.
    fn teardown(&self, reason: CompletionReason);
}

/// Single-shot completion reporting shared by the backends
#[derive(Debug)]
pub struct CompletionGate {
    fired: AtomicBool,
    tx: CompletionSender,
}

impl CompletionGate {
    pub fn new(tx: CompletionSender) -> Self {
        Self {
            fired: AtomicBool::new(false),
            tx,
        }
    }

    /// Report `reason` unless a completion was already reported.
    /// Returns true if this call was the one that reported.
    pub fn fire(&self, reason: CompletionReason) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Receiver gone means the actor has shut down; nobody to tell.
        let _ = self.tx.send(reason);
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Build the configured backend
pub fn build_output(
    backend: OutputBackend,
    device_name: Option<String>,
) -> Result<Arc<dyn AudioOutput>> {
    match backend {
        OutputBackend::Null => {
            if let Some(name) = device_name {
                tracing::warn!("Ignoring device '{}' for null output", name);
            }
            Ok(Arc::new(NullOutput::new()))
        }
        #[cfg(feature = "device")]
        OutputBackend::Device => Ok(Arc::new(device::DeviceOutput::new(device_name)?)),
        #[cfg(not(feature = "device"))]
        OutputBackend::Device => {
            let _ = device_name;
            Err(crate::error::Error::Config(
                "device output requested but geishad was built without the `device` feature"
                    .to_string(),
            ))
        }
    }
}

/// Target of a relative seek from `elapsed`, clamped to `[0, total]`
pub fn relative_seek_target(elapsed: Duration, total: Duration, forward: bool) -> Duration {
    let step = total.mul_f64(SEEK_STEP);
    if forward {
        (elapsed + step).min(total)
    } else {
        elapsed.saturating_sub(step)
    }
}
