//! Event tags broadcast to subscribers
//!
//! Events carry no payload: a subscriber that wants details re-queries the
//! daemon with `GetState`/`GetQueue` after seeing the tag.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;
use crate::ipc::Control;

/// Geisha event types
///
/// Serialized as the bare tag string, which is also what subscribed
/// connections receive (one tag per line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    // Controls
    #[serde(rename = "ctrl:play")]
    CtrlPlay,
    #[serde(rename = "ctrl:pause")]
    CtrlPause,
    #[serde(rename = "ctrl:fwd")]
    CtrlFwd,
    #[serde(rename = "ctrl:bwd")]
    CtrlBwd,
    #[serde(rename = "ctrl:prev")]
    CtrlPrev,
    #[serde(rename = "ctrl:skip")]
    CtrlSkip,
    #[serde(rename = "ctrl:stop")]
    CtrlStop,
    #[serde(rename = "ctrl:toggle")]
    CtrlToggle,

    /// Loop or repeat flag flipped
    #[serde(rename = "mode:change")]
    ModeChange,

    /// A handle was opened for the current entry
    #[serde(rename = "song:play")]
    SongPlay,

    /// The open handle completed (any reason)
    #[serde(rename = "song:done")]
    SongDone,

    /// Queue contents, order or cursor changed
    #[serde(rename = "queue:change")]
    QueueChange,
}

impl Event {
    /// All events, in declaration order
    pub const ALL: [Event; 12] = [
        Event::CtrlPlay,
        Event::CtrlPause,
        Event::CtrlFwd,
        Event::CtrlBwd,
        Event::CtrlPrev,
        Event::CtrlSkip,
        Event::CtrlStop,
        Event::CtrlToggle,
        Event::ModeChange,
        Event::SongPlay,
        Event::SongDone,
        Event::QueueChange,
    ];

    /// Wire tag for this event
    pub fn tag(&self) -> &'static str {
        match self {
            Event::CtrlPlay => "ctrl:play",
            Event::CtrlPause => "ctrl:pause",
            Event::CtrlFwd => "ctrl:fwd",
            Event::CtrlBwd => "ctrl:bwd",
            Event::CtrlPrev => "ctrl:prev",
            Event::CtrlSkip => "ctrl:skip",
            Event::CtrlStop => "ctrl:stop",
            Event::CtrlToggle => "ctrl:toggle",
            Event::ModeChange => "mode:change",
            Event::SongPlay => "song:play",
            Event::SongDone => "song:done",
            Event::QueueChange => "queue:change",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Event {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .iter()
            .copied()
            .find(|event| event.tag() == s)
            .ok_or_else(|| Error::Protocol(format!("unknown event tag: {s}")))
    }
}

impl From<Control> for Event {
    fn from(control: Control) -> Self {
        match control {
            Control::Play => Event::CtrlPlay,
            Control::Pause => Event::CtrlPause,
            Control::Toggle => Event::CtrlToggle,
            Control::Fwd => Event::CtrlFwd,
            Control::Bwd => Event::CtrlBwd,
            Control::Prev => Event::CtrlPrev,
            Control::Skip => Event::CtrlSkip,
            Control::Stop => Event::CtrlStop,
        }
    }
}
