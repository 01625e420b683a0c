//! Playback queue and the player actor that owns it

pub mod player;
pub mod queue;

pub use player::{spawn, PlayerHandle};
pub use queue::{Queue, QueueEntry, Track};
