//! # Geisha daemon library (geishad)
//!
//! Control plane of a single-user media daemon.
//!
//! **Components:**
//! - [`playback::queue`]: ordered entries with an identity-stable cursor
//! - [`playback::player`]: the actor that owns the queue and the open audio handle
//! - [`events`]: fan-out of actor events to subscribed connections
//! - [`server`]: TCP listener and the per-connection protocol dispatcher
//! - [`audio`]: the Audio Output boundary and its backends

pub mod audio;
pub mod daemon;
pub mod error;
pub mod events;
pub mod playback;
pub mod server;

pub use daemon::Daemon;
pub use error::{Error, Result};
