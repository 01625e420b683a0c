//! Test helper modules for geishad integration tests
//!
//! Provides reusable test infrastructure components:
//! - FakeOutput: scriptable Audio Output that records every open
//! - TestPlayer: player actor plus a subscriber to its events
//! - TestDaemon / TestClient: full daemon on an ephemeral port and a line client

#![allow(dead_code)]

pub mod fake_output;
pub mod test_player;
pub mod test_server;

pub use fake_output::{FakeHandle, FakeOutput};
pub use test_player::TestPlayer;
pub use test_server::{TestClient, TestDaemon};
