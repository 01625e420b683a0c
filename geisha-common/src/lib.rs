//! # Geisha Common Library
//!
//! Shared code for the geisha daemon and its clients:
//! - Wire protocol types (requests, responses, controls)
//! - Event tags broadcast to subscribers
//! - Bootstrap configuration loading

pub mod config;
pub mod error;
pub mod events;
pub mod ipc;

pub use error::{Error, Result};
pub use events::Event;
pub use ipc::{Control, Method, Request, Response, Status};
