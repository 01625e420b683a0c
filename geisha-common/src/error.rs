//! Common error types for geisha

use thiserror::Error;

/// Common result type for geisha operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the daemon and clients
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Value outside the closed set the protocol allows
    #[error("Protocol error: {0}")]
    Protocol(String),
}
