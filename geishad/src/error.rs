//! Error types for geishad
//!
//! Defines daemon-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for geishad
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network / file I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Track could not be probed or decoded
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Malformed request (bad argument count or format)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request referenced an entry that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Wire-level decode/encode failure on a connection
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Actor or bus task went away
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Protocol errors come from parsing request arguments, so they are bad requests
impl From<geisha_common::Error> for Error {
    fn from(err: geisha_common::Error) -> Self {
        match err {
            geisha_common::Error::Config(msg) => Error::Config(msg),
            geisha_common::Error::Protocol(msg) => Error::BadRequest(msg),
        }
    }
}

/// Convenience Result type using geishad Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use geisha_common::Control;

    #[test]
    fn test_bad_control_code_is_a_bad_request() {
        let result: Result<Control> = "9".parse::<Control>().map_err(Error::from);
        assert!(matches!(result, Err(Error::BadRequest(msg)) if msg.contains("9")));
    }

    #[test]
    fn test_common_config_error_stays_config() {
        let err = Error::from(geisha_common::Error::Config("port".to_string()));
        assert!(matches!(err, Error::Config(msg) if msg == "port"));
    }
}
