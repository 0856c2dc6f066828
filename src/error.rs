//! Error types for Setu

use crate::session::ThreadState;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Snapshot serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Peer unreachable, refused, or listener could not be bound
    #[error("Connect failed ({endpoint}): {source}")]
    ConnectFailure {
        /// Endpoint that was dialed or bound
        endpoint: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Write to an open connection failed (broken pipe, reset)
    #[error("Write failed: {0}")]
    WriteFailure(std::io::Error),

    /// Malformed or short frame
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Lifecycle call made from a state that does not allow it
    #[error("Illegal state transition: cannot {action} while {state:?}")]
    IllegalStateTransition {
        /// Requested lifecycle operation
        action: &'static str,
        /// State the session was in
        state: ThreadState,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Wire framing errors
///
/// A corrupted stream cannot be resynchronized (the protocol has no marker),
/// so these are surfaced to the caller rather than retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// Fewer bytes available than the frame declares
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required to complete the frame (header included)
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// Declared length exceeds the maximum frame size
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    Oversized {
        /// Declared payload length
        len: usize,
        /// Maximum accepted payload length
        max: usize,
    },

    /// Header declares a zero-length payload
    #[error("zero-length frame")]
    EmptyFrame,

    /// Attempt to encode an empty payload
    #[error("empty payloads are never encoded")]
    EmptyPayload,
}
