//! Server error types.

use std::fmt;

use scrumdeck_core::RoomError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unreadable backlog file,
    /// etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (bind failure, handshake failure, I/O error).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Transport(String),

    /// Protocol error (malformed JSON, unexpected message shape).
    ///
    /// Indicates a client sent data the server cannot interpret. Fatal for
    /// that request only; the server keeps serving everyone else.
    Protocol(String),

    /// Internal error (unexpected state, logic bug).
    ///
    /// Should never happen in a correct implementation. Indicates a bug.
    Internal(String),

    /// Room operation rejected (wrong phase, unknown participant, etc.).
    ///
    /// Wraps errors from the core session logic. Request-scoped: delivered
    /// to the offending connection as an `error` event, never fatal to the
    /// room.
    Room(RoomError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Room(err) => write!(f, "room error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Room(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(err: RoomError) -> Self {
        Self::Room(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("missing backlog file".to_string());
        assert_eq!(err.to_string(), "configuration error: missing backlog file");

        let err = ServerError::Room(RoomError::NotVotingPhase);
        assert_eq!(err.to_string(), "room error: voting is not open");
    }

    #[test]
    fn room_error_is_the_source() {
        use std::error::Error;

        let err = ServerError::Room(RoomError::IncompleteVoting);
        assert!(err.source().is_some());

        let err = ServerError::Transport("refused".to_string());
        assert!(err.source().is_none());
    }
}
