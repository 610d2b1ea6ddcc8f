// ABOUTME: Structured session error kinds plus the thread-local "last error" accessor
// ABOUTME: Mirrors the teacher crate's SmppError, specialized to the five kinds the engine defines

use crate::codec::CodecError;
use std::cell::RefCell;
use thiserror::Error;

/// The five error kinds a session operation can fail with.
///
/// `InvalidArgument` never touches the socket. Every other kind is fatal: the running flag is
/// cleared and the connection is closed by the caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Missing required header, malformed `heart-beat`/`content-length`, illegal `ack` value, or
    /// a command unsupported by the negotiated protocol version.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Name resolution or socket connect did not yield a usable endpoint.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// A short read that could not progress, a write failure, or an unexpected end of stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The parser entered its error state, or an inbound command was not recognized.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The broker heartbeat deadline was missed more than five consecutive times.
    #[error("broker heartbeat timed out")]
    Timeout,
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => SessionError::Io(e),
            CodecError::InvalidCommand(m) | CodecError::InvalidHeader(m) | CodecError::InvalidBody(m) => {
                SessionError::InvalidArgument(m)
            }
            other => SessionError::Protocol(other.to_string()),
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Records `err`'s message in the thread-local slot and returns it unchanged, so call sites can
/// write `return Err(record(err))` without a separate statement.
pub(crate) fn record(err: SessionError) -> SessionError {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err.to_string()));
    err
}

/// Returns a human-readable description of the most recent failure on this thread, if any.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_populates_thread_local_message() {
        let err = record(SessionError::InvalidArgument("missing destination".into()));
        assert!(matches!(err, SessionError::InvalidArgument(_)));
        assert_eq!(
            last_error().as_deref(),
            Some("invalid argument: missing destination")
        );
    }
}
