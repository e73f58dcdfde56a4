//! Error kinds for the lock service core.
//!
//! The protocol-relevant kinds are a typed enum so the dispatcher can match
//! on them directly. Anything outside the protocol (bind failures, I/O noise
//! that never reaches a peer) flows through the boxed [`crate::Error`] alias
//! instead, the way the teacher's `lib.rs` does for its own non-protocol
//! errors.

use std::io;

/// Errors produced while framing, parsing, or dispatching a single
/// connection's requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A line could not be parsed, or was structurally invalid (empty name,
    /// empty parameter key, oversized line).
    #[error("invalid request")]
    InvalidRequest,

    /// The action name did not match any known top-level or inner action.
    #[error("invalid action")]
    InvalidAction,

    /// A `lock` action's `name` parameter failed `^[A-Za-z0-9_-]+$`.
    #[error("invalid lock name")]
    InvalidLockName,

    /// `try_acquire` lost the race; the lock is already held.
    #[error("lock not granted")]
    NotGranted,

    /// A zero-length read: the peer closed its half of the connection.
    #[error("peer disconnected")]
    PeerDisconnected,

    /// The server could not bind its listening socket.
    #[error("failed to bind: {0}")]
    BindFailure(#[source] io::Error),

    /// An unrecoverable error while the server was already running.
    #[error("runtime failure: {0}")]
    RuntimeFailure(#[source] io::Error),

    /// The client received a response outside the allowed set for the
    /// action it sent.
    #[error("protocol mismatch: expected one of {expected:?}, got {actual:?}")]
    ProtocolMismatch {
        expected: Vec<&'static str>,
        actual: String,
    },

    /// The client-supplied client-id or lock name failed
    /// `^[A-Za-z0-9_-]+$`.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Transport-level I/O error that isn't a clean disconnect.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// The wire response token this error, if ever sent to a peer, would
    /// carry. Returns `None` for errors that never reach the wire
    /// (peer-disconnect, bind/runtime failures, client-side errors).
    pub fn response_token(&self) -> Option<String> {
        match self {
            Error::InvalidRequest => Some("bad-request".to_string()),
            Error::InvalidAction => Some("bad-action".to_string()),
            Error::InvalidLockName => Some("err,invalid lock name".to_string()),
            Error::NotGranted => Some("not-granted".to_string()),
            _ => None,
        }
    }
}
