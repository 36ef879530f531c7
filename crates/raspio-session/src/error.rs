use std::time::Duration;

use raspio_codec::{DecodeError, EncodeError};
use raspio_transport::TransportError;

/// Errors returned by a call on an open session.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The session was closed; nothing was sent.
    #[error("session is closed")]
    Closed,

    /// Another call is still waiting for its reply; nothing was sent.
    #[error("another call is in progress on this session")]
    InProgress,

    /// An earlier call gave up waiting, so a late reply may still arrive.
    /// Nothing was sent; the session must be reset first.
    #[error("session out of sync ({0}); reset it before issuing new calls")]
    Stale(String),

    /// The request failed local validation; nothing was sent.
    #[error("invalid request: {0}")]
    Encode(#[from] EncodeError),

    /// The reply could not be decoded. The reply was consumed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// No reply arrived within the session timeout.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The caller's deadline or cancel token fired first.
    #[error("call cancelled after {0:?}")]
    Cancelled(Duration),

    /// The connection failed while the call was outstanding, or earlier.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The transport refused the request before any I/O.
    #[error("transport error: {0}")]
    Transport(TransportError),
}

/// Errors returned while opening a session.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The resource could not be mapped to an endpoint.
    #[error("cannot resolve endpoint: {0}")]
    Resolve(TransportError),

    /// The connection could not be established.
    #[error("cannot connect: {0}")]
    Connect(TransportError),

    /// The server answered the open request negatively.
    #[error("open rejected: {0}")]
    Rejected(String),

    /// The open request itself failed.
    #[error("open failed: {0}")]
    Call(#[from] CallError),
}

impl OpenError {
    /// Server-reported reason, if the server refused the open.
    pub fn reason(&self) -> Option<&str> {
        match self {
            OpenError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CallError>;
