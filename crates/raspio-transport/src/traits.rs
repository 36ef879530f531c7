use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Lifecycle of a transport connection.
///
/// `Disconnected → Connecting → Connected → Closing → Closed`. There is no
/// way back from `Closed`: a new connection must be created instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A message-oriented, bidirectional text transport.
///
/// Implemented by [`WsConnection`](crate::WsConnection). The correlator is
/// generic over this trait so it never touches sockets directly.
pub trait FrameTransport {
    /// Send one complete text message.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Wait up to `wait` for the next inbound message.
    ///
    /// Returns `Ok(None)` if nothing arrived in time. Any error is terminal:
    /// the connection is `Closed` afterwards.
    fn recv_frame(&mut self, wait: Duration) -> Result<Option<Bytes>>;

    /// Release the connection. Never fails; safe to call repeatedly.
    fn close(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// True while frames can be exchanged.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl<T: FrameTransport + ?Sized> FrameTransport for Box<T> {
    fn send_text(&mut self, text: &str) -> Result<()> {
        (**self).send_text(text)
    }

    fn recv_frame(&mut self, wait: Duration) -> Result<Option<Bytes>> {
        (**self).recv_frame(wait)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }
}
