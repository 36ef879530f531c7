use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, trace, warn};
use tungstenite::client::client_with_config;
use tungstenite::handshake::HandshakeError;
use tungstenite::protocol::WebSocketConfig;
use tungstenite::{Message, WebSocket};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{ConnectionState, FrameTransport};

/// Default maximum inbound/outbound message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// `set_read_timeout(Some(0))` is rejected by the OS layer.
const MIN_READ_WAIT: Duration = Duration::from_millis(1);
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_millis(200);
const FRAMES_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound for TCP connect plus WebSocket upgrade. Default: 5 s.
    pub connect_timeout: Duration,
    /// Write timeout for each outbound message. Default: 5 s.
    pub write_timeout: Duration,
    /// Maximum message size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// One blocking WebSocket connection to one endpoint.
///
/// Never reconnects on its own. Once `Closed`, create a new connection.
pub struct WsConnection {
    endpoint: Endpoint,
    config: ConnectionConfig,
    state: ConnectionState,
    socket: Option<WebSocket<TcpStream>>,
    closed_by_peer: bool,
}

impl WsConnection {
    /// Create a connection in the `Disconnected` state.
    pub fn new(endpoint: Endpoint, config: ConnectionConfig) -> Self {
        Self {
            endpoint,
            config,
            state: ConnectionState::Disconnected,
            socket: None,
            closed_by_peer: false,
        }
    }

    /// Create and open a connection.
    pub fn connect(endpoint: Endpoint, config: ConnectionConfig) -> Result<Self> {
        let mut conn = Self::new(endpoint, config);
        conn.open()?;
        Ok(conn)
    }

    /// Perform TCP connect and the WebSocket upgrade.
    ///
    /// Only valid from `Disconnected`. On failure the connection is `Closed`.
    pub fn open(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(TransportError::NotConnected(self.state));
        }

        self.state = ConnectionState::Connecting;
        match self.establish() {
            Ok(socket) => {
                self.socket = Some(socket);
                self.state = ConnectionState::Connected;
                debug!(url = %self.endpoint.url(), "websocket connected");
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Closed;
                debug!(url = %self.endpoint.url(), error = %err, "websocket connect failed");
                Err(err)
            }
        }
    }

    fn establish(&self) -> Result<WebSocket<TcpStream>> {
        let url = self.endpoint.url();
        let timeout = self.config.connect_timeout;
        let started = Instant::now();

        let addrs = self.endpoint.socket_addrs()?;
        let stream = connect_any(&addrs, timeout).map_err(|err| TransportError::Connect {
            url: url.clone(),
            reason: err.to_string(),
        })?;

        // The upgrade shares the connect budget.
        let remaining = timeout
            .checked_sub(started.elapsed())
            .filter(|left| !left.is_zero())
            .ok_or_else(|| TransportError::Connect {
                url: url.clone(),
                reason: format!("connect did not complete within {timeout:?}"),
            })?;
        stream.set_read_timeout(Some(remaining))?;
        stream.set_write_timeout(Some(remaining))?;
        stream.set_nodelay(true)?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let (socket, _response) = client_with_config(url.as_str(), stream, Some(ws_config))
            .map_err(|err| match err {
                HandshakeError::Interrupted(_) => TransportError::Connect {
                    url: url.clone(),
                    reason: format!("websocket upgrade did not complete within {timeout:?}"),
                },
                HandshakeError::Failure(err) => TransportError::Connect {
                    url: url.clone(),
                    reason: err.to_string(),
                },
            })?;

        socket
            .get_ref()
            .set_write_timeout(Some(self.config.write_timeout))?;
        Ok(socket)
    }

    /// Lazy sequence of inbound frames, ending when the connection closes.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            conn: self,
            poll: FRAMES_POLL_INTERVAL,
        }
    }

    /// The endpoint this connection targets.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True if the remote side initiated the close handshake.
    pub fn closed_by_peer(&self) -> bool {
        self.closed_by_peer
    }

    fn connected_socket(&mut self) -> Result<&mut WebSocket<TcpStream>> {
        match (self.state, self.socket.as_mut()) {
            (ConnectionState::Connected, Some(socket)) => Ok(socket),
            (state, _) => Err(TransportError::NotConnected(state)),
        }
    }

    fn fail(&mut self, reason: String) -> TransportError {
        warn!(url = %self.endpoint.url(), %reason, "websocket connection lost");
        self.socket = None;
        self.state = ConnectionState::Closed;
        TransportError::ConnectionLost(reason)
    }
}

impl FrameTransport for WsConnection {
    fn send_text(&mut self, text: &str) -> Result<()> {
        if text.len() > self.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: text.len(),
                max: self.config.max_message_size,
            });
        }

        let socket = self.connected_socket()?;
        trace!(payload = text, "websocket send");
        if let Err(err) = socket.send(Message::Text(text.to_string())) {
            // A failed write may have left a partial frame behind.
            return Err(self.fail(format!("write failed: {err}")));
        }
        Ok(())
    }

    fn recv_frame(&mut self, wait: Duration) -> Result<Option<Bytes>> {
        let socket = self.connected_socket()?;
        if let Err(err) = socket.get_ref().set_read_timeout(Some(wait.max(MIN_READ_WAIT))) {
            return Err(self.fail(format!("cannot arm read timeout: {err}")));
        }

        match read_message(socket) {
            Ok(frame) => Ok(frame),
            Err(ReadFailure::PeerClosed) => {
                self.closed_by_peer = true;
                Err(self.fail("peer closed the connection".to_string()))
            }
            Err(ReadFailure::Broken(reason)) => Err(self.fail(reason)),
        }
    }

    fn close(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            self.state = ConnectionState::Closed;
            return;
        };

        self.state = ConnectionState::Closing;
        if socket.close(None).is_ok() {
            // Drain until the close handshake finishes or the budget runs out.
            let deadline = Instant::now() + CLOSE_DRAIN_TIMEOUT;
            let _ = socket.get_ref().set_read_timeout(Some(CLOSE_DRAIN_TIMEOUT));
            while Instant::now() < deadline {
                if socket.read().is_err() {
                    break;
                }
            }
        }
        self.state = ConnectionState::Closed;
        debug!(url = %self.endpoint.url(), "websocket closed");
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if self.socket.is_some() {
            self.close();
        }
    }
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("url", &self.endpoint.url())
            .field("state", &self.state)
            .finish()
    }
}

/// Iterator returned by [`WsConnection::frames`].
///
/// Yields each inbound frame; a transport failure is yielded once and then
/// the sequence ends. A close initiated by the peer ends it silently.
pub struct Frames<'a> {
    conn: &'a mut WsConnection,
    poll: Duration,
}

impl Iterator for Frames<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.conn.is_connected() {
                return None;
            }
            match self.conn.recv_frame(self.poll) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(_) if self.conn.closed_by_peer() => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

enum ReadFailure {
    PeerClosed,
    Broken(String),
}

fn read_message(
    socket: &mut WebSocket<TcpStream>,
) -> std::result::Result<Option<Bytes>, ReadFailure> {
    loop {
        match socket.read() {
            Ok(Message::Text(text)) => {
                trace!(payload = %text, "websocket recv");
                return Ok(Some(Bytes::from(text)));
            }
            Ok(Message::Binary(data)) => return Ok(Some(Bytes::from(data))),
            // Pings are answered by the socket on the next read or write.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
            Ok(Message::Close(_)) => return Err(ReadFailure::PeerClosed),
            Err(tungstenite::Error::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                return Ok(None);
            }
            Err(tungstenite::Error::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
            Err(tungstenite::Error::ConnectionClosed) => return Err(ReadFailure::PeerClosed),
            Err(err) => return Err(ReadFailure::Broken(format!("read failed: {err}"))),
        }
    }
}

fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, "no socket address to connect to")
    }))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn spawn_server<F>(handler: F) -> (u16, thread::JoinHandle<()>)
    where
        F: FnOnce(WebSocket<TcpStream>) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("server should accept");
            let socket = tungstenite::accept(stream)
                .unwrap_or_else(|err| panic!("websocket accept failed: {err}"));
            handler(socket);
        });
        (port, handle)
    }

    fn local(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port, "i2c")
    }

    #[test]
    fn lifecycle_states() {
        let (port, server) = spawn_server(|mut socket| {
            let msg = socket.read().expect("server should read");
            socket.send(msg).expect("server should echo");
            let _ = socket.read();
        });

        let mut conn = WsConnection::new(local(port), ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        conn.open().expect("open should succeed");
        assert_eq!(conn.state(), ConnectionState::Connected);

        conn.send_text(r#"{"handle":"open"}"#).unwrap();
        let frame = conn
            .recv_frame(Duration::from_secs(2))
            .unwrap()
            .expect("echo should arrive");
        assert_eq!(frame.as_ref(), br#"{"handle":"open"}"#);

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);

        server.join().unwrap();
    }

    #[test]
    fn open_twice_is_rejected() {
        let (port, server) = spawn_server(|mut socket| {
            let _ = socket.read();
        });
        let mut conn = WsConnection::connect(local(port), ConnectionConfig::default()).unwrap();
        assert!(matches!(
            conn.open(),
            Err(TransportError::NotConnected(ConnectionState::Connected))
        ));
        conn.close();
        server.join().unwrap();
    }

    #[test]
    fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut conn = WsConnection::new(local(port), ConnectionConfig::default());
        let err = conn.open().unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn upgrade_timeout() {
        // Accepts TCP but never answers the upgrade request.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(stream);
        });

        let config = ConnectionConfig {
            connect_timeout: Duration::from_millis(100),
            ..ConnectionConfig::default()
        };
        let started = Instant::now();
        let err = WsConnection::connect(local(port), config).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(started.elapsed() < Duration::from_millis(450));
        server.join().unwrap();
    }

    #[test]
    fn recv_times_out_with_none() {
        let (port, server) = spawn_server(|mut socket| {
            let _ = socket.read();
        });
        let mut conn = WsConnection::connect(local(port), ConnectionConfig::default()).unwrap();
        let started = Instant::now();
        let frame = conn.recv_frame(Duration::from_millis(50)).unwrap();
        assert!(frame.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(conn.is_connected());
        conn.close();
        server.join().unwrap();
    }

    #[test]
    fn peer_drop_surfaces_connection_lost() {
        let (port, server) = spawn_server(drop);
        let mut conn = WsConnection::connect(local(port), ConnectionConfig::default()).unwrap();
        server.join().unwrap();

        let err = loop {
            match conn.recv_frame(Duration::from_millis(200)) {
                Ok(None) => continue,
                Ok(Some(_)) => panic!("no frame expected"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, TransportError::ConnectionLost(_)));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(matches!(
            conn.send_text("{}"),
            Err(TransportError::NotConnected(ConnectionState::Closed))
        ));
    }

    #[test]
    fn oversized_send_rejected_without_io() {
        let (port, server) = spawn_server(|mut socket| {
            let _ = socket.read();
        });
        let config = ConnectionConfig {
            max_message_size: 8,
            ..ConnectionConfig::default()
        };
        let mut conn = WsConnection::connect(local(port), config).unwrap();
        let err = conn.send_text(r#"{"handle":"write"}"#).unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { size: 18, max: 8 }));
        assert!(conn.is_connected());
        conn.close();
        server.join().unwrap();
    }

    #[test]
    fn frames_until_peer_close() {
        let (port, server) = spawn_server(|mut socket| {
            for i in 0..3 {
                socket
                    .send(Message::Text(format!("{{\"n\":{i}}}")))
                    .unwrap();
            }
            socket.close(None).unwrap();
            while socket.read().is_ok() {}
        });

        let mut conn = WsConnection::connect(local(port), ConnectionConfig::default()).unwrap();
        let frames: Vec<Bytes> = conn.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].as_ref(), br#"{"n":2}"#);
        assert!(conn.closed_by_peer());
        assert_eq!(conn.state(), ConnectionState::Closed);
        server.join().unwrap();
    }

    #[test]
    fn ping_is_not_a_frame() {
        let (port, server) = spawn_server(|mut socket| {
            socket.send(Message::Ping(b"hb".to_vec())).unwrap();
            socket.send(Message::Text("{}".to_string())).unwrap();
            let _ = socket.read();
        });
        let mut conn = WsConnection::connect(local(port), ConnectionConfig::default()).unwrap();
        let frame = conn.recv_frame(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"{}");
        conn.close();
        server.join().unwrap();
    }
}
