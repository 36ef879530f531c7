use std::time::Duration;

use raspio_codec::{Payload, Request};
use raspio_session::{Session, SessionConfig};
use raspio_transport::{Endpoint, EndpointResolver, FrameTransport, ResourceTarget, WsConnection};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::Result;
use crate::reply;

pub const SERVICE_PATH: &str = "serial";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N")]
    None,
    #[serde(rename = "E")]
    Even,
    #[serde(rename = "O")]
    Odd,
    #[serde(rename = "M")]
    Mark,
    #[serde(rename = "S")]
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl Serialize for StopBits {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StopBits::One => serializer.serialize_u8(1),
            StopBits::OnePointFive => serializer.serialize_f32(1.5),
            StopBits::Two => serializer.serialize_u8(2),
        }
    }
}

/// Which buffers a flush discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    Input,
    Output,
    Both,
}

impl Serialize for FlushTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            FlushTarget::Input => 1,
            FlushTarget::Output => 2,
            FlushTarget::Both => 3,
        })
    }
}

/// Port settings sent with the init request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerialConfig {
    pub baudrate: u32,
    pub bytesize: u8,
    pub parity: Parity,
    pub stopbits: StopBits,
    /// Read timeout applied by the daemon. Sent in seconds.
    #[serde(serialize_with = "seconds")]
    pub timeout: Duration,
}

impl SerialConfig {
    /// 8N1 at `baudrate` with a one second read timeout.
    pub fn new(baudrate: u32) -> Self {
        Self {
            baudrate,
            bytesize: 8,
            parity: Parity::None,
            stopbits: StopBits::One,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Session settings for this port: a call may spend the whole read
    /// timeout on the daemon side, so replies get twice as long.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default().with_timeout(self.timeout.saturating_mul(2))
    }
}

fn seconds<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Requests understood by the daemon's serial service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "handle", rename_all = "lowercase")]
pub enum SerialRequest {
    Init {
        port: String,
        #[serde(flatten)]
        config: SerialConfig,
    },
    Close {
        port: String,
    },
    Read {
        size: usize,
    },
    Write {
        data: Payload,
    },
    Flush {
        #[serde(rename = "where")]
        target: FlushTarget,
    },
}

impl Request for SerialRequest {
    fn handle(&self) -> &str {
        match self {
            SerialRequest::Init { .. } => "init",
            SerialRequest::Close { .. } => "close",
            SerialRequest::Read { .. } => "read",
            SerialRequest::Write { .. } => "write",
            SerialRequest::Flush { .. } => "flush",
        }
    }
}

/// An open serial port such as `/dev/ttyUSB0`.
pub struct Serial<T: FrameTransport = WsConnection> {
    session: Session<T>,
    port: String,
}

impl Serial<WsConnection> {
    /// Open `port` with a session timeout of twice the port's read timeout.
    pub fn open<R: EndpointResolver + ?Sized>(
        resolver: &R,
        host: &str,
        port: impl Into<String>,
        config: SerialConfig,
    ) -> Result<Self> {
        let session_config = config.session_config();
        Self::open_with(resolver, host, port, config, session_config)
    }

    pub fn open_with<R: EndpointResolver + ?Sized>(
        resolver: &R,
        host: &str,
        port: impl Into<String>,
        config: SerialConfig,
        session_config: SessionConfig,
    ) -> Result<Self> {
        let port = port.into();
        let target = ResourceTarget::new(host, SERVICE_PATH, port.clone());
        let (init, close) = lifecycle(&port, config);
        let session = Session::open(resolver, &target, &init, &close, session_config)?;
        Ok(Self { session, port })
    }
}

impl<T: FrameTransport> Serial<T> {
    pub fn with_transport(
        endpoint: Endpoint,
        transport: T,
        port: impl Into<String>,
        config: SerialConfig,
        session_config: SessionConfig,
    ) -> Result<Self> {
        let port = port.into();
        let (init, close) = lifecycle(&port, config);
        let session = Session::with_transport(endpoint, transport, &init, &close, session_config)?;
        Ok(Self { session, port })
    }

    /// Read up to `size` bytes. Fewer are returned if the read timeout expires.
    pub fn read(&self, size: usize) -> Result<Payload> {
        debug!(port = %self.port, size, "serial read");
        reply::bytes(self.session.call(&SerialRequest::Read { size })?)
    }

    /// Returns the bytes written.
    pub fn write(&self, data: &[u8]) -> Result<u64> {
        debug!(port = %self.port, len = data.len(), "serial write");
        let ack = self.session.call(&SerialRequest::Write {
            data: Payload::from(data),
        })?;
        reply::count(ack)
    }

    pub fn flush(&self) -> Result<()> {
        self.flush_target(FlushTarget::Both)
    }

    pub fn flush_input(&self) -> Result<()> {
        self.flush_target(FlushTarget::Input)
    }

    pub fn flush_output(&self) -> Result<()> {
        self.flush_target(FlushTarget::Output)
    }

    fn flush_target(&self, target: FlushTarget) -> Result<()> {
        reply::accepted(self.session.call(&SerialRequest::Flush { target })?)?;
        Ok(())
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn close(&self) {
        self.session.close();
    }
}

fn lifecycle(port: &str, config: SerialConfig) -> (SerialRequest, SerialRequest) {
    (
        SerialRequest::Init {
            port: port.to_string(),
            config,
        },
        SerialRequest::Close {
            port: port.to_string(),
        },
    )
}
