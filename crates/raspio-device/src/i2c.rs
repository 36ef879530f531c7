use raspio_codec::{Payload, Request};
use raspio_session::{Session, SessionConfig};
use raspio_transport::{Endpoint, EndpointResolver, FrameTransport, ResourceTarget, WsConnection};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::error::Result;
use crate::reply;

pub const SERVICE_PATH: &str = "i2c";

/// The I2C slave a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct I2cDevice {
    /// Bus name on the daemon host, also the resource the endpoint is resolved for.
    pub bus: String,
    /// Slave address (not the internal register address).
    pub addr: u16,
    pub flags: u16,
    /// Delay between internal operations, in milliseconds.
    pub delay: u32,
    #[serde(serialize_with = "flag")]
    pub tenbit: bool,
    /// Width of the internal register address, in bytes.
    pub iaddr_bytes: u8,
}

impl I2cDevice {
    pub fn new(bus: impl Into<String>, addr: u16) -> Self {
        Self {
            bus: bus.into(),
            addr,
            flags: 0,
            delay: 5,
            tenbit: false,
            iaddr_bytes: 1,
        }
    }

    pub fn with_tenbit(mut self, tenbit: bool) -> Self {
        self.tenbit = tenbit;
        self
    }

    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn with_iaddr_bytes(mut self, iaddr_bytes: u8) -> Self {
        self.iaddr_bytes = iaddr_bytes;
        self
    }
}

fn flag<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

/// How the daemon performs a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferKind {
    /// Plain `read(2)`/`write(2)` on the bus device.
    #[default]
    Plain,
    /// A combined `I2C_RDWR` ioctl transaction.
    Ioctl,
}

impl Serialize for TransferKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            TransferKind::Plain => 0,
            TransferKind::Ioctl => 1,
        })
    }
}

/// Requests understood by the daemon's I2C service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "handle", rename_all = "lowercase")]
pub enum I2cRequest {
    Open {
        device: I2cDevice,
    },
    Close {
        device: I2cDevice,
    },
    Read {
        addr: u32,
        size: usize,
        #[serde(rename = "type")]
        kind: TransferKind,
    },
    Write {
        addr: u32,
        data: Payload,
        #[serde(rename = "type")]
        kind: TransferKind,
    },
}

impl Request for I2cRequest {
    fn handle(&self) -> &str {
        match self {
            I2cRequest::Open { .. } => "open",
            I2cRequest::Close { .. } => "close",
            I2cRequest::Read { .. } => "read",
            I2cRequest::Write { .. } => "write",
        }
    }
}

/// An open I2C slave.
pub struct I2c<T: FrameTransport = WsConnection> {
    session: Session<T>,
    device: I2cDevice,
}

impl I2c<WsConnection> {
    /// Resolve the bus's endpoint on `host` and open `device`.
    pub fn open<R: EndpointResolver + ?Sized>(
        resolver: &R,
        host: &str,
        device: I2cDevice,
        config: SessionConfig,
    ) -> Result<Self> {
        let target = ResourceTarget::new(host, SERVICE_PATH, device.bus.clone());
        let session = Session::open(
            resolver,
            &target,
            &I2cRequest::Open {
                device: device.clone(),
            },
            &I2cRequest::Close {
                device: device.clone(),
            },
            config,
        )?;
        Ok(Self { session, device })
    }
}

impl<T: FrameTransport> I2c<T> {
    /// Open `device` over an already connected transport.
    pub fn with_transport(
        endpoint: Endpoint,
        transport: T,
        device: I2cDevice,
        config: SessionConfig,
    ) -> Result<Self> {
        let session = Session::with_transport(
            endpoint,
            transport,
            &I2cRequest::Open {
                device: device.clone(),
            },
            &I2cRequest::Close {
                device: device.clone(),
            },
            config,
        )?;
        Ok(Self { session, device })
    }

    /// Read `size` bytes starting at internal address `addr`.
    pub fn read(&self, addr: u32, size: usize) -> Result<Payload> {
        self.read_as(addr, size, TransferKind::Plain)
    }

    /// Write `data` at internal address `addr`. Returns the bytes written.
    pub fn write(&self, addr: u32, data: &[u8]) -> Result<u64> {
        self.write_as(addr, data, TransferKind::Plain)
    }

    pub fn ioctl_read(&self, addr: u32, size: usize) -> Result<Payload> {
        self.read_as(addr, size, TransferKind::Ioctl)
    }

    pub fn ioctl_write(&self, addr: u32, data: &[u8]) -> Result<u64> {
        self.write_as(addr, data, TransferKind::Ioctl)
    }

    fn read_as(&self, addr: u32, size: usize, kind: TransferKind) -> Result<Payload> {
        debug!(bus = %self.device.bus, addr, size, ?kind, "i2c read");
        let ack = self.session.call(&I2cRequest::Read { addr, size, kind })?;
        reply::bytes(ack)
    }

    fn write_as(&self, addr: u32, data: &[u8], kind: TransferKind) -> Result<u64> {
        debug!(bus = %self.device.bus, addr, len = data.len(), ?kind, "i2c write");
        let ack = self.session.call(&I2cRequest::Write {
            addr,
            data: Payload::from(data),
            kind,
        })?;
        reply::count(ack)
    }

    pub fn device(&self) -> &I2cDevice {
        &self.device
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Release the device. Also done on drop.
    pub fn close(&self) {
        self.session.close();
    }
}
