use raspio_codec::{Payload, Request};
use raspio_session::{Session, SessionConfig};
use raspio_transport::{Endpoint, EndpointResolver, FrameTransport, ResourceTarget, WsConnection};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::reply;

pub const SERVICE_PATH: &str = "spi";

/// Bus settings sent with the open request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpiConfig {
    /// Maximum clock, in kHz. Default: 50.
    pub max_speed: u32,
    /// Clock polarity and phase as `[CPOL|CPHA]`, 0 through 3.
    pub mode: u8,
    pub cshigh: bool,
    pub no_cs: bool,
    #[serde(rename = "loop")]
    pub loopback: bool,
    pub lsbfirst: bool,
    pub threewire: bool,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            max_speed: 50,
            mode: 0,
            cshigh: false,
            no_cs: false,
            loopback: false,
            lsbfirst: false,
            threewire: false,
        }
    }
}

/// One full-duplex transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    pub write_data: Payload,
    pub read_size: usize,
    /// Clock override for this transaction; 0 keeps the bus speed.
    pub speed: u32,
    /// Delay between blocks, in microseconds.
    pub delay: u32,
}

impl Transfer {
    pub fn new(write_data: impl Into<Payload>, read_size: usize) -> Self {
        Self {
            write_data: write_data.into(),
            read_size,
            speed: 0,
            delay: 0,
        }
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_delay(mut self, delay_us: u32) -> Self {
        self.delay = delay_us;
        self
    }
}

/// Requests understood by the daemon's SPI service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "handle", rename_all = "lowercase")]
pub enum SpiRequest {
    Open {
        device: String,
        #[serde(flatten)]
        config: SpiConfig,
    },
    Close {
        device: String,
    },
    Read {
        size: usize,
    },
    Write {
        data: Payload,
    },
    /// Chip select is released between blocks.
    Xfer(Transfer),
    /// Chip select is held between blocks.
    Xfer2(Transfer),
}

impl Request for SpiRequest {
    fn handle(&self) -> &str {
        match self {
            SpiRequest::Open { .. } => "open",
            SpiRequest::Close { .. } => "close",
            SpiRequest::Read { .. } => "read",
            SpiRequest::Write { .. } => "write",
            SpiRequest::Xfer(_) => "xfer",
            SpiRequest::Xfer2(_) => "xfer2",
        }
    }
}

/// An open SPI device such as `/dev/spidev0.0`.
pub struct Spi<T: FrameTransport = WsConnection> {
    session: Session<T>,
    device: String,
}

impl Spi<WsConnection> {
    pub fn open<R: EndpointResolver + ?Sized>(
        resolver: &R,
        host: &str,
        device: impl Into<String>,
        spi: SpiConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let device = device.into();
        let target = ResourceTarget::new(host, SERVICE_PATH, device.clone());
        let (open, close) = lifecycle(&device, spi);
        let session = Session::open(resolver, &target, &open, &close, config)?;
        Ok(Self { session, device })
    }
}

impl<T: FrameTransport> Spi<T> {
    pub fn with_transport(
        endpoint: Endpoint,
        transport: T,
        device: impl Into<String>,
        spi: SpiConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let device = device.into();
        let (open, close) = lifecycle(&device, spi);
        let session = Session::with_transport(endpoint, transport, &open, &close, config)?;
        Ok(Self { session, device })
    }

    pub fn read(&self, size: usize) -> Result<Payload> {
        debug!(device = %self.device, size, "spi read");
        reply::bytes(self.session.call(&SpiRequest::Read { size })?)
    }

    /// Returns the bytes written.
    pub fn write(&self, data: &[u8]) -> Result<u64> {
        debug!(device = %self.device, len = data.len(), "spi write");
        let ack = self.session.call(&SpiRequest::Write {
            data: Payload::from(data),
        })?;
        reply::count(ack)
    }

    pub fn xfer(&self, transfer: Transfer) -> Result<Payload> {
        debug!(device = %self.device, read_size = transfer.read_size, "spi xfer");
        reply::bytes(self.session.call(&SpiRequest::Xfer(transfer))?)
    }

    pub fn xfer2(&self, transfer: Transfer) -> Result<Payload> {
        debug!(device = %self.device, read_size = transfer.read_size, "spi xfer2");
        reply::bytes(self.session.call(&SpiRequest::Xfer2(transfer))?)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn close(&self) {
        self.session.close();
    }
}

fn lifecycle(device: &str, config: SpiConfig) -> (SpiRequest, SpiRequest) {
    (
        SpiRequest::Open {
            device: device.to_string(),
            config,
        },
        SpiRequest::Close {
            device: device.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use raspio_codec::encode;

    use super::*;

    #[test]
    fn open_flattens_bus_settings() {
        let (open, close) = lifecycle(
            "/dev/spidev0.0",
            SpiConfig {
                mode: 3,
                loopback: true,
                ..SpiConfig::default()
            },
        );
        assert_eq!(
            encode(&open).unwrap(),
            r#"{"cshigh":false,"device":"/dev/spidev0.0","handle":"open","loop":true,"lsbfirst":false,"max_speed":50,"mode":3,"no_cs":false,"threewire":false}"#
        );
        assert_eq!(
            encode(&close).unwrap(),
            r#"{"device":"/dev/spidev0.0","handle":"close"}"#
        );
    }

    #[test]
    fn xfer_variants_differ_only_in_handle() {
        let transfer = Transfer::new(vec![0x9f], 3).with_speed(1000).with_delay(10);
        let xfer = encode(&SpiRequest::Xfer(transfer.clone())).unwrap();
        let xfer2 = encode(&SpiRequest::Xfer2(transfer)).unwrap();
        assert_eq!(
            xfer,
            r#"{"delay":10,"handle":"xfer","read_size":3,"speed":1000,"write_data":"nw=="}"#
        );
        assert_eq!(xfer2, xfer.replace(r#""xfer""#, r#""xfer2""#));
    }
}
