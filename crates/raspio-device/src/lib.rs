//! Peripheral clients for the raspio daemon.
//!
//! Each peripheral is a thin layer over [`raspio_session::Session`]: it
//! names the service path and resource, builds typed requests, and turns the
//! acknowledgment `data` into bytes or counts. Hardware rules (valid SPI
//! modes, baud rates, addresses) are left to the daemon.

pub mod error;
pub mod i2c;
pub mod serial;
pub mod spi;

mod reply;

pub use error::{DeviceError, Result};
pub use i2c::{I2c, I2cDevice, I2cRequest, TransferKind};
pub use serial::{FlushTarget, Parity, Serial, SerialConfig, SerialRequest, StopBits};
pub use spi::{Spi, SpiConfig, SpiRequest, Transfer};
