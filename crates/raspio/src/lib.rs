//! Client for Raspberry Pi peripherals exposed by a raspio daemon.
//!
//! Every peripheral is reached over its own WebSocket connection and spoken
//! to with small JSON requests, one at a time.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoints, resolvers and the blocking WebSocket connection
//! - [`codec`]: request encoding, acknowledgment decoding, base64 payloads
//! - [`session`]: request/reply correlation and device sessions
//! - [`device`]: I2C, SPI and serial clients (behind `device` feature)

/// Re-export transport types.
pub mod transport {
    pub use raspio_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use raspio_codec::*;
}

/// Re-export session types.
pub mod session {
    pub use raspio_session::*;
}

/// Re-export peripheral clients (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use raspio_device::*;
}

pub use raspio_session::{CallError, OpenError, Session, SessionConfig};
pub use raspio_transport::{EndpointResolver, FixedPort, PortMap, ResourceTarget};
