//! WebSocket transport for the raspio client.
//!
//! Owns exactly one socket to one remote resource endpoint:
//! - endpoint resolution (`host`, service path, resource name) to `ws://host:port/path`
//! - blocking connect with a bounded WebSocket upgrade
//! - text frame send and timed frame receive
//!
//! This is the lowest layer of raspio. Correlation of requests and replies
//! lives one layer up and only sees the [`FrameTransport`] trait defined here.

pub mod endpoint;
pub mod error;
pub mod traits;
pub mod ws;

pub use endpoint::{resolve_endpoint, Endpoint, EndpointResolver, FixedPort, PortMap, ResourceTarget};
pub use error::{Result, TransportError};
pub use traits::{ConnectionState, FrameTransport};
pub use ws::{ConnectionConfig, Frames, WsConnection, DEFAULT_MAX_MESSAGE_SIZE};
