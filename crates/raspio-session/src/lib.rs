//! Device sessions over the raspio transport.
//!
//! A [`Session`] binds one WebSocket connection to one remote resource:
//! it is opened by an open-class request, carries caller calls one at a
//! time, and sends a close-class request when released.
//!
//! The wire protocol has no request IDs, so replies are matched by strict
//! ordering: the [`Correlator`] allows exactly one outstanding call and
//! stops accepting calls once a reply may have been missed.

pub mod correlator;
pub mod error;
pub mod session;

pub use correlator::{CallOptions, Correlator, EncodedRequest, Health, PendingCall};
pub use error::{CallError, OpenError, Result};
pub use session::{Session, SessionConfig};

pub use raspio_codec::{Ack, Payload, RawRequest, Request};
pub use raspio_transport::{
    ConnectionConfig, Endpoint, EndpointResolver, FixedPort, FrameTransport, PortMap,
    ResourceTarget, WsConnection,
};
pub use tokio_util::sync::CancellationToken;
