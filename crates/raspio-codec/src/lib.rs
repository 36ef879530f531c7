//! Message codec for the raspio wire protocol.
//!
//! Every message is a single UTF-8 JSON object:
//! - requests carry a `"handle"` naming the remote operation plus a fixed
//!   set of operation-specific properties
//! - replies carry `"ack"` (success flag) and an opaque `"data"` value
//! - byte buffers travel as canonical base64 strings
//!
//! Encoding and decoding are pure and never panic; failures come back as
//! [`EncodeError`] or [`DecodeError`].

pub mod ack;
pub mod error;
pub mod payload;
pub mod request;

pub use ack::{decode, encode_ack, Ack, ACK_PROPERTIES};
pub use error::{DecodeError, EncodeError};
pub use payload::Payload;
pub use request::{encode, RawRequest, Request, HANDLE_KEY};
