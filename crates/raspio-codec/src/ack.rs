use serde::Serialize;
use serde_json::Value;

use crate::error::{DecodeError, EncodeError};
use crate::payload::Payload;
use crate::request::HANDLE_KEY;

/// Properties every reply must carry with a non-null value.
pub const ACK_PROPERTIES: [&str; 2] = ["ack", "data"];

/// A decoded reply.
///
/// `data` is opaque here: the peripheral that issued the request decides
/// whether it is an error message, a byte count or a base64 buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub ack: bool,
    pub data: Value,
}

impl Ack {
    /// A positive acknowledgment.
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            handle: None,
            ack: true,
            data: data.into(),
        }
    }

    /// A negative acknowledgment carrying the server's reason.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            handle: None,
            ack: false,
            data: Value::String(reason.into()),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// `data` as text, if it is a JSON string.
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_str()
    }

    /// `data` as a non-negative count, if it is an integer.
    pub fn data_count(&self) -> Option<u64> {
        self.data.as_u64()
    }

    /// `data` as a base64 byte buffer.
    pub fn data_bytes(&self) -> Result<Payload, DecodeError> {
        let encoded = self.data.as_str().ok_or(DecodeError::InvalidProperty {
            key: "data",
            expected: "a base64 string",
        })?;
        Payload::from_base64(encoded)
    }

    /// Human-readable failure reason taken from `data`.
    pub fn reason(&self) -> String {
        match &self.data {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    /// `Ok(data)` for a positive acknowledgment, `Err(reason)` otherwise.
    pub fn into_result(self) -> Result<Value, String> {
        if self.ack {
            Ok(self.data)
        } else {
            Err(self.reason())
        }
    }
}

/// Decode one reply payload.
///
/// Fails if the payload is not JSON, not an object, or lacks a non-null
/// `ack`/`data`. Unknown keys are ignored.
pub fn decode(payload: &[u8]) -> Result<Ack, DecodeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|err| DecodeError::Json(err.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let ack = match object.remove("ack") {
        None | Some(Value::Null) => return Err(DecodeError::MissingProperty("ack")),
        Some(Value::Bool(flag)) => flag,
        Some(_) => {
            return Err(DecodeError::InvalidProperty {
                key: "ack",
                expected: "a boolean",
            })
        }
    };

    let data = match object.remove("data") {
        None | Some(Value::Null) => return Err(DecodeError::MissingProperty("data")),
        Some(data) => data,
    };

    let handle = match object.remove(HANDLE_KEY) {
        None | Some(Value::Null) => None,
        Some(Value::String(handle)) => Some(handle),
        Some(_) => {
            return Err(DecodeError::InvalidProperty {
                key: "handle",
                expected: "a string",
            })
        }
    };

    Ok(Ack { handle, ack, data })
}

/// Encode a reply. The inverse of [`decode`].
pub fn encode_ack(ack: &Ack) -> Result<String, EncodeError> {
    if ack.data.is_null() {
        return Err(EncodeError::MissingProperty("data".to_string()));
    }
    Ok(serde_json::to_string(ack)?)
}
