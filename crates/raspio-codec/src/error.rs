/// Errors produced while encoding a request.
///
/// An encode failure is a local validation error: nothing is sent.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Serialization itself failed.
    #[error("json encode error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request did not serialize to a JSON object.
    #[error("request must encode to a JSON object")]
    NotAnObject,

    /// A property was present but null.
    #[error("required property '{0}' is null")]
    MissingProperty(String),

    /// The `"handle"` key is absent or does not match the declared handle.
    #[error("request handle mismatch: declared '{declared}', encoded {encoded:?}")]
    HandleMismatch {
        declared: String,
        encoded: Option<String>,
    },
}

/// Errors produced while decoding a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON (or not valid UTF-8).
    #[error("decode error: {0}")]
    Json(String),

    /// The payload is valid JSON but not an object.
    #[error("decode error: expected a JSON object")]
    NotAnObject,

    /// A required property is absent or null.
    #[error("decode error: missing property '{0}'")]
    MissingProperty(&'static str),

    /// A property has the wrong JSON type.
    #[error("decode error: property '{key}' must be {expected}")]
    InvalidProperty {
        key: &'static str,
        expected: &'static str,
    },

    /// A byte payload is not canonical base64.
    #[error("decode error: invalid base64 payload: {0}")]
    InvalidPayload(String),
}
