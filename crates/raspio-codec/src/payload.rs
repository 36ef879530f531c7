use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecodeError;

/// A byte buffer carried as a canonical base64 string on the wire.
///
/// Standard alphabet with padding. Anything else is rejected on decode.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Decode a canonical base64 string.
    pub fn from_base64(encoded: &str) -> Result<Self, DecodeError> {
        STANDARD
            .decode(encoded)
            .map(|bytes| Self(Bytes::from(bytes)))
            .map_err(|err| DecodeError::InvalidPayload(err.to_string()))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload(<{} bytes>)", self.0.len())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_base64_string() {
        let payload = Payload::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, "\"3q2+7w==\"");
    }

    #[test]
    fn deserializes_canonical_base64() {
        let payload: Payload = serde_json::from_str("\"AAEC\"").unwrap();
        assert_eq!(payload.as_bytes(), &[0, 1, 2]);
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn rejects_legacy_python_bytes_repr() {
        // str(base64.b64encode(b"\x00\x01\x02")) on Python 3.
        let result = Payload::from_base64("b'AAEC'");
        assert!(matches!(result, Err(DecodeError::InvalidPayload(_))));
    }

    #[test]
    fn rejects_missing_padding() {
        assert!(Payload::from_base64("3q2+7w").is_err());
    }

    #[test]
    fn empty_payload() {
        let payload = Payload::default();
        assert!(payload.is_empty());
        assert_eq!(payload.to_base64(), "");
        assert_eq!(Payload::from_base64("").unwrap(), payload);
    }

    #[test]
    fn debug_hides_contents() {
        let payload = Payload::from(&b"secret"[..]);
        assert_eq!(format!("{payload:?}"), "Payload(<6 bytes>)");
    }
}
