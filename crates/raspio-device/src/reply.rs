use raspio_codec::{Ack, DecodeError, Payload};

use crate::error::{DeviceError, Result};

pub(crate) fn accepted(ack: Ack) -> Result<Ack> {
    if ack.ack {
        Ok(ack)
    } else {
        Err(DeviceError::Rejected(ack.reason()))
    }
}

/// A positive acknowledgment carrying base64 bytes.
pub(crate) fn bytes(ack: Ack) -> Result<Payload> {
    Ok(accepted(ack)?.data_bytes()?)
}

/// A positive acknowledgment carrying a byte count.
pub(crate) fn count(ack: Ack) -> Result<u64> {
    accepted(ack)?
        .data_count()
        .ok_or(DeviceError::Decode(DecodeError::InvalidProperty {
            key: "data",
            expected: "a byte count",
        }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn negative_ack_is_rejected() {
        let err = bytes(Ack::failure("i2c bus error")).unwrap_err();
        assert!(matches!(err, DeviceError::Rejected(ref r) if r == "i2c bus error"));
        assert_eq!(err.reason(), Some("i2c bus error"));
    }

    #[test]
    fn count_requires_integer() {
        assert_eq!(count(Ack::success(7)).unwrap(), 7);
        assert!(matches!(
            count(Ack::success("7")),
            Err(DeviceError::Decode(DecodeError::InvalidProperty { .. }))
        ));
    }

    #[test]
    fn bytes_decode_base64() {
        let payload = bytes(Ack::success(json!("3q2+7w=="))).unwrap();
        assert_eq!(payload.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(
            bytes(Ack::success(json!("b'3q2+7w=='"))),
            Err(DeviceError::Decode(_))
        ));
    }
}
