use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EncodeError;

/// Key naming the remote operation in every message.
pub const HANDLE_KEY: &str = "handle";

/// A typed request.
///
/// Peripheral request sets are usually serde enums tagged on `"handle"`, one
/// variant per operation, so every required property is a struct field and a
/// missing one is a compile error rather than a runtime check.
pub trait Request: Serialize {
    /// The operation this request invokes (`"open"`, `"read"`, ...).
    fn handle(&self) -> &str;
}

impl<R: Request + ?Sized> Request for &R {
    fn handle(&self) -> &str {
        (**self).handle()
    }
}

/// An untyped request: a handle plus arbitrary JSON properties.
///
/// Used where the property set is only known at runtime, e.g. the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRequest {
    handle: String,
    #[serde(flatten)]
    properties: Map<String, Value>,
}

impl RawRequest {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            properties: Map::new(),
        }
    }

    /// Add a property. A `"handle"` key is ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != HANDLE_KEY {
            self.properties.insert(key, value.into());
        }
        self
    }

    /// Build from a JSON object that carries its own string `"handle"`.
    pub fn from_value(value: Value) -> Result<Self, EncodeError> {
        let Value::Object(mut properties) = value else {
            return Err(EncodeError::NotAnObject);
        };
        match properties.remove(HANDLE_KEY) {
            Some(Value::String(handle)) => Ok(Self { handle, properties }),
            other => Err(EncodeError::HandleMismatch {
                declared: String::new(),
                encoded: other.map(|value| value.to_string()),
            }),
        }
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }
}

impl Request for RawRequest {
    fn handle(&self) -> &str {
        &self.handle
    }
}

/// Encode a request into its canonical wire text.
///
/// The result is a JSON object with sorted keys whose `"handle"` equals
/// [`Request::handle`]; a request that serializes without one gets it added.
/// Null properties are rejected instead of being sent.
pub fn encode<R: Request + ?Sized>(request: &R) -> Result<String, EncodeError> {
    let Value::Object(mut object) = serde_json::to_value(request)? else {
        return Err(EncodeError::NotAnObject);
    };

    let declared = request.handle();
    match object.get(HANDLE_KEY) {
        None => {
            object.insert(HANDLE_KEY.to_string(), Value::String(declared.to_string()));
        }
        Some(Value::String(encoded)) if encoded == declared => {}
        Some(other) => {
            return Err(EncodeError::HandleMismatch {
                declared: declared.to_string(),
                encoded: Some(match other {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            });
        }
    }

    if let Some((key, _)) = object.iter().find(|(_, value)| value.is_null()) {
        return Err(EncodeError::MissingProperty(key.clone()));
    }

    Ok(serde_json::to_string(&Value::Object(object))?)
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;

    use super::*;
    use crate::payload::Payload;

    #[derive(Serialize)]
    #[serde(tag = "handle", rename_all = "lowercase")]
    enum Demo {
        Read { size: u32 },
        Write { data: Payload },
    }

    impl Request for Demo {
        fn handle(&self) -> &str {
            match self {
                Demo::Read { .. } => "read",
                Demo::Write { .. } => "write",
            }
        }
    }

    #[derive(Serialize)]
    struct Untagged {
        size: Option<u32>,
    }

    impl Request for Untagged {
        fn handle(&self) -> &str {
            "read"
        }
    }

    #[test]
    fn encodes_tagged_enum() {
        let text = encode(&Demo::Read { size: 4 }).unwrap();
        assert_eq!(text, r#"{"handle":"read","size":4}"#);
    }

    #[test]
    fn encodes_payload_as_base64() {
        let text = encode(&Demo::Write {
            data: Payload::from(vec![1, 2, 3]),
        })
        .unwrap();
        assert_eq!(text, r#"{"data":"AQID","handle":"write"}"#);
    }

    #[test]
    fn adds_missing_handle() {
        let text = encode(&Untagged { size: Some(1) }).unwrap();
        assert_eq!(text, r#"{"handle":"read","size":1}"#);
    }

    #[test]
    fn rejects_null_property() {
        let err = encode(&Untagged { size: None }).unwrap_err();
        assert!(matches!(err, EncodeError::MissingProperty(key) if key == "size"));
    }

    #[test]
    fn rejects_non_object() {
        struct Scalar;
        impl Serialize for Scalar {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_u8(7)
            }
        }
        impl Request for Scalar {
            fn handle(&self) -> &str {
                "x"
            }
        }
        assert!(matches!(encode(&Scalar), Err(EncodeError::NotAnObject)));
    }

    #[test]
    fn deterministic_key_order() {
        let a = RawRequest::new("xfer").with("speed", 0).with("delay", 5);
        let b = RawRequest::new("xfer").with("delay", 5).with("speed", 0);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
        assert_eq!(
            encode(&a).unwrap(),
            r#"{"delay":5,"handle":"xfer","speed":0}"#
        );
    }

    #[test]
    fn raw_request_from_value() {
        let raw = RawRequest::from_value(json!({"handle": "read", "size": 4})).unwrap();
        assert_eq!(raw.handle(), "read");
        assert_eq!(raw.properties().len(), 1);
        assert_eq!(encode(&raw).unwrap(), r#"{"handle":"read","size":4}"#);
    }

    #[test]
    fn raw_request_requires_string_handle() {
        assert!(RawRequest::from_value(json!({"size": 4})).is_err());
        assert!(RawRequest::from_value(json!({"handle": 1})).is_err());
        assert!(matches!(
            RawRequest::from_value(json!([1, 2])),
            Err(EncodeError::NotAnObject)
        ));
    }

    #[test]
    fn raw_request_ignores_handle_property() {
        let raw = RawRequest::new("open").with("handle", "close");
        assert_eq!(encode(&raw).unwrap(), r#"{"handle":"open"}"#);
    }
}
