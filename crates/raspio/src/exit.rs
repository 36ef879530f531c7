use std::fmt;

use raspio_codec::DecodeError;
use raspio_device::DeviceError;
use raspio_session::{CallError, OpenError};
use raspio_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Resolve { .. } | TransportError::Address { .. } => USAGE,
        TransportError::MessageTooLarge { .. } => DATA_INVALID,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn call_error(context: &str, err: CallError) -> CliError {
    let code = match &err {
        CallError::Timeout(_) | CallError::Cancelled(_) => TIMEOUT,
        CallError::Decode(_) => DATA_INVALID,
        CallError::Encode(_) => USAGE,
        CallError::ConnectionLost(_) => TRANSPORT_ERROR,
        CallError::Transport(TransportError::MessageTooLarge { .. }) => DATA_INVALID,
        CallError::Transport(_) => TRANSPORT_ERROR,
        CallError::Closed | CallError::InProgress | CallError::Stale(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn open_error(context: &str, err: OpenError) -> CliError {
    match err {
        OpenError::Resolve(err) | OpenError::Connect(err) => transport_error(context, err),
        OpenError::Call(err) => call_error(context, err),
        OpenError::Rejected(reason) => {
            CliError::new(FAILURE, format!("{context}: rejected by daemon: {reason}"))
        }
    }
}

pub fn decode_error(context: &str, err: DecodeError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::Open(err) => open_error(context, err),
        DeviceError::Call(err) => call_error(context, err),
        DeviceError::Decode(err) => decode_error(context, err),
        DeviceError::Rejected(reason) => {
            CliError::new(FAILURE, format!("{context}: rejected by daemon: {reason}"))
        }
    }
}
