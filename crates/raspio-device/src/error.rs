use raspio_codec::DecodeError;
use raspio_session::{CallError, OpenError};

/// Errors returned by peripheral clients.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device could not be opened.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// The call did not produce an acknowledgment.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The daemon answered with a negative acknowledgment.
    #[error("rejected by daemon: {0}")]
    Rejected(String),

    /// The acknowledgment's `data` had an unexpected shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl DeviceError {
    /// Server-reported reason for a refused open or a negative acknowledgment.
    pub fn reason(&self) -> Option<&str> {
        match self {
            DeviceError::Rejected(reason) => Some(reason),
            DeviceError::Open(err) => err.reason(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
