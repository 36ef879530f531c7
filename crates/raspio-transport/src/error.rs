/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint port could not be resolved for a resource.
    #[error("cannot resolve endpoint for {service_path}/{resource} on {host}: {reason}")]
    Resolve {
        host: String,
        service_path: String,
        resource: String,
        reason: String,
    },

    /// The host name did not resolve to any socket address.
    #[error("cannot resolve address {host}:{port}: {source}")]
    Address {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// TCP connect or WebSocket upgrade did not complete.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The connection failed after it had been established.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("connection is {0}")]
    NotConnected(crate::traits::ConnectionState),

    /// An outbound message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the underlying socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
