use std::net::SocketAddr;

/// Failures on the link's transport sockets.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connect attempt was refused or otherwise failed.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The connect attempt timed out. Recoverable; the caller may try again.
    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: SocketAddr },

    /// The remote endpoint closed the connection (zero-length read).
    #[error("peer closed the connection")]
    PeerClosed,

    /// An I/O error occurred on an established connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("framing error: {0}")]
    Framing(#[from] groundlink_wire::WireError),

    /// Operation attempted while the connection is idle.
    #[error("not connected")]
    NotConnected,

    /// The worker thread has shut down and can no longer be reached.
    #[error("link worker has shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, LinkError>;
