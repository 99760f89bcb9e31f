/// Errors that can occur in the transport layer.
///
/// None of these are fatal to the client: the supervisor turns every one
/// of them into a log line and, where it applies, a reconnection attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the socket (TCP connect or WebSocket upgrade) failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The connection was closed, or the task that owned it is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data (or a ping) failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}
