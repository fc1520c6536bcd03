//! Error types for the client layer.

use crux_protocol::DecodeError;
use crux_transport::TransportError;

/// Errors that can occur while managing the client connection.
///
/// None of these are fatal to the process. Transport and decode failures
/// are also recorded as text in the shared state so a UI can show them.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The manager was built outside a Tokio runtime, so it has nowhere
    /// to run connection tasks.
    #[error("no Tokio runtime available: build the connection manager inside a runtime")]
    NoRuntime,

    /// [`ConnectionManager::shutdown`](crate::ConnectionManager::shutdown)
    /// was called. The manager will not connect again.
    #[error("connection manager has been shut down")]
    ShutDown,

    /// The transport failed (refused, dropped, send or receive error).
    /// Recoverable with `reconnect()`.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A snapshot could not be decoded. The previous snapshot stays
    /// published and the connection stays open.
    #[error("failed to decode game state: {0}")]
    Decode(#[from] DecodeError),
}
