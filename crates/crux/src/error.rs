//! Unified error type for Crux.

use crux_client::ClientError;
use crux_protocol::DecodeError;
use crux_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `crux` facade crate you deal with this single error
/// type instead of importing errors from each sub-crate. Every variant has
/// a `From` impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CruxError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A snapshot or position update could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A connection-manager error (no runtime, shut down).
    #[error(transparent)]
    Client(#[from] ClientError),
}
