//! Error types for the protocol layer.
//!
//! Each crate in Crux defines its own error enum. When you see a
//! `DecodeError`, you know the problem is the bytes themselves, not the
//! network that delivered them or the connection that owns them.

/// Errors that can occur while decoding a wire payload.
///
/// Decoding never panics and never reads past the end of the buffer:
/// every malformed input maps to one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ended before a field (or a declared count/length of
    /// fields) could be read.
    ///
    /// `offset` is where the read started, `needed` how many bytes the
    /// read required, `available` how many were left at that point.
    #[error(
        "payload truncated at byte {offset}: needed {needed} bytes, {available} available"
    )]
    Truncated {
        offset: usize,
        needed: u64,
        available: usize,
    },

    /// A player name was not valid UTF-8.
    ///
    /// The decoder is strict: it never substitutes replacement
    /// characters for bad sequences.
    #[error("invalid UTF-8 text at byte {offset}: {source}")]
    InvalidText {
        offset: usize,
        #[source]
        source: std::str::Utf8Error,
    },
}

impl DecodeError {
    /// Returns `true` for [`DecodeError::Truncated`].
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
