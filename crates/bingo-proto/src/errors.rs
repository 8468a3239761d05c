//! Protocol error types.

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding or encoding frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Frame exceeds [`crate::MAX_FRAME_LEN`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the rejected frame
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Frame is not a JSON object with a string `type` field.
    #[error("missing or invalid message type: {0}")]
    MissingType(String),

    /// Known message kind with missing or mistyped fields.
    #[error("malformed {kind} message: {reason}")]
    Malformed {
        /// Message kind taken from the `type` field
        kind: String,
        /// Decoder error
        reason: String,
    },

    /// Outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),
}
