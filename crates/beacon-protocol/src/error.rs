//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Each layer of Beacon defines its own error enum; a `ProtocolError`
/// always means the problem is in serialization or message shape, not in
/// networking or room state.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into wire text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type` tag, a
    /// missing field, or a field of the wrong type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but is invalid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
