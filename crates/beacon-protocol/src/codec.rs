//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A codec converts between Rust types and wire text. Signaling is a text
//! protocol (browser clients send and receive JSON in WebSocket text
//! frames), so the codec works in `String`s rather than byte buffers.
//! The trait exists so the framing can change (e.g. a compact binary
//! codec for native clients) without touching the server or handler code.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to wire text and decode text back.
///
/// `Send + Sync + 'static` because one codec instance is shared across
/// every connection-handler task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into wire text.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes wire text back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the text is malformed or does
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// This is the production codec: the protocol's opaque relay payloads are
/// already JSON values, so encoding is a straight passthrough for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
