//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
///
/// A decode failure means the peer sent something unparseable or a
/// message missing a required field. The server logs it and drops the
/// frame; the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, unknown `type`, or a
    /// missing/mistyped field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
