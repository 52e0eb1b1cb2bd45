//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize a packet.
    #[error("packet encoding failed: {0}")]
    Encode(String),

    /// Failed to deserialize a packet.
    #[error("packet decoding failed: {0}")]
    Decode(String),

    /// A packet carried content of the wrong shape for its type.
    #[error("invalid packet content for '{packet_type}': {reason}")]
    InvalidContent {
        /// The packet type whose content was malformed.
        packet_type: String,
        /// Why the content was rejected.
        reason: String,
    },
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Decode(err.to_string())
        } else {
            ProtocolError::Encode(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = ProtocolError::Decode("unexpected end of input".to_string());
        assert_eq!(
            err.to_string(),
            "packet decoding failed: unexpected end of input"
        );
    }

    #[test]
    fn test_invalid_content_display() {
        let err = ProtocolError::InvalidContent {
            packet_type: "delEntry".to_string(),
            reason: "not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid packet content for 'delEntry': not a number"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let protocol_err: ProtocolError = json_err.into();
        assert!(matches!(protocol_err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProtocolError>();
    }
}
