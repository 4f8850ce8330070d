//! JSON codec for whole wire messages.
//!
//! A message is a JSON array whose first element is the command name. Any
//! other shape is a decoding failure, and decoding failures are fatal to the
//! connection.
//!
//! # Example
//!
//! ```
//! use objwire::codec::JsonCodec;
//! use objwire::protocol::WireMessage;
//! use serde_json::json;
//!
//! let msg = WireMessage::new("return", vec![json!("HI")]);
//! let encoded = JsonCodec::encode(&msg).unwrap();
//! assert_eq!(encoded, br#"["return","HI"]"#);
//!
//! let decoded = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use serde_json::Value as JsonValue;

use crate::error::{BridgeError, Result};
use crate::protocol::WireMessage;

/// JSON codec for wire messages.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a message to JSON bytes (no terminator).
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be serialized.
    #[inline]
    pub fn encode(msg: &WireMessage) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(msg)?)
    }

    /// Decode one message.
    ///
    /// # Errors
    ///
    /// `Json` for invalid JSON, `Protocol` if it is not a non-empty array
    /// starting with a string.
    pub fn decode(bytes: &[u8]) -> Result<WireMessage> {
        let parsed: JsonValue = serde_json::from_slice(bytes)?;

        let JsonValue::Array(items) = parsed else {
            return Err(BridgeError::Protocol(format!(
                "Expected a message array, got: {}",
                truncate_for_log(bytes)
            )));
        };

        let mut items = items.into_iter();
        match items.next() {
            Some(JsonValue::String(command)) => Ok(WireMessage::new(command, items.collect())),
            Some(other) => Err(BridgeError::Protocol(format!(
                "Command name must be a string, got: {}",
                other
            ))),
            None => Err(BridgeError::Protocol("Empty message".to_string())),
        }
    }
}

/// First bytes of a payload, lossily decoded, for error messages.
pub(crate) fn truncate_for_log(bytes: &[u8]) -> String {
    const LIMIT: usize = 80;
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(LIMIT)]);
    if bytes.len() > LIMIT {
        format!("{}...", text)
    } else {
        text.into_owned()
    }
}
