//! Wire messages: `[command, arg1, arg2, ...]`.
//!
//! The first element is always the command name and is never frozen; the
//! remaining elements are positional, already-frozen arguments.

use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value as JsonValue;

/// Command names understood by every endpoint.
pub mod commands {
    /// Invoke a method on an object: `call(target, method, ...args)`.
    pub const CALL: &str = "call";
    /// Read a value from the global namespace: `global(name)`.
    pub const GLOBAL: &str = "global";
    /// Load a module: `import(name)`.
    pub const IMPORT: &str = "import";
    /// Drop a registry entry: `delete(ref)`.
    pub const DELETE: &str = "delete";
    /// Successful reply to the most recent open call.
    pub const RETURN: &str = "return";
    /// Failed reply to the most recent open call.
    pub const ERROR: &str = "error";

    /// Protocol-internal names that can never be registered as commands.
    pub fn is_reserved(name: &str) -> bool {
        name == RETURN || name == ERROR
    }
}

/// A decoded (or to-be-encoded) wire message.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    /// Command name.
    pub command: String,
    /// Frozen positional arguments.
    pub args: Vec<JsonValue>,
}

impl WireMessage {
    /// Create a new message.
    pub fn new(command: impl Into<String>, args: Vec<JsonValue>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Check if this is a `return` or `error` reply.
    pub fn is_reply(&self) -> bool {
        commands::is_reserved(&self.command)
    }

    /// Split into the command and the first argument (null if absent).
    ///
    /// Replies carry exactly one payload; extra elements are ignored.
    pub fn into_reply_payload(self) -> (String, JsonValue) {
        let payload = self.args.into_iter().next().unwrap_or(JsonValue::Null);
        (self.command, payload)
    }
}

impl Serialize for WireMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.args.len() + 1))?;
        seq.serialize_element(&self.command)?;
        for arg in &self.args {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}
