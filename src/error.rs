//! Error types for objwire.

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error on the underlying channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed message or framing violation. Fatal to the connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No live registry entry for the given handle id or object.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The peer's handler failed; carries the peer's stringified reason.
    #[error("{0}")]
    Remote(String),

    /// A local object or command failed; the message is sent as-is.
    #[error("{0}")]
    Failed(String),

    /// The target object does not answer the requested method.
    #[error("'{target}' object has no method '{method}'")]
    NoSuchMethod {
        /// Type name of the target.
        target: String,
        /// Requested method name.
        method: String,
    },

    /// A command or method received arguments it cannot use.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `global` asked for a name the resolver does not know.
    #[error("Unknown global: '{0}'")]
    UnknownGlobal(String),

    /// `import` asked for a module the resolver cannot load.
    #[error("No module named '{0}'")]
    ModuleNotFound(String),

    /// Attempt to register a protocol-internal command name.
    #[error("Command name '{0}' is reserved")]
    ReservedCommand(String),

    /// A reply arrived with no open pending call. Fatal to the connection.
    #[error("Protocol desync: {0}")]
    ProtocolDesync(String),

    /// The channel or the endpoint owning a proxy has gone away.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl BridgeError {
    /// Build a plain application failure.
    pub fn failed(message: impl Into<String>) -> Self {
        BridgeError::Failed(message.into())
    }

    /// Text sent to the peer inside an `error` reply.
    ///
    /// Remote failures pass through verbatim so a reason bubbling through
    /// several hops is not prefixed again at each one.
    pub fn reply_text(&self) -> String {
        match self {
            BridgeError::Remote(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
