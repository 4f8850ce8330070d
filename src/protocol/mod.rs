//! Protocol module - message shape and line framing.
//!
//! - [`WireMessage`] - `[command, ...args]` with command-name constants
//! - [`LineBuffer`] - splits the byte stream into one message per line

mod line_buffer;
mod message;

pub use line_buffer::{LineBuffer, DEFAULT_MAX_LINE_LENGTH};
pub use message::{commands, WireMessage};
