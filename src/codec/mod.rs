//! Codec module: value transforms and message encoding.
//!
//! - [`Codec`] - freeze/thaw between live values and wire values
//! - [`JsonCodec`] - whole-message JSON encoding
//!
//! # Design
//!
//! The two layers are independent: freeze/thaw works on `serde_json::Value`
//! trees and knows about handles and the registry, while `JsonCodec` only
//! turns a [`WireMessage`](crate::protocol::WireMessage) into bytes and back.

mod freeze;
mod json;

pub use freeze::{freeze_handle, Codec, HANDLE_TAG};
pub use json::JsonCodec;
pub(crate) use json::truncate_for_log;
