//! Transport module - socket glue around [`Endpoint`](crate::Endpoint).
//!
//! The bridge itself runs over any `AsyncRead`/`AsyncWrite` pair; this
//! module only covers the common TCP case.

mod tcp;

pub use tcp::{connect, Server};
