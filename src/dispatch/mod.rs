//! Dispatch module - incoming command handling.
//!
//! Provides:
//! - [`CommandTable`] - maps command names to handlers
//! - [`CommandContext`] - what a handler can reach besides its arguments
//! - [`Resolver`] / [`Namespace`] - lookup behind `global` and `import`
//!
//! # Example
//!
//! ```ignore
//! use objwire::dispatch::{CommandTable, Namespace};
//! use objwire::value::Value;
//!
//! let mut table = CommandTable::with_builtins();
//!
//! table.register_fn("version", |_ctx, _args| async {
//!     Ok(Value::from(env!("CARGO_PKG_VERSION")))
//! })?;
//! ```

mod builtins;
mod context;
mod resolver;
mod table;

pub use context::CommandContext;
pub use resolver::{Namespace, Resolver};
pub use table::{Command, CommandTable, FnCommand};
