//! Command table for dispatching incoming messages by name.
//!
//! The table maps command names to handlers. The built-in commands
//! (`call`, `global`, `import`, `delete`) are installed by
//! [`CommandTable::with_builtins`]; applications add their own next to
//! them. `return` and `error` are protocol-internal and cannot be
//! registered.
//!
//! # Example
//!
//! ```
//! use objwire::dispatch::CommandTable;
//! use objwire::value::Value;
//!
//! let mut table = CommandTable::with_builtins();
//!
//! table
//!     .register_fn("ping", |_ctx, _args| async { Ok(Value::from("pong")) })
//!     .unwrap();
//!
//! assert!(table.contains("ping"));
//! assert!(table.register_fn("return", |_ctx, _args| async { Ok(Value::Null) }).is_err());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::builtins;
use super::CommandContext;
use crate::error::{BridgeError, Result};
use crate::protocol::commands;
use crate::value::{BoxFuture, Value};

/// Trait for command handlers.
///
/// The returned value is frozen into a `return` reply; an error becomes an
/// `error` reply carrying its text.
pub trait Command: Send + Sync + 'static {
    /// Execute the command with thawed positional arguments.
    fn execute(&self, ctx: CommandContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>>;
}

/// Adapter turning an async closure into a [`Command`].
pub struct FnCommand<F, Fut>
where
    F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnCommand<F, Fut>
where
    F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    /// Wrap a closure.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Command for FnCommand<F, Fut>
where
    F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn execute(&self, ctx: CommandContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        Box::pin((self.handler)(ctx, args))
    }
}

/// Table mapping command names to handlers.
#[derive(Clone, Default)]
pub struct CommandTable {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the four built-in commands.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.insert(commands::CALL, Arc::new(builtins::Call));
        table.insert(commands::GLOBAL, Arc::new(builtins::Global));
        table.insert(commands::IMPORT, Arc::new(builtins::Import));
        table.insert(commands::DELETE, Arc::new(builtins::Delete));
        table
    }

    /// Register a command, replacing any previous handler of that name.
    ///
    /// # Errors
    ///
    /// `ReservedCommand` for `return` and `error`.
    pub fn register(&mut self, name: &str, command: Arc<dyn Command>) -> Result<()> {
        if commands::is_reserved(name) {
            return Err(BridgeError::ReservedCommand(name.to_string()));
        }
        if self.insert(name, command).is_some() {
            tracing::debug!("command '{}' replaced", name);
        }
        Ok(())
    }

    /// Register an async closure as a command.
    ///
    /// # Errors
    ///
    /// `ReservedCommand` for `return` and `error`.
    pub fn register_fn<F, Fut>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(CommandContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(name, Arc::new(FnCommand::new(handler)))
    }

    fn insert(&mut self, name: &str, command: Arc<dyn Command>) -> Option<Arc<dyn Command>> {
        self.commands.insert(name.to_string(), command)
    }

    /// Get the handler for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Check whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the handler for `name`.
    ///
    /// # Errors
    ///
    /// `Protocol` if no handler is registered, otherwise whatever the
    /// handler returns.
    pub async fn dispatch(&self, name: &str, ctx: CommandContext, args: Vec<Value>) -> Result<Value> {
        let command = self
            .get(name)
            .ok_or_else(|| BridgeError::Protocol(format!("Unknown command: {}", name)))?;

        command.execute(ctx, args).await
    }
}
