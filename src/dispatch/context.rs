//! Context handed to command handlers.
//!
//! Gives a handler what it needs besides its arguments: the name it was
//! invoked under, this endpoint's codec (and through it the registry), and
//! the resolver behind `global` and `import`.
//!
//! # Example
//!
//! ```ignore
//! async fn whoami(ctx: CommandContext, _args: Vec<Value>) -> Result<Value> {
//!     Ok(Value::from(ctx.instance().as_str()))
//! }
//! ```

use std::sync::{Arc, MutexGuard};

use super::resolver::{Namespace, Resolver};
use crate::codec::Codec;
use crate::registry::{InstanceId, ObjectRegistry};

/// Context passed to command handlers.
///
/// `CommandContext` is `Clone` and cheap to move into spawned tasks.
#[derive(Clone)]
pub struct CommandContext {
    /// Command name as received.
    command: String,
    /// Codec of the endpoint that received the command.
    codec: Arc<Codec>,
    /// Resolver for globals and modules.
    resolver: Arc<dyn Resolver>,
}

impl CommandContext {
    /// Create a context for `command`.
    pub fn new(command: impl Into<String>, codec: Arc<Codec>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            command: command.into(),
            codec,
            resolver,
        }
    }

    /// Create a context with a detached codec and an empty namespace (for
    /// testing handlers without an endpoint).
    pub fn detached(command: impl Into<String>) -> Self {
        Self::new(
            command,
            Arc::new(Codec::detached(InstanceId::generate())),
            Arc::new(Namespace::new()),
        )
    }

    /// Get the command name.
    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Get this endpoint's instance identifier.
    #[inline]
    pub fn instance(&self) -> &InstanceId {
        self.codec.instance()
    }

    /// Get the codec.
    pub fn codec(&self) -> &Arc<Codec> {
        &self.codec
    }

    /// Lock the object registry.
    pub fn registry(&self) -> MutexGuard<'_, ObjectRegistry> {
        self.codec.lock_registry()
    }

    /// Get the resolver.
    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }
}
