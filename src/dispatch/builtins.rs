//! Built-in commands: `call`, `global`, `import`, `delete`.

use std::future::ready;

use super::{Command, CommandContext};
use crate::error::{BridgeError, Result};
use crate::value::{BoxFuture, ObjectRef, Value};

/// Positional argument `index` of a built-in command.
fn arg(command: &str, args: &[Value], index: usize) -> Result<Value> {
    args.get(index).cloned().ok_or_else(|| {
        BridgeError::InvalidArgument(format!("{} requires argument {}", command, index))
    })
}

/// Positional argument `index` as a name.
fn name_arg(command: &str, args: &[Value], index: usize) -> Result<String> {
    match arg(command, args, index)? {
        Value::String(name) => Ok(name),
        other => Err(BridgeError::InvalidArgument(format!(
            "{} argument {} must be a string, not {}",
            command,
            index,
            other.type_name()
        ))),
    }
}

/// `call(target, method, ...args)`: invoke a method on a thawed target.
pub(crate) struct Call;

impl Command for Call {
    fn execute(&self, ctx: CommandContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let target = match arg(ctx.command(), &args, 0) {
            Ok(target) => target,
            Err(e) => return Box::pin(ready(Err(e))),
        };
        let method = match name_arg(ctx.command(), &args, 1) {
            Ok(method) => method,
            Err(e) => return Box::pin(ready(Err(e))),
        };

        tracing::debug!("call {} on {}", method, target.type_name());
        target.invoke(method, args.into_iter().skip(2).collect())
    }
}

/// `global(name)`: look a name up through the resolver.
pub(crate) struct Global;

impl Command for Global {
    fn execute(&self, ctx: CommandContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let result = name_arg(ctx.command(), &args, 0).and_then(|name| ctx.resolver().lookup_global(&name));
        Box::pin(ready(result))
    }
}

/// `import(name)`: load a module through the resolver.
pub(crate) struct Import;

impl Command for Import {
    fn execute(&self, ctx: CommandContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let result = name_arg(ctx.command(), &args, 0).and_then(|name| ctx.resolver().load_module(&name));
        Box::pin(ready(result))
    }
}

/// `delete(ref)`: drop the registry entry of a local object.
pub(crate) struct Delete;

impl Command for Delete {
    fn execute(&self, ctx: CommandContext, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        let result = arg(ctx.command(), &args, 0).and_then(|target| match target {
            Value::Object(ObjectRef::Local(obj)) => {
                let id = ctx.registry().delete(&obj)?;
                tracing::debug!("deleted {} object with id {}", obj.type_name(), id);
                Ok(Value::Null)
            }
            Value::Object(ObjectRef::Remote(proxy)) => Err(BridgeError::NotFound(format!(
                "{} is not owned by {}",
                proxy.handle(),
                ctx.instance()
            ))),
            other => Err(BridgeError::NotFound(format!(
                "{} value is not a registered object",
                other.type_name()
            ))),
        });
        Box::pin(ready(result))
    }
}
