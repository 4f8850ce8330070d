//! Live values exchanged through the bridge.
//!
//! A [`Value`] is the "live" side of the freeze/thaw transform: scalars,
//! sequences and mappings are carried by value, while objects travel as
//! [`ObjectRef`]s, either a local object implementing [`RemoteObject`] or a
//! [`RemoteProxy`] standing in for an object owned by the peer.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use objwire::value::{BoxFuture, Invocation, RemoteObject, Value};
//! use objwire::Result;
//!
//! struct Counter;
//!
//! impl RemoteObject for Counter {
//!     fn type_name(&self) -> &str {
//!         "Counter"
//!     }
//!
//!     fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
//!         Box::pin(async move {
//!             match call.method() {
//!                 "double" => Ok(Value::from(call.i64_arg(0)? * 2)),
//!                 _ => Err(call.no_such_method("Counter")),
//!             }
//!         })
//!     }
//! }
//!
//! let value = Value::object(Counter);
//! assert!(value.as_object().is_some());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Number;

use crate::error::{BridgeError, Result};
use crate::proxy::RemoteProxy;

/// Boxed future returned by object methods and command handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability implemented by every object that can be exposed to the peer.
///
/// The peer addresses methods by name with positional arguments. Unknown
/// methods should fail with [`Invocation::no_such_method`].
pub trait RemoteObject: Send + Sync + 'static {
    /// Short type name used in error messages and logs.
    fn type_name(&self) -> &str {
        "object"
    }

    /// Invoke `call.method()` with `call.args()`.
    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>>;
}

/// A method invocation: method name plus positional arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    method: String,
    args: Vec<Value>,
}

impl Invocation {
    /// Create a new invocation.
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Get the method name.
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get all positional arguments.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Take ownership of the arguments.
    pub fn into_args(self) -> Vec<Value> {
        self.args
    }

    /// Get the argument at `index`, failing if it was not supplied.
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or_else(|| {
            BridgeError::InvalidArgument(format!(
                "{}() missing positional argument {}",
                self.method, index
            ))
        })
    }

    /// Get the argument at `index` as a string.
    pub fn str_arg(&self, index: usize) -> Result<&str> {
        let value = self.arg(index)?;
        value.as_str().ok_or_else(|| {
            BridgeError::InvalidArgument(format!(
                "{}() argument {} must be a string, not {}",
                self.method,
                index,
                value.type_name()
            ))
        })
    }

    /// Get the argument at `index` as an integer.
    pub fn i64_arg(&self, index: usize) -> Result<i64> {
        let value = self.arg(index)?;
        value.as_i64().ok_or_else(|| {
            BridgeError::InvalidArgument(format!(
                "{}() argument {} must be an integer, not {}",
                self.method,
                index,
                value.type_name()
            ))
        })
    }

    /// Build the error for a method the target does not answer.
    pub fn no_such_method(&self, target: &str) -> BridgeError {
        BridgeError::NoSuchMethod {
            target: target.to_string(),
            method: self.method.clone(),
        }
    }
}

/// Reference to an object: owned here, or owned by the peer.
#[derive(Clone)]
pub enum ObjectRef {
    /// A live local object.
    Local(Arc<dyn RemoteObject>),
    /// A stand-in for an object living on the other endpoint.
    Remote(RemoteProxy),
}

impl ObjectRef {
    /// Invoke a method on the referenced object.
    ///
    /// Local objects run in place; proxies forward a `call` to the peer.
    pub fn invoke(&self, method: impl Into<String>, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        match self {
            ObjectRef::Local(obj) => Arc::clone(obj).invoke(Invocation::new(method, args)),
            ObjectRef::Remote(proxy) => proxy.call(method, args),
        }
    }

    /// Type name of the referenced object.
    pub fn type_name(&self) -> &str {
        match self {
            ObjectRef::Local(obj) => obj.type_name(),
            ObjectRef::Remote(_) => "remote proxy",
        }
    }

    /// Get the proxy if this refers to a remote object.
    pub fn as_proxy(&self) -> Option<&RemoteProxy> {
        match self {
            ObjectRef::Remote(proxy) => Some(proxy),
            ObjectRef::Local(_) => None,
        }
    }

    /// Identity comparison: same allocation, or same handle.
    pub fn same_object(&self, other: &ObjectRef) -> bool {
        match (self, other) {
            (ObjectRef::Local(a), ObjectRef::Local(b)) => object_addr(a) == object_addr(b),
            (ObjectRef::Remote(a), ObjectRef::Remote(b)) => a.handle() == b.handle(),
            _ => false,
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Local(obj) => write!(f, "<{} object at {:#x}>", obj.type_name(), object_addr(obj)),
            ObjectRef::Remote(proxy) => write!(f, "{:?}", proxy),
        }
    }
}

/// Address of the object behind an `Arc`, used as its identity.
pub(crate) fn object_addr(obj: &Arc<dyn RemoteObject>) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// A live value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any JSON number.
    Number(Number),
    /// Text.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// String-keyed mapping, passed by value. The key `_remote_proxy` is
    /// reserved for handles and cannot be frozen.
    Map(BTreeMap<String, Value>),
    /// Reference to a local or remote object.
    Object(ObjectRef),
}

impl Value {
    /// Wrap a local object.
    pub fn object<T: RemoteObject>(obj: T) -> Self {
        Value::Object(ObjectRef::Local(Arc::new(obj)))
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Check for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the string if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value if this is an integral number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Get the number as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Get the boolean if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the elements if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the object reference if this is an object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Invoke a method on this value.
    ///
    /// Objects dispatch through [`ObjectRef::invoke`]; strings answer the
    /// built-in text methods. Anything else has no methods.
    pub fn invoke(&self, method: impl Into<String>, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        match self {
            Value::Object(obj) => obj.invoke(method, args),
            Value::String(text) => {
                let result = text_method(text, &Invocation::new(method, args));
                Box::pin(std::future::ready(result))
            }
            other => {
                let err = Invocation::new(method, args).no_such_method(other.type_name());
                Box::pin(std::future::ready(Err(err)))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become null.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<RemoteProxy> for Value {
    fn from(proxy: RemoteProxy) -> Self {
        Value::Object(ObjectRef::Remote(proxy))
    }
}

impl<T: RemoteObject> From<Arc<T>> for Value {
    fn from(obj: Arc<T>) -> Self {
        Value::Object(ObjectRef::Local(obj))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// Methods answered by text, whether a string scalar or a registered string.
fn text_method(text: &str, call: &Invocation) -> Result<Value> {
    match call.method() {
        "toUpperCase" | "upper" => Ok(Value::String(text.to_uppercase())),
        "toLowerCase" | "lower" => Ok(Value::String(text.to_lowercase())),
        "length" | "len" => Ok(Value::from(text.chars().count() as u64)),
        "concat" => {
            let mut out = text.to_string();
            for index in 0..call.args().len() {
                out.push_str(call.str_arg(index)?);
            }
            Ok(Value::String(out))
        }
        _ => Err(call.no_such_method("str")),
    }
}

impl RemoteObject for String {
    fn type_name(&self) -> &str {
        "str"
    }

    fn invoke(self: Arc<Self>, call: Invocation) -> BoxFuture<'static, Result<Value>> {
        Box::pin(std::future::ready(text_method(&self, &call)))
    }
}
