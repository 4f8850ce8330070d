//! Name resolution for the `global` and `import` commands.
//!
//! A [`Resolver`] decides what a peer gets when it asks for a global name
//! or loads a module. [`Namespace`] is the default: two maps populated by
//! the application before the endpoint starts.

use std::collections::HashMap;

use crate::error::{BridgeError, Result};
use crate::value::Value;

/// Lookup strategy for globals and modules.
pub trait Resolver: Send + Sync + 'static {
    /// Resolve a global name.
    ///
    /// # Errors
    ///
    /// `UnknownGlobal` if the name is not defined.
    fn lookup_global(&self, name: &str) -> Result<Value>;

    /// Load a module by name.
    ///
    /// # Errors
    ///
    /// `ModuleNotFound` if no such module exists.
    fn load_module(&self, name: &str) -> Result<Value>;
}

/// Map-backed resolver.
///
/// Modules are stored once and cloned out on every import. Object values
/// share their allocation with the stored copy, so a module imported twice
/// freezes to the same handle.
///
/// # Example
///
/// ```
/// use objwire::dispatch::{Namespace, Resolver};
/// use objwire::value::Value;
///
/// let ns = Namespace::new()
///     .with_global("answer", 42)
///     .with_module("greeting", Value::object(String::from("hello")));
///
/// assert_eq!(ns.lookup_global("answer").unwrap(), Value::from(42));
/// assert!(ns.load_module("missing").is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct Namespace {
    globals: HashMap<String, Value>,
    modules: HashMap<String, Value>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global, builder style.
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_global(name, value);
        self
    }

    /// Add a module, builder style.
    pub fn with_module(mut self, name: impl Into<String>, module: impl Into<Value>) -> Self {
        self.insert_module(name, module);
        self
    }

    /// Define or replace a global.
    pub fn insert_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.insert(name.into(), value.into());
    }

    /// Define or replace a module.
    pub fn insert_module(&mut self, name: impl Into<String>, module: impl Into<Value>) {
        self.modules.insert(name.into(), module.into());
    }

    /// Check whether a global is defined.
    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// Check whether a module is defined.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}

impl Resolver for Namespace {
    fn lookup_global(&self, name: &str) -> Result<Value> {
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownGlobal(name.to_string()))
    }

    fn load_module(&self, name: &str) -> Result<Value> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::ModuleNotFound(name.to_string()))
    }
}
