//! Remote proxies: local stand-ins for objects owned by the peer.
//!
//! A [`RemoteProxy`] is created when thawing a handle minted by another
//! instance. It is never stored in the registry. Invoking a method on it sends
//! a `call` message naming the original handle through the endpoint that
//! thawed it, and resolves with the peer's reply.
//!
//! Structural reflection has no round trip in the protocol, so
//! [`RemoteProxy::property_names`] is always empty and
//! [`RemoteProxy::define_property`] does nothing.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{BridgeError, Result};
use crate::registry::Handle;
use crate::value::{BoxFuture, Value};

/// Something that can forward an invocation on a proxy to the peer.
///
/// Implemented by the endpoint; proxies only hold a weak link to it so that
/// objects keeping proxies alive do not keep the endpoint alive.
pub trait Caller: Send + Sync + 'static {
    /// Send `["call", target, method, ...args]` and wait for the reply.
    fn forward(
        self: Arc<Self>,
        target: RemoteProxy,
        method: String,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value>>;
}

/// Placeholder link for proxies that are not attached to any endpoint.
struct Unlinked;

impl Caller for Unlinked {
    fn forward(
        self: Arc<Self>,
        _target: RemoteProxy,
        _method: String,
        _args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value>> {
        Box::pin(std::future::ready(Err(BridgeError::ConnectionClosed)))
    }
}

/// A link that never upgrades.
pub(crate) fn unlinked() -> Weak<dyn Caller> {
    Weak::<Unlinked>::new()
}

/// Local stand-in for an object living on the other endpoint.
#[derive(Clone)]
pub struct RemoteProxy {
    handle: Handle,
    link: Weak<dyn Caller>,
}

impl RemoteProxy {
    /// Create a proxy forwarding through `link`.
    pub fn new(handle: Handle, link: Weak<dyn Caller>) -> Self {
        Self { handle, link }
    }

    /// Create a proxy with no endpoint behind it.
    ///
    /// It still freezes back to its handle, but every call fails with
    /// `ConnectionClosed`.
    pub fn detached(handle: Handle) -> Self {
        Self {
            handle,
            link: unlinked(),
        }
    }

    /// Get the handle this proxy stands for.
    #[inline]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Check whether the endpoint behind this proxy is still alive.
    pub fn is_connected(&self) -> bool {
        self.link.strong_count() > 0
    }

    /// Invoke `method` on the remote object.
    pub fn call(&self, method: impl Into<String>, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        match self.link.upgrade() {
            Some(caller) => caller.forward(self.clone(), method.into(), args),
            None => Box::pin(std::future::ready(Err(BridgeError::ConnectionClosed))),
        }
    }

    /// Property enumeration is not supported over the wire: always empty.
    pub fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Property definition is not supported over the wire: a no-op.
    pub fn define_property(&self, name: &str, _value: Value) {
        tracing::trace!("ignoring define_property({}) on proxy {}", name, self.handle);
    }
}

impl fmt::Debug for RemoteProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<remote proxy {}>", self.handle)
    }
}
