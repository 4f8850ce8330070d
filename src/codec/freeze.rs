//! Freeze/thaw: the recursive transform between live values and wire values.
//!
//! - **freeze**: scalars pass through, lists and maps recurse, local objects
//!   are registered and replaced by a handle, proxies re-emit their original
//!   handle (no re-registration, no nesting).
//! - **thaw**: scalars pass through, lists and maps recurse, handles minted
//!   by this instance resolve through the registry, any other handle becomes
//!   a [`RemoteProxy`].
//!
//! Handles are tagged on the wire as
//! `{"_remote_proxy": {"id": <u64>, "instance": "<string>"}}`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{json, Map, Value as JsonValue};

use crate::error::{BridgeError, Result};
use crate::proxy::{unlinked, Caller, RemoteProxy};
use crate::registry::{Handle, InstanceId, ObjectRegistry};
use crate::value::{ObjectRef, Value};

/// Key marking a JSON object as a handle.
pub const HANDLE_TAG: &str = "_remote_proxy";

/// Freeze/thaw state for one endpoint instance.
pub struct Codec {
    /// This endpoint's instance identifier.
    instance: InstanceId,
    /// Local objects exposed to the peer.
    registry: Arc<Mutex<ObjectRegistry>>,
    /// Link given to every proxy created by `thaw`.
    link: Weak<dyn Caller>,
}

impl Codec {
    /// Create a codec over an existing registry.
    pub fn new(instance: InstanceId, registry: Arc<Mutex<ObjectRegistry>>, link: Weak<dyn Caller>) -> Self {
        Self {
            instance,
            registry,
            link,
        }
    }

    /// Create a codec with its own empty registry whose proxies are detached.
    pub fn detached(instance: InstanceId) -> Self {
        Self {
            instance,
            registry: Arc::new(Mutex::new(ObjectRegistry::new())),
            link: unlinked(),
        }
    }

    /// Get this endpoint's instance identifier.
    #[inline]
    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    /// Get the shared registry.
    pub fn registry(&self) -> &Arc<Mutex<ObjectRegistry>> {
        &self.registry
    }

    /// Lock the registry. A panic elsewhere never leaves it half-updated, so
    /// poisoning is ignored.
    pub fn lock_registry(&self) -> MutexGuard<'_, ObjectRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transform a live value into its wire form.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a map using the handle tag as a key, which the
    /// peer would read back as a handle.
    pub fn freeze(&self, value: &Value) -> Result<JsonValue> {
        let mut registry = self.lock_registry();
        self.freeze_with(&mut registry, value)
    }

    fn freeze_with(&self, registry: &mut ObjectRegistry, value: &Value) -> Result<JsonValue> {
        let wire = match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => JsonValue::Number(n.clone()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.freeze_with(registry, item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(entries) => {
                if entries.contains_key(HANDLE_TAG) {
                    return Err(BridgeError::InvalidArgument(format!(
                        "map key '{}' is reserved for handles",
                        HANDLE_TAG
                    )));
                }
                JsonValue::Object(
                    entries
                        .iter()
                        .map(|(key, item)| Ok((key.clone(), self.freeze_with(registry, item)?)))
                        .collect::<Result<Map<String, JsonValue>>>()?,
                )
            }
            Value::Object(ObjectRef::Remote(proxy)) => freeze_handle(proxy.handle()),
            Value::Object(ObjectRef::Local(obj)) => {
                let id = registry.register(obj);
                freeze_handle(&Handle::new(id, self.instance.clone()))
            }
        };
        Ok(wire)
    }

    /// Transform a wire value back into a live value.
    ///
    /// # Errors
    ///
    /// `NotFound` for a local handle with no live slot, `Protocol` for a
    /// malformed handle.
    pub fn thaw(&self, wire: JsonValue) -> Result<Value> {
        let registry = self.lock_registry();
        self.thaw_with(&registry, wire)
    }

    fn thaw_with(&self, registry: &ObjectRegistry, wire: JsonValue) -> Result<Value> {
        match wire {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(b)),
            JsonValue::Number(n) => Ok(Value::Number(n)),
            JsonValue::String(s) => Ok(Value::String(s)),
            JsonValue::Array(items) => items
                .into_iter()
                .map(|item| self.thaw_with(registry, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            JsonValue::Object(mut entries) => match entries.remove(HANDLE_TAG) {
                Some(tagged) => {
                    let handle: Handle = serde_json::from_value(tagged)
                        .map_err(|e| BridgeError::Protocol(format!("malformed handle: {}", e)))?;
                    self.thaw_handle(registry, handle)
                }
                None => entries
                    .into_iter()
                    .map(|(key, item)| Ok((key, self.thaw_with(registry, item)?)))
                    .collect::<Result<BTreeMap<_, _>>>()
                    .map(Value::Map),
            },
        }
    }

    fn thaw_handle(&self, registry: &ObjectRegistry, handle: Handle) -> Result<Value> {
        if handle.instance == self.instance {
            let obj = registry.resolve(handle.id)?;
            Ok(Value::Object(ObjectRef::Local(obj)))
        } else {
            Ok(Value::from(RemoteProxy::new(handle, self.link.clone())))
        }
    }
}

/// Wire form of a handle.
pub fn freeze_handle(handle: &Handle) -> JsonValue {
    json!({ HANDLE_TAG: handle })
}
