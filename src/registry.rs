//! Object registry: local live objects addressed by integer handles.
//!
//! The registry is append-only. Each local object gets at most one slot per
//! endpoint lifetime, found by identity (the `Arc` allocation), never by
//! structural equality. Deleting an object empties its slot for good: the id
//! is never handed out again, so a stale handle held by the peer resolves to
//! [`BridgeError::NotFound`] instead of to some unrelated object.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use objwire::registry::ObjectRegistry;
//! use objwire::value::RemoteObject;
//!
//! let mut registry = ObjectRegistry::new();
//! let obj: Arc<dyn RemoteObject> = Arc::new(String::from("hi"));
//!
//! let id = registry.register(&obj);
//! assert_eq!(registry.register(&obj), id);
//! assert!(registry.resolve(id).is_ok());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::value::{object_addr, RemoteObject};

/// Identifier chosen once per endpoint lifetime.
///
/// Distinguishes this endpoint's handles from the peer's when both sides use
/// the same handle encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Generate a fresh, effectively unique identifier.
    pub fn generate() -> Self {
        Self(format!("RS{}", Uuid::new_v4().simple()))
    }

    /// Use a fixed identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque wire reference to exactly one live object.
///
/// Two handles are the same reference iff both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    /// Slot index in the owner's registry.
    pub id: u64,
    /// Instance that minted the handle.
    pub instance: InstanceId,
}

impl Handle {
    /// Create a new handle.
    pub fn new(id: u64, instance: InstanceId) -> Self {
        Self { id, instance }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.instance)
    }
}

/// Append-only table of local objects exposed to the peer.
#[derive(Default)]
pub struct ObjectRegistry {
    /// Slots by id; `None` once deleted.
    slots: Vec<Option<Arc<dyn RemoteObject>>>,
    /// Object address to slot id, live entries only.
    by_addr: HashMap<usize, u64>,
}

impl ObjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the id for `obj`, appending a new slot the first time it is seen.
    pub fn register(&mut self, obj: &Arc<dyn RemoteObject>) -> u64 {
        let addr = object_addr(obj);
        if let Some(&id) = self.by_addr.get(&addr) {
            return id;
        }

        let id = self.slots.len() as u64;
        self.slots.push(Some(Arc::clone(obj)));
        self.by_addr.insert(addr, id);
        id
    }

    /// Get the object in slot `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the slot was deleted or never existed.
    pub fn resolve(&self, id: u64) -> Result<Arc<dyn RemoteObject>> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.slots.get(index))
            .and_then(|slot| slot.clone())
            .ok_or_else(|| BridgeError::NotFound(format!("no live object with id {}", id)))
    }

    /// Remove `obj` from the registry, returning the id it occupied.
    ///
    /// # Errors
    ///
    /// `NotFound` if `obj` has no live entry. Other entries are untouched.
    pub fn delete(&mut self, obj: &Arc<dyn RemoteObject>) -> Result<u64> {
        let id = self
            .by_addr
            .remove(&object_addr(obj))
            .ok_or_else(|| BridgeError::NotFound(format!("{} object is not registered", obj.type_name())))?;

        self.slots[id as usize] = None;
        Ok(id)
    }

    /// Check whether `obj` has a live entry.
    pub fn contains(&self, obj: &Arc<dyn RemoteObject>) -> bool {
        self.by_addr.contains_key(&object_addr(obj))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    /// Check if no entries are live.
    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("live", &self.by_addr.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}
