use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::ObjectResult;
use crate::object::Object;

/// Looks objects up by OID. `Ok(None)` means the object is unknown.
pub trait ObjectResolver {
    fn resolve(&self, oid: &str) -> ObjectResult<Option<Object>>;
}

impl<F> ObjectResolver for F
where
    F: Fn(&str) -> ObjectResult<Option<Object>>,
{
    fn resolve(&self, oid: &str) -> ObjectResult<Option<Object>> {
        self(oid)
    }
}

/// In-memory, HashMap-based object store keyed by OID.
///
/// Intended for tests and embedding. Objects are cloned on read.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Object>>,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `object` and return its OID. Storing the same content twice is
    /// a no-op.
    pub fn insert(&self, object: Object) -> String {
        let oid = object.oid().to_string();
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(oid.clone())
            .or_insert(object);
        oid
    }

    /// Clone of the object stored under `oid`.
    pub fn get(&self, oid: &str) -> Option<Object> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(oid)
            .cloned()
    }

    /// `true` if `oid` is stored.
    pub fn contains(&self, oid: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(oid)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every stored OID.
    pub fn all_oids(&self) -> Vec<String> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut oids: Vec<String> = map.keys().cloned().collect();
        oids.sort();
        oids
    }
}

impl ObjectResolver for InMemoryObjectStore {
    fn resolve(&self, oid: &str) -> ObjectResult<Option<Object>> {
        Ok(self.get(oid))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}
