use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use arbor_types::ObjectId;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::node::Node;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based node store.
///
/// Intended for tests and embedding. Nodes live behind a `RwLock` and are
/// cloned on read and write. The store also counts write calls, which lets
/// callers check how much of a tree a flush actually touched.
pub struct InMemoryObjectStore {
    nodes: RwLock<HashMap<ObjectId, Node>>,
    writes: AtomicU64,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of distinct nodes stored.
    pub fn len(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().expect("lock poisoned").is_empty()
    }

    /// Total `write` calls so far, including ones that deduplicated.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<Node>> {
        let map = self.nodes.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn write(&self, node: &Node) -> StoreResult<ObjectId> {
        let id = node.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut map = self.nodes.write().expect("lock poisoned");
        map.entry(id).or_insert_with(|| {
            trace!(id = %id.short_hex(), kind = %node.kind(), "stored node");
            node.clone()
        });
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.nodes.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("node_count", &self.len())
            .field("writes", &self.write_count())
            .finish()
    }
}
