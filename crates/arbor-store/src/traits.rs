use arbor_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::node::Node;

/// Content-addressed node store.
///
/// All implementations must satisfy these invariants:
/// - Nodes are immutable once written; the same content always maps to the
///   same ID.
/// - `write` is idempotent: persisting a node that is already present
///   succeeds without effect.
/// - Concurrent reads are always safe.
/// - Backend failures are returned verbatim, never retried here.
pub trait ObjectStore: Send + Sync {
    /// Read a node by identity.
    ///
    /// Returns `Ok(None)` if the node does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<Node>>;

    /// Persist a node and return its identity.
    fn write(&self, node: &Node) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read a node that must exist.
    fn fetch(&self, id: &ObjectId) -> StoreResult<Node> {
        self.read(id)?.ok_or(StoreError::NotFound(*id))
    }
}
