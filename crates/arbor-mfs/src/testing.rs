//! Shared fixtures for the crate's unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arbor_encoding::{DirectoryEncoding, LinkTable};
use arbor_store::{InMemoryObjectStore, Node, ObjectStore, StoreError, StoreResult};
use arbor_types::ObjectId;

use crate::config::MfsConfig;
use crate::root::Root;

pub(crate) fn memory_store() -> Arc<InMemoryObjectStore> {
    Arc::new(InMemoryObjectStore::new())
}

pub(crate) fn empty_root(store: &Arc<InMemoryObjectStore>) -> Root {
    root_with(store.clone(), MfsConfig::default())
}

pub(crate) fn root_with(store: Arc<dyn ObjectStore>, config: MfsConfig) -> Root {
    init_tracing();
    Root::empty(store, config).unwrap()
}

/// Walk a persisted tree without going through any cache.
pub(crate) fn resolve(store: &Arc<InMemoryObjectStore>, root: &Node, path: &str) -> Node {
    let store: Arc<dyn ObjectStore> = store.clone();
    let mut node = root.clone();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        let mut encoding = DirectoryEncoding::from_node(Arc::clone(&store), &node).unwrap();
        node = encoding.find(component).unwrap();
    }
    node
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// In-memory store whose reads or writes can be made to fail.
#[derive(Default)]
pub(crate) struct FailingStore {
    inner: InMemoryObjectStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub(crate) fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }
}

impl ObjectStore for FailingStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<Node>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".into()));
        }
        self.inner.read(id)
    }

    fn write(&self, node: &Node) -> StoreResult<ObjectId> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        self.inner.write(node)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.exists(id)
    }
}
