//! The tree root.

use std::sync::{Arc, Mutex};

use arbor_encoding::{DirectoryEncoding, LinkTable};
use arbor_store::{Node, ObjectStore};
use tracing::debug;

use crate::config::MfsConfig;
use crate::dir::Directory;
use crate::error::{MfsError, MfsResult};
use crate::fsnode::FsNode;
use crate::inode::{ChildCloser, ParentRef};

/// Hook invoked with every new root node a flush produces.
pub type PublishFn = Box<dyn Fn(&Node) -> MfsResult<()> + Send + Sync>;

/// Terminal receiver of the flush cascade.
pub(crate) struct RootInner {
    dir: Arc<Directory>,
    last: Mutex<Option<Node>>,
    publish: Option<PublishFn>,
    store: Arc<dyn ObjectStore>,
    config: Arc<MfsConfig>,
}

impl ChildCloser for RootInner {
    fn close_child(&self, _name: &str, node: Node, _propagate: bool) -> MfsResult<()> {
        self.store.write(&node)?;
        *self.last.lock().expect("lock poisoned") = Some(node.clone());
        debug!(id = %node.id().short_hex(), "root updated");
        match &self.publish {
            Some(publish) => publish(&node),
            None => Ok(()),
        }
    }
}

/// Owner of one mutable tree.
///
/// The root directory and, through it, every cached entry hold only weak
/// references upward, so dropping the `Root` tears the tree down.
pub struct Root {
    inner: Arc<RootInner>,
}

impl Root {
    /// Open a tree over an existing directory node.
    ///
    /// The configuration is validated first. `node` must be a flat directory
    /// or a shard table; its children are loaded lazily on lookup.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        node: &Node,
        config: MfsConfig,
        publish: Option<PublishFn>,
    ) -> MfsResult<Self> {
        config.validate()?;
        if !node.kind().is_directory_like() {
            return Err(MfsError::NotADirectory(node.id().to_string()));
        }
        let encoding = DirectoryEncoding::from_node(Arc::clone(&store), node)?;
        debug!(id = %node.id().short_hex(), "opened tree");
        Ok(Self::open(store, encoding, config, publish))
    }

    /// A tree over a fresh empty flat directory, persisted first.
    pub fn empty(store: Arc<dyn ObjectStore>, config: MfsConfig) -> MfsResult<Self> {
        config.validate()?;
        let mut encoding =
            DirectoryEncoding::empty(Arc::clone(&store), config.identity_builder.clone());
        let node = encoding.serialize()?;
        store.write(&node)?;
        debug!(id = %node.id().short_hex(), "created empty tree");
        Ok(Self::open(store, encoding, config, None))
    }

    fn open(
        store: Arc<dyn ObjectStore>,
        encoding: DirectoryEncoding,
        config: MfsConfig,
        publish: Option<PublishFn>,
    ) -> Self {
        let config = Arc::new(config);
        let inner = Arc::new_cyclic(|me| RootInner {
            dir: Directory::with_encoding(
                "",
                encoding,
                ParentRef::Root(me.clone()),
                Arc::clone(&store),
                Arc::clone(&config),
            ),
            last: Mutex::new(None),
            publish,
            store,
            config,
        });
        Self { inner }
    }

    pub fn directory(&self) -> Arc<Directory> {
        Arc::clone(&self.inner.dir)
    }

    pub fn config(&self) -> &MfsConfig {
        &self.inner.config
    }

    /// Flush every cached entry and return the new root node.
    pub fn flush(&self) -> MfsResult<Node> {
        self.inner.dir.flush()
    }

    /// The root node recorded by the most recent flush to reach the root.
    pub fn last_node(&self) -> Option<Node> {
        self.inner.last.lock().expect("lock poisoned").clone()
    }

    /// Resolve an absolute or root-relative path. `/` and the empty path
    /// yield the root directory.
    pub fn lookup(&self, path: &str) -> MfsResult<FsNode> {
        let mut current = FsNode::Directory(self.directory());
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let dir = match &current {
                FsNode::Directory(dir) => Arc::clone(dir),
                FsNode::File(file) => return Err(MfsError::NotADirectory(file.name().to_string())),
            };
            current = dir.child(component)?;
        }
        Ok(current)
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
