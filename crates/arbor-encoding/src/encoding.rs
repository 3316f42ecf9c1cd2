use std::sync::Arc;

use arbor_crypto::IdentityBuilder;
use arbor_store::{Link, Node, NodeKind, ObjectStore};
use tracing::debug;

use crate::basic::BasicDirectory;
use crate::error::{EncodingError, EncodingResult};
use crate::hamt::HamtDirectory;

/// Operations every directory encoding supports.
///
/// Lookups take `&mut self` because sharded tables load sub-shards from the
/// store lazily and keep them.
pub trait LinkTable {
    /// Resolve `name` to its node, fetching it from the store.
    fn find(&mut self, name: &str) -> EncodingResult<Node>;

    /// The link stored under `name`, if any. Does not fetch the target.
    fn link(&mut self, name: &str) -> EncodingResult<Option<Link>>;

    /// Insert or overwrite the link for `name`. `node` must already be
    /// persisted.
    fn add_link(&mut self, name: &str, node: &Node) -> EncodingResult<()>;

    /// Remove the link for `name`; `NotFound` if there is none.
    fn remove_link(&mut self, name: &str) -> EncodingResult<()>;

    /// Visit every link in a deterministic order. An error from `visit`
    /// stops the walk and is returned.
    fn for_each_link(
        &mut self,
        visit: &mut dyn FnMut(&Link) -> EncodingResult<()>,
    ) -> EncodingResult<()>;

    fn link_count(&mut self) -> EncodingResult<usize>;

    /// Encode the table into its node. Sub-nodes the table owns (shards)
    /// are persisted; the returned node itself is not.
    fn serialize(&mut self) -> EncodingResult<Node>;

    fn identity_builder(&self) -> &IdentityBuilder;

    fn set_identity_builder(&mut self, builder: IdentityBuilder);
}

/// The encoding a live directory currently uses.
///
/// Starts flat; [`switch_to_sharded`](Self::switch_to_sharded) produces the
/// HAMT form. There is no way back.
#[derive(Debug)]
pub enum DirectoryEncoding {
    Basic(BasicDirectory),
    Sharded(HamtDirectory),
}

impl DirectoryEncoding {
    /// A new, empty flat directory.
    pub fn empty(store: Arc<dyn ObjectStore>, builder: IdentityBuilder) -> Self {
        Self::Basic(BasicDirectory::new(store, builder))
    }

    /// Load the encoding a directory-like node was written with.
    pub fn from_node(store: Arc<dyn ObjectStore>, node: &Node) -> EncodingResult<Self> {
        match node.kind() {
            NodeKind::Directory => Ok(Self::Basic(BasicDirectory::from_node(store, node)?)),
            NodeKind::HamtShard => Ok(Self::Sharded(HamtDirectory::from_node(store, node)?)),
            other => Err(EncodingError::UnexpectedKind {
                id: node.id(),
                kind: other,
                expected: "directory or hamt-shard",
            }),
        }
    }

    pub fn is_sharded(&self) -> bool {
        matches!(self, Self::Sharded(_))
    }

    /// Rewrite the table as a HAMT with the given fan-out. An already
    /// sharded encoding is returned as a copy of itself.
    pub fn switch_to_sharded(&mut self, fanout: usize) -> EncodingResult<Self> {
        match self {
            Self::Basic(basic) => {
                let hamt = basic.switch_to_sharding(fanout)?;
                debug!(fanout, "converted flat directory to shard table");
                Ok(Self::Sharded(hamt))
            }
            Self::Sharded(hamt) => Ok(Self::Sharded(hamt.clone())),
        }
    }

    fn table(&mut self) -> &mut dyn LinkTable {
        match self {
            Self::Basic(basic) => basic,
            Self::Sharded(hamt) => hamt,
        }
    }
}

impl LinkTable for DirectoryEncoding {
    fn find(&mut self, name: &str) -> EncodingResult<Node> {
        self.table().find(name)
    }

    fn link(&mut self, name: &str) -> EncodingResult<Option<Link>> {
        self.table().link(name)
    }

    fn add_link(&mut self, name: &str, node: &Node) -> EncodingResult<()> {
        self.table().add_link(name, node)
    }

    fn remove_link(&mut self, name: &str) -> EncodingResult<()> {
        self.table().remove_link(name)
    }

    fn for_each_link(
        &mut self,
        visit: &mut dyn FnMut(&Link) -> EncodingResult<()>,
    ) -> EncodingResult<()> {
        self.table().for_each_link(visit)
    }

    fn link_count(&mut self) -> EncodingResult<usize> {
        self.table().link_count()
    }

    fn serialize(&mut self) -> EncodingResult<Node> {
        self.table().serialize()
    }

    fn identity_builder(&self) -> &IdentityBuilder {
        match self {
            Self::Basic(basic) => basic.identity_builder(),
            Self::Sharded(hamt) => hamt.identity_builder(),
        }
    }

    fn set_identity_builder(&mut self, builder: IdentityBuilder) {
        self.table().set_identity_builder(builder)
    }
}
