use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_crypto::IdentityBuilder;
use arbor_store::{Link, Node, NodeKind, ObjectStore};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::encoding::LinkTable;
use crate::error::{EncodingError, EncodingResult};
use crate::hamt::HamtDirectory;

/// Persisted form of a flat directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPayload {
    /// Links sorted by name.
    pub links: Vec<Link>,
}

/// Flat directory encoding: every link in a single node.
#[derive(Clone)]
pub struct BasicDirectory {
    links: BTreeMap<String, Link>,
    builder: IdentityBuilder,
    store: Arc<dyn ObjectStore>,
}

impl BasicDirectory {
    pub fn new(store: Arc<dyn ObjectStore>, builder: IdentityBuilder) -> Self {
        Self {
            links: BTreeMap::new(),
            builder,
            store,
        }
    }

    /// Decode a `Directory` node. The builder is inherited from the node.
    pub fn from_node(store: Arc<dyn ObjectStore>, node: &Node) -> EncodingResult<Self> {
        codec::expect_kind(node, NodeKind::Directory, "directory")?;
        let payload: DirectoryPayload = codec::decode(node)?;
        let links = payload
            .links
            .into_iter()
            .map(|link| (link.name.clone(), link))
            .collect();
        Ok(Self {
            links,
            builder: node.builder().clone(),
            store,
        })
    }

    /// Rebuild every link into a new shard table.
    pub fn switch_to_sharding(&self, fanout: usize) -> EncodingResult<HamtDirectory> {
        let mut hamt = HamtDirectory::new(Arc::clone(&self.store), self.builder.clone(), fanout)?;
        for link in self.links.values() {
            hamt.insert_link(link.clone())?;
        }
        Ok(hamt)
    }
}

impl LinkTable for BasicDirectory {
    fn find(&mut self, name: &str) -> EncodingResult<Node> {
        let link = self
            .links
            .get(name)
            .ok_or_else(|| EncodingError::NotFound(name.to_string()))?;
        Ok(self.store.fetch(&link.id)?)
    }

    fn link(&mut self, name: &str) -> EncodingResult<Option<Link>> {
        Ok(self.links.get(name).cloned())
    }

    fn add_link(&mut self, name: &str, node: &Node) -> EncodingResult<()> {
        self.links.insert(name.to_string(), Link::to_node(name, node));
        Ok(())
    }

    fn remove_link(&mut self, name: &str) -> EncodingResult<()> {
        self.links
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EncodingError::NotFound(name.to_string()))
    }

    fn for_each_link(
        &mut self,
        visit: &mut dyn FnMut(&Link) -> EncodingResult<()>,
    ) -> EncodingResult<()> {
        self.links.values().try_for_each(|link| visit(link))
    }

    fn link_count(&mut self) -> EncodingResult<usize> {
        Ok(self.links.len())
    }

    fn serialize(&mut self) -> EncodingResult<Node> {
        let payload = DirectoryPayload {
            links: self.links.values().cloned().collect(),
        };
        codec::encode(NodeKind::Directory, &payload, &self.builder)
    }

    fn identity_builder(&self) -> &IdentityBuilder {
        &self.builder
    }

    fn set_identity_builder(&mut self, builder: IdentityBuilder) {
        self.builder = builder;
    }
}

impl std::fmt::Debug for BasicDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicDirectory")
            .field("links", &self.links.len())
            .field("builder", &self.builder)
            .finish()
    }
}

/// Node of an empty flat directory.
pub fn empty_directory_node(builder: &IdentityBuilder) -> EncodingResult<Node> {
    codec::encode(NodeKind::Directory, &DirectoryPayload::default(), builder)
}
