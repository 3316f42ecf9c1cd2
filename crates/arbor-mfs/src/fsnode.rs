//! Tree entries and directory listings.

use std::sync::Arc;

use arbor_store::Node;
use serde::{Deserialize, Serialize};

use crate::dir::Directory;
use crate::error::MfsResult;
use crate::file::File;

/// Kind of a tree entry as reported in listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
}

/// One row of a directory listing. Computed on demand, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListing {
    pub name: String,
    pub node_type: NodeType,
    /// Current content length for files (unflushed writes included),
    /// zero for directories.
    pub size: u64,
    /// Identity of the entry's current node, as `b3-<hex>`.
    pub hash: String,
}

/// A cached tree entry.
///
/// Cloning is cheap and yields another handle to the same instance; use
/// [`same_instance`](Self::same_instance) to compare identity.
#[derive(Clone, Debug)]
pub enum FsNode {
    Directory(Arc<Directory>),
    File(Arc<File>),
}

impl FsNode {
    /// Listing kind of this entry.
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Directory(_) => NodeType::Directory,
            Self::File(_) => NodeType::File,
        }
    }

    /// Name under which the entry is linked in its parent.
    pub fn name(&self) -> &str {
        match self {
            Self::Directory(dir) => dir.name(),
            Self::File(file) => file.name(),
        }
    }

    /// Current node of the entry, persisted.
    pub fn get_node(&self) -> MfsResult<Node> {
        match self {
            Self::Directory(dir) => dir.get_node(),
            Self::File(file) => file.get_node(),
        }
    }

    /// Flush the entry and cascade its new node to the root.
    pub fn flush(&self) -> MfsResult<Node> {
        match self {
            Self::Directory(dir) => dir.flush(),
            Self::File(file) => file.flush(),
        }
    }

    /// Absolute path of the entry.
    ///
    /// # Panics
    ///
    /// If an ancestor has been dropped while the entry is alive.
    pub fn path(&self) -> String {
        match self {
            Self::Directory(dir) => dir.path(),
            Self::File(file) => file.path(),
        }
    }

    /// The directory, if this entry is one.
    pub fn as_directory(&self) -> Option<&Arc<Directory>> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::File(_) => None,
        }
    }

    /// The file, if this entry is one.
    pub fn as_file(&self) -> Option<&Arc<File>> {
        match self {
            Self::File(file) => Some(file),
            Self::Directory(_) => None,
        }
    }

    /// Whether both handles point at the same cached instance.
    pub fn same_instance(&self, other: &FsNode) -> bool {
        match (self, other) {
            (Self::Directory(a), Self::Directory(b)) => Arc::ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Listing row for this entry, computed from its current node.
    pub(crate) fn listing(&self, name: String) -> MfsResult<NodeListing> {
        let node = self.get_node()?;
        let size = match self {
            Self::Directory(_) => 0,
            Self::File(file) => file.size(),
        };
        Ok(NodeListing {
            name,
            node_type: self.node_type(),
            size,
            hash: node.id().to_string(),
        })
    }
}
