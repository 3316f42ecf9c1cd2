use arbor_crypto::IdentityBuilder;
use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

/// Kind tag stored with every node.
///
/// The tag is part of the node's identity. Tags outside the known range load
/// as [`NodeKind::Unknown`] so callers can reject them explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum NodeKind {
    /// Opaque bytes with no framing.
    Raw,
    /// Flat directory: a sorted list of links.
    Directory,
    /// Single-node file leaf.
    File,
    /// Metadata wrapper. Recognized but not handled by the tree layer.
    Metadata,
    /// Symbolic link; the payload is the target.
    Symlink,
    /// One level of a hash-array-mapped shard table.
    HamtShard,
    /// A tag this version does not understand.
    Unknown(u8),
}

impl NodeKind {
    pub fn tag(self) -> u8 {
        match self {
            Self::Raw => 0,
            Self::Directory => 1,
            Self::File => 2,
            Self::Metadata => 3,
            Self::Symlink => 4,
            Self::HamtShard => 5,
            Self::Unknown(tag) => tag,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Raw,
            1 => Self::Directory,
            2 => Self::File,
            3 => Self::Metadata,
            4 => Self::Symlink,
            5 => Self::HamtShard,
            other => Self::Unknown(other),
        }
    }

    /// Plain or sharded directory.
    pub fn is_directory_like(self) -> bool {
        matches!(self, Self::Directory | Self::HamtShard)
    }

    /// Anything the tree layer wraps as a file leaf.
    pub fn is_file_like(self) -> bool {
        matches!(self, Self::File | Self::Raw | Self::Symlink)
    }
}

impl From<u8> for NodeKind {
    fn from(tag: u8) -> Self {
        Self::from_tag(tag)
    }
}

impl From<NodeKind> for u8 {
    fn from(kind: NodeKind) -> Self {
        kind.tag()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Directory => write!(f, "directory"),
            Self::File => write!(f, "file"),
            Self::Metadata => write!(f, "metadata"),
            Self::Symlink => write!(f, "symlink"),
            Self::HamtShard => write!(f, "hamt-shard"),
            Self::Unknown(tag) => write!(f, "unknown({tag})"),
        }
    }
}

/// An immutable, content-addressed node.
///
/// The identity is computed once at construction from the kind tag, the
/// payload and the identity builder, and never changes. Handing out a
/// `Node` always hands out a copy; nothing aliases a directory's internal
/// state through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    kind: NodeKind,
    data: Vec<u8>,
    builder: IdentityBuilder,
    id: ObjectId,
}

impl Node {
    pub fn new(kind: NodeKind, data: Vec<u8>, builder: IdentityBuilder) -> Self {
        let id = builder.identify(kind.tag(), &data);
        Self {
            kind,
            data,
            builder,
            id,
        }
    }

    /// Raw leaf under the default identity builder.
    pub fn raw(data: Vec<u8>) -> Self {
        Self::new(NodeKind::Raw, data, IdentityBuilder::default())
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn builder(&self) -> &IdentityBuilder {
        &self.builder
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The same payload re-identified under another builder.
    pub fn with_builder(&self, builder: IdentityBuilder) -> Self {
        Self::new(self.kind, self.data.clone(), builder)
    }
}

/// A named reference from a link table to a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub id: ObjectId,
    pub kind: NodeKind,
    /// Payload size of the target node.
    pub size: u64,
}

impl Link {
    /// Link `name` to an existing node.
    pub fn to_node(name: impl Into<String>, node: &Node) -> Self {
        Self {
            name: name.into(),
            id: node.id(),
            kind: node.kind(),
            size: node.size(),
        }
    }
}
