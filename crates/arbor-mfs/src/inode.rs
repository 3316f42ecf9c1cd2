//! State shared by every tree entry and the upward link to its parent.

use std::sync::{Arc, Weak};

use arbor_store::{Node, ObjectStore};

use crate::config::MfsConfig;
use crate::dir::Directory;
use crate::error::{MfsError, MfsResult};
use crate::root::RootInner;

/// The capability a child uses to report its new node upward.
///
/// Implemented by [`Directory`], which updates its link and optionally
/// forwards its own new node to its parent, and by the tree root, which
/// ends the cascade.
pub trait ChildCloser {
    /// Record `node` as the new content of the child `name`.
    ///
    /// Without `propagate` only the link is updated and nothing is persisted.
    /// With `propagate` the receiver also persists its own node and passes it
    /// to its parent the same way, so the new identity reaches the root.
    /// The caller must not hold any entry lock.
    fn close_child(&self, name: &str, node: Node, propagate: bool) -> MfsResult<()>;
}

/// Non-owning reference from an entry to its parent.
///
/// Upward references are weak so that the root owns the whole tree; a parent
/// that can no longer be upgraded means the entry is detached.
#[derive(Clone)]
pub(crate) enum ParentRef {
    Root(Weak<RootInner>),
    Directory(Weak<Directory>),
}

impl ParentRef {
    /// Notify the parent. `child` names the caller, for error reporting.
    ///
    /// Fails with `Detached` if the parent has been dropped.
    pub(crate) fn close_child(&self, child: &str, node: Node, propagate: bool) -> MfsResult<()> {
        let closer: Arc<dyn ChildCloser> = match self {
            Self::Root(root) => root.upgrade().map(|r| r as Arc<dyn ChildCloser>),
            Self::Directory(dir) => dir.upgrade().map(|d| d as Arc<dyn ChildCloser>),
        }
        .ok_or_else(|| MfsError::Detached(child.to_string()))?;
        closer.close_child(child, node, propagate)
    }
}

/// State every tree entry carries. Fixed for the entry's lifetime.
pub(crate) struct Inode {
    pub(crate) name: String,
    pub(crate) parent: ParentRef,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) config: Arc<MfsConfig>,
}

impl Inode {
    pub(crate) fn new(
        name: impl Into<String>,
        parent: ParentRef,
        store: Arc<dyn ObjectStore>,
        config: Arc<MfsConfig>,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            store,
            config,
        }
    }
}
