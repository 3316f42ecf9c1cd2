//! Single-node file leaves.

use std::sync::{Arc, Mutex, MutexGuard};

use arbor_encoding::leaf;
use arbor_store::{Node, NodeKind, ObjectStore};
use tracing::debug;

use crate::config::MfsConfig;
use crate::error::{MfsError, MfsResult};
use crate::inode::{Inode, ParentRef};

struct FileState {
    content: Vec<u8>,
    /// Last persisted (or loaded) node. Stale while `dirty`.
    node: Node,
    dirty: bool,
}

/// A file in a mutable tree.
///
/// Edits stay in memory until the file's node is requested, either by a
/// directory sync or by [`File::flush`].
pub struct File {
    inode: Inode,
    state: Mutex<FileState>,
}

impl File {
    pub(crate) fn new(
        name: impl Into<String>,
        node: Node,
        parent: ParentRef,
        store: Arc<dyn ObjectStore>,
        config: Arc<MfsConfig>,
    ) -> MfsResult<Arc<Self>> {
        let content = leaf::leaf_content(&node)?;
        Ok(Arc::new(Self {
            inode: Inode::new(name, parent, store, config),
            state: Mutex::new(FileState {
                content,
                node,
                dirty: false,
            }),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().expect("lock poisoned")
    }

    pub fn name(&self) -> &str {
        &self.inode.name
    }

    /// Kind of the node last loaded or persisted.
    pub fn kind(&self) -> NodeKind {
        self.lock().node.kind()
    }

    /// Copy of the current content, unflushed writes included.
    pub fn read_all(&self) -> Vec<u8> {
        self.lock().content.clone()
    }

    /// Current length, unflushed writes included.
    pub fn size(&self) -> u64 {
        self.lock().content.len() as u64
    }

    /// Whether there are edits not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Overwrite bytes starting at `offset`, zero-filling any gap past the
    /// current end.
    ///
    /// Fails with `OffsetOutOfRange`, leaving the content untouched, if the
    /// write would end past what can be addressed or allocated.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> MfsResult<()> {
        let mut st = self.lock();
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?))
            .ok_or_else(|| self.out_of_range(offset))?;
        if st.content.len() < range.end {
            self.grow(&mut st.content, range.end, offset)?;
        }
        st.content[range].copy_from_slice(data);
        st.dirty = true;
        Ok(())
    }

    /// Shorten or zero-extend to `len` bytes.
    pub fn truncate(&self, len: u64) -> MfsResult<()> {
        let mut st = self.lock();
        let target = usize::try_from(len).map_err(|_| self.out_of_range(len))?;
        if st.content.len() < target {
            self.grow(&mut st.content, target, len)?;
        } else {
            st.content.truncate(target);
        }
        st.dirty = true;
        Ok(())
    }

    /// Zero-extend `content` to `len`, reserving first so an oversized
    /// request fails instead of aborting.
    fn grow(&self, content: &mut Vec<u8>, len: usize, requested: u64) -> MfsResult<()> {
        content
            .try_reserve(len - content.len())
            .map_err(|_| self.out_of_range(requested))?;
        content.resize(len, 0);
        Ok(())
    }

    fn out_of_range(&self, offset: u64) -> MfsError {
        MfsError::OffsetOutOfRange {
            name: self.name().to_string(),
            offset,
        }
    }

    pub fn set_content(&self, content: Vec<u8>) {
        let mut st = self.lock();
        st.content = content;
        st.dirty = true;
    }

    /// The file's current node, persisting it first if edited.
    ///
    /// Edited content is always re-encoded as a `File` node, under the
    /// identity builder of the node the file was loaded from.
    pub fn get_node(&self) -> MfsResult<Node> {
        let mut st = self.lock();
        if st.dirty {
            let node = leaf::file_node(st.content.clone(), st.node.builder());
            self.inode.store.write(&node)?;
            st.node = node;
            st.dirty = false;
        }
        Ok(st.node.clone())
    }

    /// Persist the file and cascade its node to the root.
    pub fn flush(&self) -> MfsResult<Node> {
        let node = self.get_node()?;
        self.inode
            .parent
            .close_child(self.name(), node.clone(), true)?;
        debug!(file = %self.name(), id = %node.id().short_hex(), size = node.size(), "flushed");
        Ok(node)
    }

    /// Absolute path of this file.
    ///
    /// # Panics
    ///
    /// If the parent directory has been dropped.
    pub fn path(&self) -> String {
        match &self.inode.parent {
            ParentRef::Root(_) => format!("/{}", self.name()),
            ParentRef::Directory(weak) => {
                let Some(dir) = weak.upgrade() else {
                    panic!("parent of {:?} is gone", self.name());
                };
                let base = dir.path();
                if base == "/" {
                    format!("/{}", self.name())
                } else {
                    format!("{base}/{}", self.name())
                }
            }
        }
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("name", &self.inode.name)
            .finish_non_exhaustive()
    }
}
