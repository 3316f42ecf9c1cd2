//! The mutable directory.
//!
//! A [`Directory`] pairs a cache of materialized children with the encoding
//! of its persisted link table. Cached children are authoritative: their
//! links in the encoding may lag behind until the directory syncs (on
//! [`get_node`](Directory::get_node)) or a child reports in through
//! [`close_child`](ChildCloser::close_child).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::SystemTime;

use arbor_crypto::IdentityBuilder;
use arbor_encoding::{empty_directory_node, leaf, DirectoryEncoding, LinkTable};
use arbor_store::{Node, NodeKind, ObjectStore};
use tracing::{debug, trace};

use crate::config::MfsConfig;
use crate::error::{MfsError, MfsResult};
use crate::file::File;
use crate::fsnode::{FsNode, NodeListing};
use crate::inode::{ChildCloser, Inode, ParentRef};

/// Everything guarded by a directory's lock.
struct DirState {
    /// Materialized children. A name maps to at most one entry.
    entries: HashMap<String, FsNode>,
    encoding: DirectoryEncoding,
    mod_time: SystemTime,
}

/// A child node collected outside the lock, waiting to be installed.
struct Synced {
    name: String,
    entry: FsNode,
    node: Node,
}

/// A directory in a mutable tree.
pub struct Directory {
    inode: Inode,
    /// Handle to this instance, handed to children as their parent.
    me: Weak<Directory>,
    state: Mutex<DirState>,
}

impl Directory {
    /// Materialize a directory from a directory-like node.
    pub(crate) fn new(
        name: impl Into<String>,
        node: &Node,
        parent: ParentRef,
        store: Arc<dyn ObjectStore>,
        config: Arc<MfsConfig>,
    ) -> MfsResult<Arc<Self>> {
        let encoding = DirectoryEncoding::from_node(Arc::clone(&store), node)?;
        Ok(Self::with_encoding(name, encoding, parent, store, config))
    }

    pub(crate) fn with_encoding(
        name: impl Into<String>,
        encoding: DirectoryEncoding,
        parent: ParentRef,
        store: Arc<dyn ObjectStore>,
        config: Arc<MfsConfig>,
    ) -> Arc<Self> {
        let inode = Inode::new(name, parent, store, config);
        Arc::new_cyclic(|me| Self {
            inode,
            me: me.clone(),
            state: Mutex::new(DirState {
                entries: HashMap::new(),
                encoding,
                mod_time: SystemTime::now(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DirState> {
        self.state.lock().expect("lock poisoned")
    }

    fn as_parent(&self) -> ParentRef {
        ParentRef::Directory(self.me.clone())
    }

    /// Link name in the parent; empty for the root directory.
    pub fn name(&self) -> &str {
        &self.inode.name
    }

    /// Time of the last link change.
    pub fn mod_time(&self) -> SystemTime {
        self.lock().mod_time
    }

    /// Whether this directory has migrated to a shard table.
    pub fn is_sharded(&self) -> bool {
        self.lock().encoding.is_sharded()
    }

    /// Builder this directory uses for the nodes it creates and serializes.
    pub fn identity_builder(&self) -> IdentityBuilder {
        self.lock().encoding.identity_builder().clone()
    }

    /// Identity builder for nodes this directory serializes from now on.
    pub fn set_identity_builder(&self, builder: IdentityBuilder) {
        self.lock().encoding.set_identity_builder(builder);
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// The entry named `name`, materializing it from the encoding on a
    /// cache miss.
    pub fn child(&self, name: &str) -> MfsResult<FsNode> {
        let mut st = self.lock();
        self.child_unsync(&mut st, name)
    }

    /// Drop `name` from the cache. Its link is left as last written.
    pub fn uncache(&self, name: &str) {
        self.lock().entries.remove(name);
    }

    fn child_unsync(&self, st: &mut DirState, name: &str) -> MfsResult<FsNode> {
        if let Some(entry) = st.entries.get(name) {
            return Ok(entry.clone());
        }
        let node = st.encoding.find(name)?;
        self.cache_node(st, name, node)
    }

    /// Wrap a resolved node by kind and cache it.
    fn cache_node(&self, st: &mut DirState, name: &str, node: Node) -> MfsResult<FsNode> {
        let entry = match node.kind() {
            kind if kind.is_directory_like() => FsNode::Directory(Directory::new(
                name,
                &node,
                self.as_parent(),
                Arc::clone(&self.inode.store),
                Arc::clone(&self.inode.config),
            )?),
            kind if kind.is_file_like() => FsNode::File(File::new(
                name,
                node,
                self.as_parent(),
                Arc::clone(&self.inode.store),
                Arc::clone(&self.inode.config),
            )?),
            NodeKind::Metadata => return Err(MfsError::Unsupported(NodeKind::Metadata)),
            other => {
                return Err(MfsError::Invalid(format!(
                    "{name:?} has unrecognized kind {other}"
                )))
            }
        };
        trace!(dir = %self.name(), name, kind = ?entry.node_type(), "materialized child");
        st.entries.insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    /// Fail with `AlreadyExists` if `name` resolves to anything, including
    /// links whose node cannot be materialized.
    fn ensure_vacant(&self, st: &mut DirState, name: &str) -> MfsResult<()> {
        match self.child_unsync(st, name) {
            Ok(FsNode::Directory(dir)) => Err(MfsError::AlreadyExists {
                name: name.to_string(),
                existing: Some(dir),
            }),
            Ok(FsNode::File(_)) | Err(MfsError::Unsupported(_) | MfsError::Invalid(_)) => {
                Err(MfsError::AlreadyExists {
                    name: name.to_string(),
                    existing: None,
                })
            }
            Err(MfsError::NotFound(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Create an empty subdirectory.
    ///
    /// If `name` already exists this fails with `AlreadyExists`; when the
    /// existing entry is a directory the error carries it.
    pub fn mkdir(&self, name: &str) -> MfsResult<Arc<Directory>> {
        validate_name(name)?;
        let mut st = self.lock();
        self.ensure_vacant(&mut st, name)?;

        let node = empty_directory_node(st.encoding.identity_builder())?;
        self.inode.store.write(&node)?;
        self.update_child_unsync(&mut st, name, &node)?;

        let dir = Directory::new(
            name,
            &node,
            self.as_parent(),
            Arc::clone(&self.inode.store),
            Arc::clone(&self.inode.config),
        )?;
        st.entries
            .insert(name.to_string(), FsNode::Directory(Arc::clone(&dir)));
        debug!(dir = %self.name(), name, "created directory");
        Ok(dir)
    }

    /// Create every missing directory along a `/`-separated relative path
    /// and return the last one. Existing directories are reused.
    pub fn mkdir_all(self: &Arc<Self>, path: &str) -> MfsResult<Arc<Directory>> {
        let mut current = Arc::clone(self);
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let next = match current.child(component) {
                Ok(FsNode::Directory(dir)) => dir,
                Ok(FsNode::File(_)) => return Err(MfsError::NotADirectory(component.to_string())),
                Err(MfsError::NotFound(_)) => current
                    .mkdir(component)
                    .or_else(MfsError::into_existing_directory)?,
                Err(other) => return Err(other),
            };
            current = next;
        }
        Ok(current)
    }

    /// Create a file leaf holding `content`.
    pub fn create_file(&self, name: &str, content: Vec<u8>) -> MfsResult<Arc<File>> {
        validate_name(name)?;
        let mut st = self.lock();
        self.ensure_vacant(&mut st, name)?;

        let node = leaf::file_node(content, st.encoding.identity_builder());
        self.inode.store.write(&node)?;
        self.update_child_unsync(&mut st, name, &node)?;

        let file = File::new(
            name,
            node,
            self.as_parent(),
            Arc::clone(&self.inode.store),
            Arc::clone(&self.inode.config),
        )?;
        st.entries
            .insert(name.to_string(), FsNode::File(Arc::clone(&file)));
        debug!(dir = %self.name(), name, "created file");
        Ok(file)
    }

    /// Remove `name` from the cache and the link table.
    pub fn unlink(&self, name: &str) -> MfsResult<()> {
        let mut st = self.lock();
        st.entries.remove(name);
        st.encoding.remove_link(name)?;
        st.mod_time = SystemTime::now();
        debug!(dir = %self.name(), name, "unlinked");
        Ok(())
    }

    /// Graft an already-built node under `name`.
    pub fn add_child(&self, name: &str, node: Node) -> MfsResult<()> {
        validate_name(name)?;
        let mut st = self.lock();
        self.ensure_vacant(&mut st, name)?;

        self.inode.store.write(&node)?;
        self.update_child_unsync(&mut st, name, &node)?;
        debug!(dir = %self.name(), name, id = %node.id().short_hex(), "added child");
        Ok(())
    }

    fn update_child_unsync(&self, st: &mut DirState, name: &str, node: &Node) -> MfsResult<()> {
        self.add_link_unsync(st, name, node)?;
        st.mod_time = SystemTime::now();
        Ok(())
    }

    /// Add a link, first migrating to a shard table if the policy says so.
    fn add_link_unsync(&self, st: &mut DirState, name: &str, node: &Node) -> MfsResult<()> {
        let config = &self.inode.config;
        if config.sharding.is_enabled() && !st.encoding.is_sharded() {
            let adding = usize::from(st.encoding.link(name)?.is_none());
            let links_after = st.encoding.link_count()? + adding;
            if config.sharding.should_shard(links_after) {
                st.encoding = st.encoding.switch_to_sharded(config.hamt_fanout)?;
                debug!(dir = %self.name(), links_after, "switched to sharded encoding");
            }
        }
        trace!(dir = %self.name(), name, id = %node.id().short_hex(), "link updated");
        st.encoding.add_link(name, node)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Flush protocol
    // ---------------------------------------------------------------

    /// Collect the current node of every cached child.
    ///
    /// Runs without this directory's lock held: each child takes only its
    /// own lock.
    fn collect_children(&self) -> MfsResult<Vec<Synced>> {
        let cached: Vec<(String, FsNode)> = self
            .lock()
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        cached
            .into_iter()
            .map(|(name, entry)| {
                let node = entry.get_node()?;
                Ok(Synced { name, entry, node })
            })
            .collect()
    }

    /// Write collected child nodes into the encoding. A name that was
    /// unlinked or re-created in the meantime is skipped.
    fn install_synced(&self, st: &mut DirState, synced: Vec<Synced>) -> MfsResult<()> {
        for Synced { name, entry, node } in synced {
            let current = st
                .entries
                .get(&name)
                .is_some_and(|cached| cached.same_instance(&entry));
            if current {
                self.update_child_unsync(st, &name, &node)?;
            }
        }
        Ok(())
    }

    /// Serialize and persist the encoding as it stands.
    fn flush_current_node(&self, st: &mut DirState) -> MfsResult<Node> {
        let node = st.encoding.serialize()?;
        self.inode.store.write(&node)?;
        Ok(node)
    }

    /// This directory's node with every cached descendant synced in,
    /// persisted. The returned node is an independent copy.
    pub fn get_node(&self) -> MfsResult<Node> {
        let synced = self.collect_children()?;
        let mut st = self.lock();
        self.install_synced(&mut st, synced)?;
        self.flush_current_node(&mut st)
    }

    /// Update the link for `name` only. With `propagate`, also persist this
    /// directory's node and return it.
    fn close_child_update(&self, name: &str, node: &Node, propagate: bool) -> MfsResult<Option<Node>> {
        let mut st = self.lock();
        self.update_child_unsync(&mut st, name, node)?;
        if propagate {
            self.flush_current_node(&mut st).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Sync this directory's cached subtree, persist it, and cascade the new
    /// node to the root. Returns this directory's flushed node.
    pub fn flush(&self) -> MfsResult<Node> {
        let node = self.get_node()?;
        self.inode
            .parent
            .close_child(self.name(), node.clone(), true)?;
        debug!(dir = %self.name(), id = %node.id().short_hex(), "flushed");
        Ok(node)
    }

    // ---------------------------------------------------------------
    // Enumeration
    // ---------------------------------------------------------------

    /// Names of every link, in encoding order.
    pub fn list_names(&self) -> MfsResult<Vec<String>> {
        let mut st = self.lock();
        link_names(&mut st.encoding)
    }

    pub fn list(&self) -> MfsResult<Vec<NodeListing>> {
        let mut out = Vec::new();
        self.for_each_entry(|listing| {
            out.push(listing);
            Ok(())
        })?;
        Ok(out)
    }

    /// Visit a listing of every entry.
    ///
    /// The link table is read once under the lock, materializing uncached
    /// entries; listings are computed and handed to `f` after the lock is
    /// released. An error from `f` stops the walk.
    pub fn for_each_entry<F>(&self, mut f: F) -> MfsResult<()>
    where
        F: FnMut(NodeListing) -> MfsResult<()>,
    {
        let entries = {
            let mut st = self.lock();
            let names = link_names(&mut st.encoding)?;
            let mut entries = Vec::with_capacity(names.len());
            for name in names {
                let entry = self.child_unsync(&mut st, &name)?;
                entries.push((name, entry));
            }
            entries
        };
        for (name, entry) in entries {
            f(entry.listing(name)?)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Paths
    // ---------------------------------------------------------------

    /// Absolute path of this directory, `/` for the root.
    ///
    /// # Panics
    ///
    /// If an ancestor has been dropped while this directory is alive. The
    /// parent chain is an internal invariant, not a recoverable condition.
    pub fn path(&self) -> String {
        let mut components = Vec::new();
        let mut name = self.name().to_string();
        let mut parent = self.inode.parent.clone();
        loop {
            match parent {
                ParentRef::Root(_) => break,
                ParentRef::Directory(weak) => {
                    let Some(dir) = weak.upgrade() else {
                        panic!("parent of {name:?} is neither a live directory nor the root");
                    };
                    components.push(name);
                    name = dir.name().to_string();
                    parent = dir.inode.parent.clone();
                }
            }
        }
        components.reverse();
        format!("/{}", components.join("/"))
    }
}

impl ChildCloser for Directory {
    /// Record a child's new node. With `propagate`, persist this directory
    /// and forward its node to the parent, one level at a time.
    fn close_child(&self, name: &str, node: Node, propagate: bool) -> MfsResult<()> {
        let mine = self.close_child_update(name, &node, propagate)?;
        match mine {
            Some(mine) => self.inode.parent.close_child(self.name(), mine, true),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("name", &self.inode.name)
            .finish_non_exhaustive()
    }
}

fn link_names(encoding: &mut DirectoryEncoding) -> MfsResult<Vec<String>> {
    let mut names = Vec::new();
    encoding.for_each_link(&mut |link| {
        names.push(link.name.clone());
        Ok(())
    })?;
    Ok(names)
}

pub(crate) fn validate_name(name: &str) -> MfsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(MfsError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::Root;
    use crate::testing::{empty_root, memory_store, resolve, root_with, FailingStore};
    use arbor_store::StoreError;
    use std::thread;

    fn names(dir: &Directory) -> Vec<String> {
        let mut names = dir.list_names().unwrap();
        names.sort();
        names
    }

    // ---------------------------------------------------------------
    // Cache and lookup
    // ---------------------------------------------------------------

    #[test]
    fn cached_child_is_returned_as_is() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        dir.mkdir("a").unwrap();

        let first = dir.child("a").unwrap();
        let second = dir.child("a").unwrap();
        assert!(first.same_instance(&second));
    }

    #[test]
    fn cache_shadows_stale_link() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let file = dir.create_file("f", b"old".to_vec()).unwrap();
        file.set_content(b"new".to_vec());

        // The link still points at "old"; the cached instance wins.
        let seen = dir.child("f").unwrap();
        assert_eq!(seen.as_file().unwrap().read_all(), b"new");
    }

    #[test]
    fn uncache_rematerializes_from_link() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let file = dir.create_file("f", b"old".to_vec()).unwrap();
        file.set_content(b"unflushed".to_vec());

        dir.uncache("f");
        let fresh = dir.child("f").unwrap();
        assert!(!fresh.same_instance(&FsNode::File(file)));
        assert_eq!(fresh.as_file().unwrap().read_all(), b"old");
    }

    #[test]
    fn missing_child_is_not_found() {
        let store = memory_store();
        let root = empty_root(&store);
        let err = root.directory().child("nope").unwrap_err();
        assert!(matches!(err, MfsError::NotFound(name) if name == "nope"));
    }

    #[test]
    fn metadata_child_is_unsupported() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let meta = Node::new(NodeKind::Metadata, b"{}".to_vec(), dir.identity_builder());
        dir.add_child("meta", meta).unwrap();

        let err = dir.child("meta").unwrap_err();
        assert!(matches!(err, MfsError::Unsupported(NodeKind::Metadata)));
    }

    #[test]
    fn unknown_kind_is_invalid() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let odd = Node::new(NodeKind::Unknown(42), vec![1, 2, 3], dir.identity_builder());
        dir.add_child("odd", odd).unwrap();

        assert!(matches!(dir.child("odd").unwrap_err(), MfsError::Invalid(_)));
    }

    #[test]
    fn unmaterializable_names_still_collide() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let meta = Node::new(NodeKind::Metadata, Vec::new(), dir.identity_builder());
        dir.add_child("meta", meta).unwrap();

        let err = dir.mkdir("meta").unwrap_err();
        assert!(err.is_already_exists());
        assert!(err.existing_directory().is_none());
    }

    #[test]
    fn store_read_failure_surfaces_verbatim() {
        let store = Arc::new(FailingStore::default());
        let root = root_with(store.clone(), MfsConfig::default());
        root.directory().mkdir("a").unwrap();
        let flushed = root.flush().unwrap();
        drop(root);

        let reopened = Root::new(store.clone(), &flushed, MfsConfig::default(), None).unwrap();
        store.fail_reads(true);
        let err = reopened.directory().child("a").unwrap_err();
        assert!(matches!(err, MfsError::Store(StoreError::Backend(_))));

        store.fail_reads(false);
        assert!(reopened.directory().child("a").is_ok());
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    #[test]
    fn mkdir_is_visible_before_flush() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let made = dir.mkdir("docs").unwrap();

        let found = dir.child("docs").unwrap();
        assert!(found.same_instance(&FsNode::Directory(made)));
        assert!(found.as_directory().unwrap().list_names().unwrap().is_empty());
        assert_eq!(names(&dir), vec!["docs"]);
    }

    #[test]
    fn mkdir_collision_returns_original() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let original = dir.mkdir("a").unwrap();

        let err = dir.mkdir("a").unwrap_err();
        let existing = err.into_existing_directory().unwrap();
        assert!(Arc::ptr_eq(&existing, &original));
    }

    #[test]
    fn mkdir_over_file_fails_without_directory() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        dir.create_file("f", Vec::new()).unwrap();

        let err = dir.mkdir("f").unwrap_err();
        assert!(matches!(err, MfsError::AlreadyExists { ref name, existing: None } if name == "f"));
        assert!(dir.create_file("f", Vec::new()).unwrap_err().is_already_exists());
        assert!(dir
            .add_child("f", Node::raw(b"x".to_vec()))
            .unwrap_err()
            .is_already_exists());
    }

    #[test]
    fn invalid_names_are_rejected() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        for bad in ["", ".", "..", "a/b"] {
            assert!(matches!(dir.mkdir(bad).unwrap_err(), MfsError::InvalidName(_)));
        }
    }

    #[test]
    fn mkdir_failure_leaves_no_link() {
        let store = Arc::new(FailingStore::default());
        let root = root_with(store.clone(), MfsConfig::default());
        let dir = root.directory();

        store.fail_writes(true);
        let err = dir.mkdir("a").unwrap_err();
        assert!(matches!(err, MfsError::Store(StoreError::Backend(_))));
        store.fail_writes(false);

        assert!(dir.child("a").unwrap_err().is_not_found());
        assert!(dir.list_names().unwrap().is_empty());
    }

    #[test]
    fn mkdir_all_creates_and_reuses() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();

        let deep = dir.mkdir_all("a/b/c").unwrap();
        assert_eq!(deep.path(), "/a/b/c");
        let again = dir.mkdir_all("/a//b/c/").unwrap();
        assert!(Arc::ptr_eq(&deep, &again));

        deep.create_file("f", Vec::new()).unwrap();
        let err = dir.mkdir_all("a/b/c/f/g").unwrap_err();
        assert!(matches!(err, MfsError::NotADirectory(name) if name == "f"));
    }

    #[test]
    fn unlink_clears_cache_and_link() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        dir.mkdir("a").unwrap();

        dir.unlink("a").unwrap();
        assert!(dir.child("a").unwrap_err().is_not_found());
        assert!(dir.list_names().unwrap().is_empty());
        assert!(dir.unlink("a").unwrap_err().is_not_found());
    }

    #[test]
    fn unlinked_child_is_not_resurrected_by_sync() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let kept = dir.create_file("f", b"x".to_vec()).unwrap();
        dir.unlink("f").unwrap();
        kept.set_content(b"edited".to_vec());

        let flushed = root.flush().unwrap();
        let mut encoding = DirectoryEncoding::from_node(store.clone(), &flushed).unwrap();
        assert_eq!(encoding.link_count().unwrap(), 0);
    }

    #[test]
    fn add_child_links_existing_node() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let node = leaf::file_node(b"payload".to_vec(), &dir.identity_builder());
        let before = dir.mod_time();

        dir.add_child("p", node.clone()).unwrap();
        assert!(dir.mod_time() >= before);
        assert!(store.exists(&node.id()).unwrap());
        assert_eq!(dir.child("p").unwrap().get_node().unwrap().id(), node.id());
    }

    // ---------------------------------------------------------------
    // Flush protocol
    // ---------------------------------------------------------------

    #[test]
    fn flush_is_idempotent() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory().mkdir_all("a/b").unwrap();
        dir.create_file("f", b"x".to_vec()).unwrap();

        let first = root.flush().unwrap();
        let stored = store.len();
        let second = root.flush().unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(store.len(), stored);
    }

    #[test]
    fn flush_cascades_to_root() {
        let store = memory_store();
        let root = empty_root(&store);
        let file = root
            .directory()
            .mkdir_all("a/b/c")
            .unwrap()
            .create_file("f", b"one".to_vec())
            .unwrap();
        let before = root.flush().unwrap();

        file.set_content(b"two".to_vec());
        let c = root.lookup("/a/b/c").unwrap();
        let c_node = c.flush().unwrap();

        let after = root.last_node().unwrap();
        assert_ne!(after.id(), before.id());
        assert_eq!(resolve(&store, &after, "a/b/c").id(), c_node.id());
        assert_eq!(resolve(&store, &after, "a/b/c/f").data(), b"two");
    }

    #[test]
    fn local_close_child_does_not_persist() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let node = leaf::file_node(b"late".to_vec(), &dir.identity_builder());
        store.write(&node).unwrap();
        let writes = store.write_count();

        dir.close_child("late", node.clone(), false).unwrap();
        assert_eq!(store.write_count(), writes);
        assert!(root.last_node().is_none());
        assert_eq!(dir.child("late").unwrap().get_node().unwrap().id(), node.id());
    }

    #[test]
    fn get_node_includes_unflushed_descendants() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let file = dir.mkdir_all("x").unwrap().create_file("f", Vec::new()).unwrap();
        file.write_at(0, b"deep").unwrap();

        let node = dir.get_node().unwrap();
        assert_eq!(resolve(&store, &node, "x/f").data(), b"deep");
        assert!(root.last_node().is_none());
    }

    #[test]
    fn flush_write_failure_surfaces_verbatim() {
        let store = Arc::new(FailingStore::default());
        let root = root_with(store.clone(), MfsConfig::default());
        root.directory().mkdir("a").unwrap();

        store.fail_writes(true);
        let err = root.flush().unwrap_err();
        assert!(matches!(err, MfsError::Store(StoreError::Backend(msg)) if msg.contains("write")));
        assert!(root.last_node().is_none());
    }

    #[test]
    fn identity_builder_applies_to_new_nodes() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        let custom = IdentityBuilder::new("custom-v1");
        dir.set_identity_builder(custom.clone());

        let sub = dir.mkdir("a").unwrap();
        assert_eq!(sub.identity_builder(), custom);
        assert_eq!(dir.get_node().unwrap().builder(), &custom);
    }

    // ---------------------------------------------------------------
    // Sharding
    // ---------------------------------------------------------------

    #[test]
    fn switches_to_sharded_at_threshold() {
        let store = memory_store();
        let root = root_with(store.clone(), MfsConfig::sharded(3));
        let dir = root.directory();

        dir.mkdir("a").unwrap();
        dir.create_file("b", b"bee".to_vec()).unwrap();
        assert!(!dir.is_sharded());
        let a = dir.child("a").unwrap();
        let a_id = a.get_node().unwrap().id();

        dir.mkdir("c").unwrap();
        assert!(dir.is_sharded());

        assert!(dir.child("a").unwrap().same_instance(&a));
        assert_eq!(a.get_node().unwrap().id(), a_id);
        assert_eq!(names(&dir), vec!["a", "b", "c"]);

        // One-way: dropping below the threshold keeps the shard table.
        dir.unlink("c").unwrap();
        dir.unlink("b").unwrap();
        assert!(dir.is_sharded());

        let flushed = root.flush().unwrap();
        assert_eq!(flushed.kind(), NodeKind::HamtShard);
        assert_eq!(resolve(&store, &flushed, "a").id(), a_id);
    }

    #[test]
    fn subdirectories_inherit_policy() {
        let store = memory_store();
        let root = root_with(store.clone(), MfsConfig::sharded(2));
        let sub = root.directory().mkdir("sub").unwrap();
        assert!(!root.directory().is_sharded());

        sub.mkdir("x").unwrap();
        assert!(!sub.is_sharded());
        sub.mkdir("y").unwrap();
        assert!(sub.is_sharded());
    }

    #[test]
    fn disabled_policy_never_shards() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        for i in 0..64 {
            dir.mkdir(&format!("d{i}")).unwrap();
        }
        assert!(!dir.is_sharded());
    }

    #[test]
    fn sharded_tree_reloads_lazily() {
        let store = memory_store();
        let config = MfsConfig::sharded(1).with_fanout(4);
        let root = root_with(store.clone(), config.clone());
        let dir = root.directory();
        for i in 0..40 {
            dir.create_file(&format!("file-{i}"), format!("{i}").into_bytes())
                .unwrap();
        }
        let flushed = root.flush().unwrap();
        drop(root);

        let reopened = Root::new(store.clone(), &flushed, config, None).unwrap();
        let dir = reopened.directory();
        assert!(dir.is_sharded());
        assert_eq!(dir.list_names().unwrap().len(), 40);
        for i in 0..40 {
            let entry = dir.child(&format!("file-{i}")).unwrap();
            assert_eq!(entry.as_file().unwrap().read_all(), format!("{i}").into_bytes());
        }

        for i in 0..39 {
            dir.unlink(&format!("file-{i}")).unwrap();
        }
        assert_eq!(dir.list_names().unwrap(), vec!["file-39"]);
        let shrunk = reopened.flush().unwrap();
        assert_eq!(resolve(&store, &shrunk, "file-39").data(), b"39");
    }

    // ---------------------------------------------------------------
    // Enumeration and paths
    // ---------------------------------------------------------------

    #[test]
    fn listing_reports_unflushed_sizes() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        dir.mkdir("sub").unwrap();
        let file = dir.create_file("f", b"abc".to_vec()).unwrap();
        file.write_at(10, b"z").unwrap();

        let mut listing = dir.list().unwrap();
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(listing.len(), 2);

        assert_eq!(listing[0].name, "f");
        assert_eq!(listing[0].node_type, crate::NodeType::File);
        assert_eq!(listing[0].size, 11);
        assert_eq!(listing[0].hash, file.get_node().unwrap().id().to_string());

        assert_eq!(listing[1].name, "sub");
        assert_eq!(listing[1].node_type, crate::NodeType::Directory);
        assert_eq!(listing[1].size, 0);
        assert!(listing[1].hash.starts_with("b3-"));
    }

    #[test]
    fn for_each_entry_stops_on_error() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        for name in ["a", "b", "c"] {
            dir.mkdir(name).unwrap();
        }

        let mut visited = 0;
        let err = dir
            .for_each_entry(|_| {
                visited += 1;
                Err(MfsError::Invalid("stop".into()))
            })
            .unwrap_err();
        assert_eq!(visited, 1);
        assert!(matches!(err, MfsError::Invalid(msg) if msg == "stop"));
    }

    #[test]
    fn listing_materializes_children() {
        let store = memory_store();
        let root = empty_root(&store);
        root.directory().mkdir_all("a/b").unwrap();
        let flushed = root.flush().unwrap();
        drop(root);

        let reopened = Root::new(store, &flushed, MfsConfig::default(), None).unwrap();
        let dir = reopened.directory();
        dir.list().unwrap();
        assert!(dir.lock().entries.contains_key("a"));
    }

    #[test]
    fn paths_are_absolute() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();
        assert_eq!(dir.path(), "/");
        assert_eq!(dir.mkdir("a").unwrap().path(), "/a");
        assert_eq!(dir.mkdir_all("a/b/c").unwrap().path(), "/a/b/c");
    }

    // ---------------------------------------------------------------
    // Concurrency
    // ---------------------------------------------------------------

    #[test]
    fn concurrent_sibling_mkdirs() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();

        thread::scope(|s| {
            for t in 0..8 {
                let dir = Arc::clone(&dir);
                s.spawn(move || {
                    for i in 0..16 {
                        let sub = dir.mkdir(&format!("t{t}-{i}")).unwrap();
                        sub.create_file("f", vec![t as u8, i as u8]).unwrap();
                    }
                });
            }
            let flusher = Arc::clone(&dir);
            s.spawn(move || {
                for _ in 0..8 {
                    flusher.get_node().unwrap();
                }
            });
        });

        assert_eq!(dir.list_names().unwrap().len(), 128);
        let flushed = root.flush().unwrap();
        assert_eq!(resolve(&store, &flushed, "t3-7/f").data(), &[3, 7]);
    }

    #[test]
    fn child_flush_racing_parent_sync_keeps_newest_node() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory().mkdir("d").unwrap();
        let file = dir.create_file("f", Vec::new()).unwrap();

        thread::scope(|s| {
            let writer = Arc::clone(&file);
            s.spawn(move || {
                for i in 0..64u32 {
                    writer.set_content(i.to_le_bytes().to_vec());
                    writer.flush().unwrap();
                }
            });
            let syncer = Arc::clone(&dir);
            s.spawn(move || {
                for _ in 0..64 {
                    syncer.get_node().unwrap();
                }
            });
        });

        let newest = file.get_node().unwrap();
        assert_eq!(newest.data(), &63u32.to_le_bytes()[..]);
        let parent = dir.get_node().unwrap();
        assert_eq!(resolve(&store, &parent, "f").id(), newest.id());
        let top = root.flush().unwrap();
        assert_eq!(resolve(&store, &top, "d/f").id(), newest.id());
    }

    #[test]
    fn concurrent_mkdir_same_name_has_one_winner() {
        let store = memory_store();
        let root = empty_root(&store);
        let dir = root.directory();

        let made: Vec<Arc<Directory>> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let dir = Arc::clone(&dir);
                    s.spawn(move || dir.mkdir("shared").or_else(MfsError::into_existing_directory))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
        });

        assert!(made.iter().all(|d| Arc::ptr_eq(d, &made[0])));
        assert_eq!(dir.list_names().unwrap(), vec!["shared"]);
    }
}
