//! Mutable directory trees over an immutable, content-addressed store.
//!
//! A [`Root`] owns one tree. Each [`Directory`] in it keeps a lazy cache of
//! the children that have been looked up, and an encoding of its persisted
//! link table. Edits touch only the cache and the local encoding; a
//! [`Directory::flush`] serializes the changed subtree and cascades the new
//! identities up to the root one level at a time.
//!
//! # Key Types
//!
//! - [`Root`] -- owns the tree and receives the final identity of each flush
//! - [`Directory`] -- cache, flush protocol and sharding policy
//! - [`File`] -- single-node file leaf
//! - [`FsNode`] -- a cached tree entry, either a directory or a file
//! - [`NodeListing`] -- one row of a directory listing
//! - [`MfsConfig`] -- per-tree configuration (sharding, identity builder)
//!
//! # Locking
//!
//! Every directory and file has its own mutex. No operation holds two of
//! them at once: a flush collects child nodes before taking the parent's
//! lock to install them, and the cascade releases each level before
//! notifying the next.

pub mod config;
pub mod dir;
pub mod error;
pub mod file;
pub mod fsnode;
mod inode;
pub mod root;

#[cfg(test)]
mod testing;

pub use config::{MfsConfig, ShardingPolicy};
pub use dir::Directory;
pub use error::{MfsError, MfsResult};
pub use file::File;
pub use fsnode::{FsNode, NodeListing, NodeType};
pub use inode::ChildCloser;
pub use root::{PublishFn, Root};
