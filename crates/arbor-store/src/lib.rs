//! Content-addressed node storage for Arbor.
//!
//! Every directory, shard and file in an Arbor tree is persisted as an
//! immutable [`Node`] identified by the hash of its kind tag and payload.
//! The store never interprets payloads; decoding belongs to the encoding
//! layer above it.
//!
//! # Node Kinds
//!
//! - [`NodeKind::Directory`] / [`NodeKind::HamtShard`] -- link tables
//! - [`NodeKind::File`] / [`NodeKind::Raw`] / [`NodeKind::Symlink`] -- leaves
//! - [`NodeKind::Metadata`] -- recognized, not supported by the tree layer
//! - [`NodeKind::Unknown`] -- any other tag
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Nodes are immutable once written (content-addressing guarantees this).
//! 2. Persist-then-link: a node is written before anything references it.
//! 3. Writes are idempotent: writing identical content again is a no-op.
//! 4. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod node;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use node::{Link, Node, NodeKind};
pub use traits::ObjectStore;
