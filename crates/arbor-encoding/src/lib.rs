//! Directory encodings for Arbor.
//!
//! A directory's persisted form is a link table mapping entry names to node
//! identities. Two encodings exist:
//!
//! - [`BasicDirectory`] -- one node holding a sorted link list
//! - [`HamtDirectory`] -- a hash-array-mapped trie of [`NodeKind::HamtShard`]
//!   nodes, which bounds the size of any single node under high fan-out
//!
//! [`DirectoryEncoding`] wraps either one and is what the tree layer holds.
//! Both implement [`LinkTable`]. The [`leaf`] module encodes file leaves.
//!
//! [`NodeKind::HamtShard`]: arbor_store::NodeKind::HamtShard

pub mod basic;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod hamt;
pub mod leaf;

pub use basic::{empty_directory_node, BasicDirectory, DirectoryPayload};
pub use encoding::{DirectoryEncoding, LinkTable};
pub use error::{EncodingError, EncodingResult};
pub use hamt::{HamtDirectory, ShardPayload, ShardSlot, SlotEntry, DEFAULT_FANOUT};
