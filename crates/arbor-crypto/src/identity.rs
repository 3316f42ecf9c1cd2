use std::fmt;

use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};

/// Default identity domain for nodes written by Arbor.
pub const DEFAULT_NODE_DOMAIN: &str = "arbor-node-v1";

/// Computes the content identity of an encoded node.
///
/// The identity of a node is `BLAKE3(len(domain) domain kind-tag data)`, with
/// the domain length as a little-endian `u64`. The length prefix keeps a domain
/// containing arbitrary bytes from spilling into the tag or payload. Two nodes
/// with the same kind, payload and builder always get the same identity; a
/// directory can switch builders to re-identify everything it writes from
/// then on without affecting nodes already in the store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityBuilder {
    domain: String,
}

impl IdentityBuilder {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Identity of a node with the given kind tag and encoded payload.
    pub fn identify(&self, kind_tag: u8, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.domain.len() as u64).to_le_bytes());
        hasher.update(self.domain.as_bytes());
        hasher.update(&[kind_tag]);
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }
}

impl Default for IdentityBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_DOMAIN)
    }
}

impl fmt::Debug for IdentityBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityBuilder({})", self.domain)
    }
}
