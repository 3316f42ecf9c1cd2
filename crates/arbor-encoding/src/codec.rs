//! Payload codec shared by both encodings.
//!
//! Link tables are serialized as JSON inside a kind-tagged node. The node
//! identity covers the kind tag, so a flat directory and a shard with the
//! same bytes never share an identity.

use arbor_crypto::IdentityBuilder;
use arbor_store::{Node, NodeKind};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{EncodingError, EncodingResult};

pub fn encode<T: Serialize>(
    kind: NodeKind,
    payload: &T,
    builder: &IdentityBuilder,
) -> EncodingResult<Node> {
    let data = serde_json::to_vec(payload).map_err(|e| {
        EncodingError::Store(arbor_store::StoreError::Serialization(e.to_string()))
    })?;
    Ok(Node::new(kind, data, builder.clone()))
}

pub fn decode<T: DeserializeOwned>(node: &Node) -> EncodingResult<T> {
    serde_json::from_slice(node.data()).map_err(|e| EncodingError::Corrupt {
        id: node.id(),
        reason: e.to_string(),
    })
}

/// Fail unless `node` has the expected kind.
pub fn expect_kind(node: &Node, kind: NodeKind, expected: &'static str) -> EncodingResult<()> {
    if node.kind() == kind {
        Ok(())
    } else {
        Err(EncodingError::UnexpectedKind {
            id: node.id(),
            kind: node.kind(),
            expected,
        })
    }
}
