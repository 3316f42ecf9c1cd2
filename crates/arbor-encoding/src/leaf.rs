//! File leaf encoding.
//!
//! A leaf is a single node; there is no chunking. `File` and `Raw` nodes
//! carry their content as the payload, `Symlink` nodes carry the target path.

use arbor_crypto::IdentityBuilder;
use arbor_store::{Node, NodeKind};

use crate::error::{EncodingError, EncodingResult};

pub fn file_node(content: Vec<u8>, builder: &IdentityBuilder) -> Node {
    Node::new(NodeKind::File, content, builder.clone())
}

pub fn symlink_node(target: &str, builder: &IdentityBuilder) -> Node {
    Node::new(NodeKind::Symlink, target.as_bytes().to_vec(), builder.clone())
}

/// Content bytes of a file-like node.
pub fn leaf_content(node: &Node) -> EncodingResult<Vec<u8>> {
    if node.kind().is_file_like() {
        Ok(node.data().to_vec())
    } else {
        Err(EncodingError::UnexpectedKind {
            id: node.id(),
            kind: node.kind(),
            expected: "file, raw or symlink",
        })
    }
}
