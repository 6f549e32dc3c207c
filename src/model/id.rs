//! Content-hash identity for nodes using BLAKE3.

use crate::error::ModelError;
use crate::model::{wire, Node};
use crate::types::ObjectId;
use blake3::Hasher;

/// Compute the id for a node.
///
/// id = hex(blake3("node" || bytes_len || canonical_bytes))
///
/// The canonical bytes sort member keys and replace detached children with
/// their own ids, so the result is independent of member insertion order and
/// a parent id changes whenever any detached descendant changes.
pub fn compute_node_id(node: &Node) -> Result<ObjectId, ModelError> {
    let bytes = wire::canonical_bytes(node)?;

    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"node");

    // Hash payload length (8 bytes, big-endian for determinism)
    hasher.update(&(bytes.len() as u64).to_be_bytes());

    // Hash canonical payload
    hasher.update(&bytes);

    Ok(ObjectId::new(hex::encode(hasher.finalize().as_bytes())))
}
