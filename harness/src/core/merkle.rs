//! SHA-256 Merkle commitment over an ordered step sequence.
//!
//! Leaf = SHA256(canonicalize(step)), node = SHA256(left_hex ∥ right_hex) over
//! the lowercase hex strings, odd layers duplicate their last node. A single
//! leaf is its own root.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::canonical::canonicalize;
use crate::core::types::Step;
use crate::error::HarnessError;

/// Commitment to the exact ordered content of a plan's steps.
///
/// Built once per request and never mutated; verification recomputes hashes
/// from the step content handed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerkleCommitment {
    leaves: Vec<String>,
    root: String,
}

impl MerkleCommitment {
    /// Commit to `steps` in order. Fails on an empty step list.
    pub fn build(steps: &[Step]) -> Result<Self, HarnessError> {
        if steps.is_empty() {
            return Err(HarnessError::Validation(
                "cannot build a Merkle commitment from an empty step list".to_string(),
            ));
        }
        let leaves = steps.iter().map(leaf_hash).collect::<Result<Vec<_>, _>>()?;
        let root = reduce_to_root(leaves.clone());
        debug!(leaf_count = leaves.len(), %root, "built merkle commitment");
        Ok(Self { leaves, root })
    }

    /// Hex-encoded root hash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Leaf hashes in step order.
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Recompute the leaf for `step` and compare it to the stored leaf at `index`.
    ///
    /// Out-of-range indices and steps that cannot be encoded return `false`.
    /// Callers must treat `false` as a hard halt: never retried, never
    /// partial success.
    pub fn verify_leaf(&self, index: usize, step: &Step) -> bool {
        match (self.leaves.get(index), leaf_hash(step)) {
            (Some(stored), Ok(recomputed)) => *stored == recomputed,
            _ => false,
        }
    }
}

/// Lowercase hex SHA-256 of the canonical encoding of `step`.
pub fn leaf_hash(step: &Step) -> Result<String, HarnessError> {
    Ok(sha256_hex(canonicalize(step)?.as_bytes()))
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn reduce_to_root(mut layer: Vec<String>) -> String {
    while layer.len() > 1 {
        if layer.len() % 2 == 1
            && let Some(last) = layer.last().cloned()
        {
            layer.push(last);
        }
        layer = layer
            .chunks(2)
            .map(|pair| {
                let mut joined = String::with_capacity(pair[0].len() + pair[1].len());
                joined.push_str(&pair[0]);
                joined.push_str(&pair[1]);
                sha256_hex(joined.as_bytes())
            })
            .collect();
    }
    layer.pop().unwrap_or_default()
}
