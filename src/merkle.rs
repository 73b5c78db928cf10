//! Binary Merkle tree over a leaf sequence, with the standard odd-leaf
//! doubling rule, plus inclusion-proof generation and verification.

use crate::primitives::{keccak256, Hash};

/// Computes the Merkle root over `leaves` in insertion order. An empty leaf
/// set roots to the zero hash; a single leaf roots to itself.
pub fn compute_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        level = hash_level(&level);
    }
    level[0]
}

fn hash_level(level: &[Hash]) -> Vec<Hash> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = level[i];
        let right = if i + 1 < level.len() { level[i + 1] } else { left };
        next.push(keccak256(&[left.as_bytes(), right.as_bytes()]));
        i += 2;
    }
    next
}

/// A Merkle inclusion proof: the sibling hash at each level, ordered from the
/// leaf level upward, plus the leaf's index (used to decide left/right).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub siblings: Vec<Hash>,
}

/// Builds an inclusion proof for the leaf at `index` within `leaves`.
pub fn build_proof(leaves: &[Hash], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }
    let mut siblings = Vec::new();
    let mut level: Vec<Hash> = leaves.to_vec();
    let mut idx = index;
    while level.len() > 1 {
        let sibling_idx = idx ^ 1;
        let sibling = if sibling_idx < level.len() {
            level[sibling_idx]
        } else {
            level[idx]
        };
        siblings.push(sibling);
        level = hash_level(&level);
        idx /= 2;
    }
    Some(MerkleProof {
        leaf_index: index,
        siblings,
    })
}

/// Recomputes the root implied by `leaf`, `proof`, and the proof's own index,
/// walking siblings bottom-up. Left/right at each level is decided by the
/// corresponding bit of the index.
pub fn compute_root_from_proof(leaf: Hash, proof: &MerkleProof) -> Hash {
    let mut current = leaf;
    let mut idx = proof.leaf_index;
    for sibling in &proof.siblings {
        current = if idx & 1 == 0 {
            keccak256(&[current.as_bytes(), sibling.as_bytes()])
        } else {
            keccak256(&[sibling.as_bytes(), current.as_bytes()])
        };
        idx >>= 1;
    }
    current
}

/// Verifies that `leaf` is included under `root` per `proof`.
pub fn verify_proof(root: Hash, leaf: Hash, proof: &MerkleProof) -> bool {
    compute_root_from_proof(leaf, proof) == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: u8) -> Hash {
        keccak256(&[&[b]])
    }

    #[test]
    fn empty_set_roots_to_zero() {
        assert_eq!(compute_root(&[]), Hash::ZERO);
    }

    #[test]
    fn single_leaf_roots_to_itself() {
        let l = leaf(1);
        assert_eq!(compute_root(&[l]), l);
    }

    #[test]
    fn odd_leaf_count_duplicates_last() {
        let leaves = vec![leaf(1), leaf(2), leaf(3)];
        let padded = vec![leaf(1), leaf(2), leaf(3), leaf(3)];
        assert_eq!(compute_root(&leaves), compute_root(&padded));
    }

    #[test]
    fn every_leaf_proves_inclusion() {
        let leaves: Vec<Hash> = (0..7u8).map(leaf).collect();
        let root = compute_root(&leaves);
        for (i, l) in leaves.iter().enumerate() {
            let proof = build_proof(&leaves, i).unwrap();
            assert!(verify_proof(root, *l, &proof), "leaf {i} failed to verify");
        }
    }

    #[test]
    fn tampered_leaf_fails_verification() {
        let leaves: Vec<Hash> = (0..4u8).map(leaf).collect();
        let root = compute_root(&leaves);
        let proof = build_proof(&leaves, 2).unwrap();
        assert!(!verify_proof(root, leaf(99), &proof));
    }

    proptest::proptest! {
        /// Every leaf in an arbitrary-size, arbitrary-content leaf set proves
        /// inclusion under the root computed from that same set.
        #[test]
        fn prop_every_leaf_proves_inclusion(
            raw_leaves in proptest::collection::vec(
                proptest::collection::vec(0u8..=255, 32),
                1..64,
            )
        ) {
            let leaves: Vec<Hash> = raw_leaves
                .into_iter()
                .map(|bytes| {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(&bytes);
                    Hash(arr)
                })
                .collect();
            let root = compute_root(&leaves);
            for (i, l) in leaves.iter().enumerate() {
                let proof = build_proof(&leaves, i).unwrap();
                proptest::prop_assert!(verify_proof(root, *l, &proof));
            }
        }
    }
}
