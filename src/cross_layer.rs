//! C7 — cross-layer proof engine: deposit/withdrawal message hashing and
//! Merkle inclusion proofs binding a message to an L1 or L2 root.

use crate::error::{CoreError, CoreResult};
use crate::merkle::{self, MerkleProof};
use crate::primitives::{keccak256, Address, Amount, Hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerId {
    L1,
    L2,
}

impl LayerId {
    fn tag(self) -> u8 {
        match self {
            LayerId::L1 => 0,
            LayerId::L2 => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossLayerMessage {
    pub source: LayerId,
    pub destination: LayerId,
    pub nonce: u64,
    pub sender: Address,
    pub target: Address,
    pub value: Amount,
    pub data: Vec<u8>,
}

/// Hashes a message; `None` (the nil message) hashes to the zero hash.
pub fn message_hash(message: Option<&CrossLayerMessage>) -> CoreResult<Hash> {
    let msg = match message {
        None => return Ok(Hash::ZERO),
        Some(m) => m,
    };
    Ok(keccak256(&[
        &[msg.source.tag()],
        &[msg.destination.tag()],
        &msg.nonce.to_be_bytes(),
        &msg.sender.0,
        &msg.target.0,
        &msg.value.to_be32()?,
        &msg.data,
    ]))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf: Hash,
    pub merkle: MerkleProof,
    pub root: Hash,
}

/// Builds an inclusion proof binding `message` (an L1->L2 deposit) to `l1_root`,
/// where `leaves` is the ordered set of message hashes `l1_root` commits to.
pub fn generate_deposit_proof(
    message: &CrossLayerMessage,
    leaves: &[Hash],
    index: usize,
    l1_root: Hash,
) -> CoreResult<InclusionProof> {
    if message.source != LayerId::L1 {
        return Err(CoreError::InvalidInput(
            "deposit proof requires an L1-sourced message".into(),
        ));
    }
    if l1_root.is_zero() {
        return Err(CoreError::InvalidInput("l1_root must be non-zero".into()));
    }
    build_inclusion_proof(message, leaves, index, l1_root)
}

/// Builds an inclusion proof binding `message` (an L2->L1 withdrawal) to `l2_root`.
pub fn generate_withdrawal_proof(
    message: &CrossLayerMessage,
    leaves: &[Hash],
    index: usize,
    l2_root: Hash,
) -> CoreResult<InclusionProof> {
    if message.source != LayerId::L2 {
        return Err(CoreError::InvalidInput(
            "withdrawal proof requires an L2-sourced message".into(),
        ));
    }
    if l2_root.is_zero() {
        return Err(CoreError::InvalidInput("l2_root must be non-zero".into()));
    }
    build_inclusion_proof(message, leaves, index, l2_root)
}

fn build_inclusion_proof(
    message: &CrossLayerMessage,
    leaves: &[Hash],
    index: usize,
    root: Hash,
) -> CoreResult<InclusionProof> {
    let leaf = message_hash(Some(message))?;
    let proof = merkle::build_proof(leaves, index)
        .ok_or_else(|| CoreError::InvalidInput("index out of range for leaf set".into()))?;
    Ok(InclusionProof { leaf, merkle: proof, root })
}

/// Verifies that `proof.leaf` is included under `proof.root`.
pub fn verify_inclusion(proof: &InclusionProof) -> bool {
    merkle::verify_proof(proof.root, proof.leaf, &proof.merkle)
}
