//! C12 — state-transition proofs, a chained batch aggregator, and the
//! dictionary compression codec used to shrink aggregated batch payloads.

use crate::error::{CoreError, CoreResult};
use crate::merkle;
use crate::primitives::{keccak256, Hash};

const MAX_WITNESS_NONCE: u16 = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub tx_index: usize,
    pub change_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransitionProof {
    pub pre_root: Hash,
    pub post_root: Hash,
    pub txs: Vec<Vec<u8>>,
    pub witness: Vec<u8>,
    pub changes: Vec<StateChange>,
}

fn txs_concat(txs: &[Vec<u8>]) -> Vec<u8> {
    txs.iter().flat_map(|t| t.iter().copied()).collect()
}

fn compute_transition_root(pre_root: &Hash, txs: &[Vec<u8>], witness: &[u8]) -> Hash {
    keccak256(&[pre_root.as_bytes(), &txs_concat(txs), witness])
}

fn witness_length_predicate(pre_root: &Hash, witness: &[u8]) -> bool {
    let digest = keccak256(&[pre_root.as_bytes(), witness]);
    digest.as_bytes()[0] == (witness.len() % 256) as u8
}

fn changes_hash(changes: &[StateChange]) -> Hash {
    let preimage: Vec<u8> = changes
        .iter()
        .flat_map(|c| c.change_hash.0.to_vec())
        .collect();
    keccak256(&[&preimage])
}

fn parity_predicate(pre_root: &Hash, changes: &[StateChange], post_root: &Hash) -> bool {
    let ch = changes_hash(changes);
    let digest = keccak256(&[pre_root.as_bytes(), ch.as_bytes(), post_root.as_bytes()]);
    (digest.as_bytes()[0] & 0x0f) == (changes.len() % 16) as u8
}

/// Generates a state-transition proof. Searches a 1-byte nonce appended to
/// `witness_seed` until the witness satisfies the low-byte length predicate.
pub fn generate(
    pre_root: Hash,
    txs: Vec<Vec<u8>>,
    witness_seed: &[u8],
) -> CoreResult<StateTransitionProof> {
    if txs.is_empty() {
        return Err(CoreError::InvalidInput("txs must be non-empty".into()));
    }
    let mut witness = None;
    for nonce in 0..MAX_WITNESS_NONCE {
        let mut candidate = witness_seed.to_vec();
        candidate.push((nonce & 0xff) as u8);
        if witness_length_predicate(&pre_root, &candidate) {
            witness = Some(candidate);
            break;
        }
    }
    let witness = witness
        .ok_or_else(|| CoreError::Cryptographic("could not find a valid witness nonce".into()))?;
    let post_root = compute_transition_root(&pre_root, &txs, &witness);
    let changes = txs
        .iter()
        .enumerate()
        .map(|(i, tx)| StateChange {
            tx_index: i,
            change_hash: keccak256(&[tx]),
        })
        .collect();
    Ok(StateTransitionProof {
        pre_root,
        post_root,
        txs,
        witness,
        changes,
    })
}

/// Verifies a state-transition proof's internal predicates and that its
/// post-root is exactly the transition-root derivation over its own fields.
pub fn verify(proof: &StateTransitionProof) -> CoreResult<bool> {
    if proof.pre_root.is_zero() || proof.post_root.is_zero() {
        return Err(CoreError::InvalidInput("roots must be non-zero".into()));
    }
    if proof.txs.is_empty() || proof.witness.is_empty() {
        return Err(CoreError::InvalidInput("txs and witness must be non-empty".into()));
    }
    if !witness_length_predicate(&proof.pre_root, &proof.witness) {
        return Ok(false);
    }
    if !parity_predicate(&proof.pre_root, &proof.changes, &proof.post_root) {
        return Ok(false);
    }
    let recomputed = compute_transition_root(&proof.pre_root, &proof.txs, &proof.witness);
    Ok(recomputed == proof.post_root)
}

const MAX_BATCH_PROOFS: usize = crate::config::MAX_BATCH_PROOFS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedBatch {
    pub commitments_root: Hash,
    pub chained_root: Hash,
    pub compressed: Vec<u8>,
}

fn proof_commitment(proof: &StateTransitionProof) -> Hash {
    keccak256(&[
        proof.pre_root.as_bytes(),
        proof.post_root.as_bytes(),
        &keccak256(&[&proof.witness]).0,
    ])
}

/// Aggregates a consecutive chain of state-transition proofs (each proof's
/// post-root must equal the next proof's pre-root) into one batch.
pub fn aggregate(proofs: &[StateTransitionProof]) -> CoreResult<AggregatedBatch> {
    if proofs.is_empty() {
        return Err(CoreError::InvalidInput("at least one proof required".into()));
    }
    if proofs.len() > MAX_BATCH_PROOFS {
        return Err(CoreError::CapacityExceeded("max_batch_proofs exceeded".into()));
    }
    for window in proofs.windows(2) {
        if window[0].post_root != window[1].pre_root {
            return Err(CoreError::StateViolation(
                "proofs are not chained: post_root must equal next pre_root".into(),
            ));
        }
    }
    let commitments: Vec<Hash> = proofs.iter().map(proof_commitment).collect();
    let commitments_root = merkle::compute_root(&commitments);
    let chained_root = keccak256(&[
        proofs.first().unwrap().pre_root.as_bytes(),
        proofs.last().unwrap().post_root.as_bytes(),
    ]);
    let raw: Vec<u8> = proofs
        .iter()
        .flat_map(|p| {
            let mut v = Vec::new();
            v.extend_from_slice(p.pre_root.as_bytes());
            v.extend_from_slice(p.post_root.as_bytes());
            v
        })
        .collect();
    let compressed = compress(&raw);
    Ok(AggregatedBatch {
        commitments_root,
        chained_root,
        compressed,
    })
}

/// Verifies an aggregated batch chains exactly from `expected_pre` to
/// `expected_post` and carries a well-formed compressed payload.
pub fn verify_aggregated(
    agg: &AggregatedBatch,
    expected_pre: Hash,
    expected_post: Hash,
) -> CoreResult<bool> {
    let expected_chained = keccak256(&[expected_pre.as_bytes(), expected_post.as_bytes()]);
    if agg.chained_root != expected_chained {
        return Ok(false);
    }
    if agg.compressed.is_empty() {
        return Ok(false);
    }
    let digest = keccak256(&[&agg.compressed, agg.commitments_root.as_bytes()]);
    Ok(digest.as_bytes()[0] != 0)
}

// --- Dictionary compression codec -----------------------------------------

const TAG_LITERAL: u8 = 0x00;
const TAG_BACKREF: u8 = 0x01;
const TAG_REMAINDER: u8 = 0x02;
const CHUNK: usize = 32;

/// Compresses `data` by chunking it into 32-byte blocks and replacing any
/// block that repeats an earlier literal with a 2-byte back-reference.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut dictionary: Vec<[u8; CHUNK]> = Vec::new();
    let full_chunks = data.len() / CHUNK;
    for i in 0..full_chunks {
        let mut chunk = [0u8; CHUNK];
        chunk.copy_from_slice(&data[i * CHUNK..(i + 1) * CHUNK]);
        if let Some(pos) = dictionary.iter().position(|c| *c == chunk) {
            out.push(TAG_BACKREF);
            out.extend_from_slice(&(pos as u16).to_be_bytes());
        } else {
            out.push(TAG_LITERAL);
            out.extend_from_slice(&chunk);
            dictionary.push(chunk);
        }
    }
    let remainder = &data[full_chunks * CHUNK..];
    if !remainder.is_empty() {
        out.push(TAG_REMAINDER);
        out.push(remainder.len() as u8);
        out.extend_from_slice(remainder);
    }
    out
}

/// Reconstructs the original bytes produced by [`compress`].
pub fn decompress(data: &[u8]) -> CoreResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut dictionary: Vec<[u8; CHUNK]> = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            TAG_LITERAL => {
                if i + 1 + CHUNK > data.len() {
                    return Err(CoreError::InvalidInput("truncated literal frame".into()));
                }
                let mut chunk = [0u8; CHUNK];
                chunk.copy_from_slice(&data[i + 1..i + 1 + CHUNK]);
                out.extend_from_slice(&chunk);
                dictionary.push(chunk);
                i += 1 + CHUNK;
            }
            TAG_BACKREF => {
                if i + 3 > data.len() {
                    return Err(CoreError::InvalidInput("truncated back-reference frame".into()));
                }
                let pos = u16::from_be_bytes([data[i + 1], data[i + 2]]) as usize;
                let chunk = *dictionary
                    .get(pos)
                    .ok_or_else(|| CoreError::InvalidInput("back-reference out of range".into()))?;
                out.extend_from_slice(&chunk);
                i += 3;
            }
            TAG_REMAINDER => {
                if i + 2 > data.len() {
                    return Err(CoreError::InvalidInput("truncated remainder frame".into()));
                }
                let len = data[i + 1] as usize;
                if i + 2 + len > data.len() {
                    return Err(CoreError::InvalidInput("truncated remainder payload".into()));
                }
                out.extend_from_slice(&data[i + 2..i + 2 + len]);
                i += 2 + len;
            }
            other => return Err(CoreError::InvalidInput(format!("unknown frame tag {other}"))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_verify_round_trips() {
        let pre = Hash([7u8; 32]);
        let txs = vec![b"tx-a".to_vec(), b"tx-b".to_vec()];
        let proof = generate(pre, txs, b"seed").unwrap();
        assert!(verify(&proof).unwrap());
    }

    #[test]
    fn tampered_post_root_fails_verification() {
        let pre = Hash([7u8; 32]);
        let txs = vec![b"tx-a".to_vec()];
        let mut proof = generate(pre, txs, b"seed").unwrap();
        proof.post_root = Hash([0xee; 32]);
        assert!(!verify(&proof).unwrap());
    }

    #[test]
    fn aggregation_requires_chained_proofs() {
        let p1 = generate(Hash([1; 32]), vec![b"a".to_vec()], b"s1").unwrap();
        let mut p2 = generate(Hash([2; 32]), vec![b"b".to_vec()], b"s2").unwrap();
        p2.pre_root = Hash([9; 32]); // breaks the chain
        assert!(aggregate(&[p1, p2]).is_err());
    }

    #[test]
    fn aggregation_chains_and_verifies() {
        let p1 = generate(Hash([1; 32]), vec![b"a".to_vec()], b"s1").unwrap();
        let mid = p1.post_root;
        let p2 = generate(mid, vec![b"b".to_vec()], b"s2").unwrap();
        let last = p2.post_root;
        let agg = aggregate(&[p1, p2]).unwrap();
        assert!(verify_aggregated(&agg, Hash([1; 32]), last).unwrap());
        assert!(!verify_aggregated(&agg, Hash([1; 32]), Hash([0xff; 32])).unwrap());
    }

    #[test]
    fn compression_round_trips_with_repeated_chunks() {
        let mut chunk = [0u8; 32];
        chunk[0] = 0xAB;
        let mut data = Vec::new();
        data.extend_from_slice(&chunk);
        data.extend_from_slice(&chunk); // repeats -> back-reference
        data.extend_from_slice(b"short-tail");
        let compressed = compress(&data);
        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, data);
        // the back-reference encoding must be smaller than two literal chunks
        assert!(compressed.len() < 2 * (1 + CHUNK) + 1 + 1 + b"short-tail".len());
    }

    proptest::proptest! {
        /// decompress(compress(data)) == data for arbitrary byte strings,
        /// including lengths that aren't a multiple of the chunk size.
        #[test]
        fn prop_compression_round_trips(data in proptest::collection::vec(0u8..=255, 0..512)) {
            let compressed = compress(&data);
            let restored = decompress(&compressed).unwrap();
            proptest::prop_assert_eq!(restored, data);
        }
    }
}
