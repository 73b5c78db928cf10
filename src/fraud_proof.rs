//! C10 — single-step fraud proof generation/verification and interactive
//! bisection of a disputed execution interval.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudProofType {
    InvalidStateRoot,
    InvalidReceipt,
    InvalidTransaction,
}

/// Executes a single transaction against a pre-state root, producing the
/// actual post-state root. Implemented by callers; tests use a deterministic
/// Keccak-256 stub.
pub trait TxExecutor {
    fn execute(&self, pre_root: &Hash, tx: &[u8]) -> Hash;
}

/// Verifies a fraud proof's claimed invalidity against some external source
/// of truth (a real state-transition verifier in production).
pub trait StateVerifier {
    fn verify(&self, pre_root: &Hash, post_root: &Hash, proof: &[u8]) -> bool;
}

pub struct KeccakExecutor;

impl TxExecutor for KeccakExecutor {
    fn execute(&self, pre_root: &Hash, tx: &[u8]) -> Hash {
        keccak256(&[pre_root.as_bytes(), tx])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudProof {
    pub proof_type: FraudProofType,
    pub block_number: u64,
    pub step_index: u64,
    pub pre_root: Hash,
    pub post_root: Hash,
    pub expected_root: Hash,
    pub proof: Vec<u8>,
}

pub enum GenerateOutcome {
    NoFraud,
    Proof(FraudProof),
}

fn commitment(pre: &Hash, post: &Hash, expected: &Hash, tx_hash: &Hash) -> Hash {
    keccak256(&[pre.as_bytes(), post.as_bytes(), expected.as_bytes(), tx_hash.as_bytes()])
}

fn build_blob(pre: &Hash, post: &Hash, expected: &Hash, tx_hash: &Hash) -> Vec<u8> {
    let c = commitment(pre, post, expected, tx_hash);
    let mut blob = Vec::with_capacity(32 * 5);
    blob.extend_from_slice(pre.as_bytes());
    blob.extend_from_slice(post.as_bytes());
    blob.extend_from_slice(expected.as_bytes());
    blob.extend_from_slice(tx_hash.as_bytes());
    blob.extend_from_slice(c.as_bytes());
    blob
}

/// Generates a single-step fraud proof by replaying `tx` against `pre_root`
/// and comparing to `claimed_post`. Returns `NoFraud` when the claim matches.
pub fn generate_single_step_proof(
    executor: &dyn TxExecutor,
    proof_type: FraudProofType,
    block_number: u64,
    step_index: u64,
    pre_root: Hash,
    claimed_post: Hash,
    tx: &[u8],
) -> CoreResult<GenerateOutcome> {
    if block_number == 0 {
        return Err(CoreError::InvalidInput("block_number must be non-zero".into()));
    }
    if pre_root.is_zero() || claimed_post.is_zero() {
        return Err(CoreError::InvalidInput("roots must be non-zero".into()));
    }
    let expected = executor.execute(&pre_root, tx);
    if expected == claimed_post {
        return Ok(GenerateOutcome::NoFraud);
    }
    let tx_hash = keccak256(&[tx]);
    let proof = build_blob(&pre_root, &claimed_post, &expected, &tx_hash);
    Ok(GenerateOutcome::Proof(FraudProof {
        proof_type,
        block_number,
        step_index,
        pre_root,
        post_root: claimed_post,
        expected_root: expected,
        proof,
    }))
}

/// Verifies a fraud proof's blob integrity, then consults `verifier`. Fraud is
/// confirmed iff the verifier rejects the claimed post-state.
pub fn verify_fraud_proof(proof: &FraudProof, verifier: &dyn StateVerifier) -> CoreResult<bool> {
    if proof.proof.is_empty() {
        return Err(CoreError::InvalidInput("proof blob must be non-empty".into()));
    }
    if proof.proof.len() != 32 * 5 {
        return Err(CoreError::InvalidInput("malformed proof blob length".into()));
    }
    let pre = &proof.proof[0..32];
    let post = &proof.proof[32..64];
    let expected = &proof.proof[64..96];
    let tx_hash = &proof.proof[96..128];
    let commitment_field = &proof.proof[128..160];
    let recomputed = keccak256(&[pre, post, expected, tx_hash]);
    if recomputed.as_bytes() != commitment_field {
        return Err(CoreError::Cryptographic(
            "fraud proof commitment mismatch".into(),
        ));
    }
    let verifier_says_valid = verifier.verify(&proof.pre_root, &proof.post_root, &proof.proof);
    Ok(!verifier_says_valid)
}

/// An interactive bisection session over execution steps `[start, end)`.
pub struct BisectionSession {
    pub block_number: u64,
    pub start: u64,
    pub end: u64,
    claimer_roots: HashMap<u64, Hash>,
    challenger_roots: HashMap<u64, Hash>,
    pub converged: bool,
    pub disputed_step: Option<u64>,
}

impl BisectionSession {
    pub fn new(block_number: u64, start: u64, end: u64) -> CoreResult<Self> {
        if end <= start {
            return Err(CoreError::InvalidInput("end must exceed start".into()));
        }
        Ok(BisectionSession {
            block_number,
            start,
            end,
            claimer_roots: HashMap::new(),
            challenger_roots: HashMap::new(),
            converged: false,
            disputed_step: None,
        })
    }

    /// Records both parties' roots at the current midpoint and narrows the
    /// interval. Errors if the session already converged.
    pub fn bisect(&mut self, claimer_root: Hash, challenger_root: Hash) -> CoreResult<u64> {
        if self.converged {
            return Err(CoreError::ScopeError("bisection already converged".into()));
        }
        let mid = self.start + (self.end - self.start) / 2;
        self.claimer_roots.insert(mid, claimer_root);
        self.challenger_roots.insert(mid, challenger_root);
        if claimer_root == challenger_root {
            self.start = mid;
        } else {
            self.end = mid;
        }
        if self.end <= self.start + 1 {
            self.converged = true;
            self.disputed_step = Some(self.start);
        }
        Ok(mid)
    }

    pub fn generate_bisection_proof(&self) -> CoreResult<FraudProof> {
        if !self.converged {
            return Err(CoreError::ScopeError("bisection has not converged".into()));
        }
        let step = self.disputed_step.unwrap();
        let claimer = self
            .claimer_roots
            .get(&step)
            .copied()
            .unwrap_or(Hash::ZERO);
        let challenger = self
            .challenger_roots
            .get(&step)
            .copied()
            .unwrap_or(Hash::ZERO);
        let tx_hash = keccak256(&[&step.to_be_bytes()]);
        let proof = build_blob(&claimer, &challenger, &challenger, &tx_hash);
        Ok(FraudProof {
            proof_type: FraudProofType::InvalidStateRoot,
            block_number: self.block_number,
            step_index: step,
            pre_root: claimer,
            post_root: challenger,
            expected_root: challenger,
            proof,
        })
    }
}
