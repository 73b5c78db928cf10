//! C6 — native rollup lifecycle: registration, batch submission with
//! state-transition derivation, deposits, and withdrawal proof verification.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::MAX_BATCH_DATA_SIZE;
use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, sha256, Address, Amount, Hash};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRecord {
    pub id: Hash,
    pub rollup_id: u64,
    pub from: Address,
    pub amount: Amount,
    pub l1_block: u64,
    pub finalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStatus {
    Pending,
    Proven,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRecord {
    pub id: Hash,
    pub rollup_id: u64,
    pub to: Address,
    pub amount: Amount,
    pub proof: Vec<u8>,
    pub status: WithdrawalStatus,
}

pub struct NativeRollup {
    pub id: u64,
    pub name: String,
    pub bridge_contract: Address,
    pub state_root: Hash,
    pub last_block: u64,
    pub gas_limit: u64,
    pub total_batches: u64,
    deposit_seq: u64,
    deposits: Vec<DepositRecord>,
    withdrawals: HashMap<Hash, WithdrawalRecord>,
    withdrawal_order: Vec<Hash>,
}

/// Derives the post-state root for a submitted batch (§4.2): intentionally
/// mixes the claimed root into the derivation so repeated submission of the
/// same batch against the same claim is idempotent in its output.
pub fn derive_post_state(pre_root: &Hash, batch_data: &[u8], claimed_root: &Hash) -> Hash {
    keccak256(&[pre_root.as_bytes(), batch_data, claimed_root.as_bytes()])
}

/// Checks the §4.2 withdrawal-proof predicate:
/// `SHA-256(rollup_id_be64 || to || amount_minimal || proof)[0] == len(proof) as u8`.
pub fn verify_withdrawal_proof(rollup_id: u64, to: &Address, amount: &Amount, proof: &[u8]) -> bool {
    let digest = sha256(&[
        &rollup_id.to_be_bytes(),
        &to.0,
        &amount.to_be_minimal(),
        proof,
    ]);
    digest[0] == (proof.len() & 0xff) as u8
}

/// Checks the §4.2 state-transition proof predicate:
/// `SHA-256(old_root || new_root || proof)[0] == len(proof) as u8`.
pub fn verify_state_transition(old_root: &Hash, new_root: &Hash, proof: &[u8]) -> bool {
    let digest = sha256(&[old_root.as_bytes(), new_root.as_bytes(), proof]);
    digest[0] == (proof.len() & 0xff) as u8
}

pub struct RollupRegistry {
    inner: RwLock<HashMap<u64, NativeRollup>>,
}

impl RollupRegistry {
    pub fn new() -> Self {
        RollupRegistry {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(
        &self,
        id: u64,
        name: String,
        bridge_contract: Address,
        genesis_root: Hash,
        gas_limit: u64,
    ) -> CoreResult<()> {
        if id == 0 {
            return Err(CoreError::InvalidInput("rollup id must be non-zero".into()));
        }
        if name.is_empty() {
            return Err(CoreError::InvalidInput("name must be non-empty".into()));
        }
        let mut guard = self.inner.write();
        if guard.contains_key(&id) {
            return Err(CoreError::AlreadyExists(format!("rollup {id}")));
        }
        guard.insert(
            id,
            NativeRollup {
                id,
                name,
                bridge_contract,
                state_root: genesis_root,
                last_block: 0,
                gas_limit,
                total_batches: 0,
                deposit_seq: 0,
                deposits: Vec::new(),
                withdrawals: HashMap::new(),
                withdrawal_order: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn submit_batch(
        &self,
        rollup_id: u64,
        batch_data: &[u8],
        claimed_root: Hash,
        transition_proof: &[u8],
    ) -> CoreResult<Hash> {
        if batch_data.len() > MAX_BATCH_DATA_SIZE {
            return Err(CoreError::CapacityExceeded(
                "batch_data exceeds 2 MiB".into(),
            ));
        }
        let mut guard = self.inner.write();
        let rollup = guard
            .get_mut(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        let post_state = derive_post_state(&rollup.state_root, batch_data, &claimed_root);
        if !verify_state_transition(&rollup.state_root, &post_state, transition_proof) {
            return Err(CoreError::Cryptographic(
                "state transition proof commitment check failed".into(),
            ));
        }
        rollup.state_root = post_state;
        rollup.last_block += 1;
        rollup.total_batches += 1;
        tracing::debug!(rollup_id, block = rollup.last_block, "batch submitted");
        Ok(post_state)
    }

    pub fn deposit(
        &self,
        rollup_id: u64,
        from: Address,
        amount: Amount,
        l1_block: u64,
    ) -> CoreResult<Hash> {
        if from.is_zero() {
            return Err(CoreError::InvalidInput("from must be non-zero".into()));
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidInput("amount must be positive".into()));
        }
        let mut guard = self.inner.write();
        let rollup = guard
            .get_mut(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        let seq = rollup.deposit_seq;
        rollup.deposit_seq += 1;
        let id = keccak256(&[
            &rollup_id.to_be_bytes(),
            &from.0,
            &amount.to_be32()?,
            &seq.to_be_bytes(),
        ]);
        rollup.deposits.push(DepositRecord {
            id,
            rollup_id,
            from,
            amount,
            l1_block,
            finalized: false,
        });
        Ok(id)
    }

    pub fn deposits(&self, rollup_id: u64) -> CoreResult<Vec<DepositRecord>> {
        let guard = self.inner.read();
        let rollup = guard
            .get(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        Ok(rollup.deposits.clone())
    }

    pub fn request_withdrawal(
        &self,
        rollup_id: u64,
        to: Address,
        amount: Amount,
    ) -> CoreResult<Hash> {
        if to.is_zero() {
            return Err(CoreError::InvalidInput("to must be non-zero".into()));
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidInput("amount must be positive".into()));
        }
        let mut guard = self.inner.write();
        let rollup = guard
            .get_mut(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        let id = keccak256(&[
            &rollup_id.to_be_bytes(),
            &to.0,
            &amount.to_be32()?,
            &(rollup.withdrawal_order.len() as u64).to_be_bytes(),
        ]);
        rollup.withdrawals.insert(
            id,
            WithdrawalRecord {
                id,
                rollup_id,
                to,
                amount,
                proof: Vec::new(),
                status: WithdrawalStatus::Pending,
            },
        );
        rollup.withdrawal_order.push(id);
        Ok(id)
    }

    pub fn prove_withdrawal(&self, rollup_id: u64, id: Hash, proof: Vec<u8>) -> CoreResult<()> {
        let mut guard = self.inner.write();
        let rollup = guard
            .get_mut(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        let record = rollup
            .withdrawals
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("withdrawal not found".into()))?;
        if record.status != WithdrawalStatus::Pending {
            return Err(CoreError::StateViolation(
                "withdrawal is not pending".into(),
            ));
        }
        if proof.is_empty() {
            return Err(CoreError::InvalidInput("proof must be non-empty".into()));
        }
        if !verify_withdrawal_proof(rollup_id, &record.to, &record.amount, &proof) {
            return Err(CoreError::Cryptographic(
                "withdrawal proof commitment check failed".into(),
            ));
        }
        record.proof = proof;
        record.status = WithdrawalStatus::Proven;
        Ok(())
    }

    pub fn finalize_withdrawal(&self, rollup_id: u64, id: Hash) -> CoreResult<()> {
        let mut guard = self.inner.write();
        let rollup = guard
            .get_mut(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        let record = rollup
            .withdrawals
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("withdrawal not found".into()))?;
        if record.status != WithdrawalStatus::Proven {
            return Err(CoreError::StateViolation(
                "withdrawal must be proven before finalization".into(),
            ));
        }
        record.status = WithdrawalStatus::Finalized;
        Ok(())
    }

    pub fn get_withdrawal(&self, rollup_id: u64, id: Hash) -> CoreResult<WithdrawalRecord> {
        let guard = self.inner.read();
        let rollup = guard
            .get(&rollup_id)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))?;
        rollup
            .withdrawals
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound("withdrawal not found".into()))
    }

    pub fn state_root(&self, rollup_id: u64) -> CoreResult<Hash> {
        let guard = self.inner.read();
        guard
            .get(&rollup_id)
            .map(|r| r.state_root)
            .ok_or_else(|| CoreError::NotFound(format!("rollup {rollup_id}")))
    }
}

impl Default for RollupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    /// Finds a proof whose length (mod 256) matches the low byte of
    /// `SHA-256(old_root || new_root || proof)`, for a given proof-byte-value.
    fn find_transition_proof(old_root: &Hash, new_root: &Hash) -> Vec<u8> {
        for len in 1u8..=64 {
            let proof = vec![0xCD; len as usize];
            if verify_state_transition(old_root, new_root, &proof) {
                return proof;
            }
        }
        panic!("no satisfying proof found in search range");
    }

    #[test]
    fn batch_submission_advances_state_monotonically() {
        let reg = RollupRegistry::new();
        reg.register(1, "rollup-a".into(), addr(1), Hash([0u8; 32]), 30_000_000)
            .unwrap();
        let root_after_one = derive_post_state(&Hash([0u8; 32]), b"batch-one", &Hash([9u8; 32]));
        let proof1 = find_transition_proof(&Hash([0u8; 32]), &root_after_one);
        let r1 = reg
            .submit_batch(1, b"batch-one", Hash([9u8; 32]), &proof1)
            .unwrap();
        assert_eq!(r1, root_after_one);
        let root_after_two = derive_post_state(&r1, b"batch-two", &Hash([8u8; 32]));
        let proof2 = find_transition_proof(&r1, &root_after_two);
        let r2 = reg
            .submit_batch(1, b"batch-two", Hash([8u8; 32]), &proof2)
            .unwrap();
        assert_ne!(r1, r2);
    }

    #[test]
    fn bad_transition_proof_rejected() {
        let reg = RollupRegistry::new();
        reg.register(1, "rollup-a".into(), addr(1), Hash([0u8; 32]), 30_000_000)
            .unwrap();
        let root_after = derive_post_state(&Hash([0u8; 32]), b"batch-one", &Hash([9u8; 32]));
        let bad_proof = {
            let mut p = find_transition_proof(&Hash([0u8; 32]), &root_after);
            p.push(0xFF);
            p
        };
        assert!(matches!(
            reg.submit_batch(1, b"batch-one", Hash([9u8; 32]), &bad_proof),
            Err(CoreError::Cryptographic(_))
        ));
    }

    #[test]
    fn oversized_batch_rejected() {
        let reg = RollupRegistry::new();
        reg.register(1, "rollup-a".into(), addr(1), Hash([0u8; 32]), 30_000_000)
            .unwrap();
        let huge = vec![0u8; MAX_BATCH_DATA_SIZE + 1];
        assert!(matches!(
            reg.submit_batch(1, &huge, Hash([9u8; 32]), &[]),
            Err(CoreError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn deposit_ids_are_unique_per_sequence() {
        let reg = RollupRegistry::new();
        reg.register(1, "rollup-a".into(), addr(1), Hash([0u8; 32]), 30_000_000)
            .unwrap();
        let d1 = reg.deposit(1, addr(5), Amount::from_u64(10), 100).unwrap();
        let d2 = reg.deposit(1, addr(5), Amount::from_u64(10), 100).unwrap();
        assert_ne!(d1, d2);
        assert_eq!(reg.deposits(1).unwrap().len(), 2);
    }

    #[test]
    fn withdrawal_cannot_skip_proven() {
        let reg = RollupRegistry::new();
        reg.register(1, "rollup-a".into(), addr(1), Hash([0u8; 32]), 30_000_000)
            .unwrap();
        let id = reg
            .request_withdrawal(1, addr(5), Amount::from_u64(10))
            .unwrap();
        assert!(matches!(
            reg.finalize_withdrawal(1, id),
            Err(CoreError::StateViolation(_))
        ));
    }

    #[test]
    fn withdrawal_proof_must_satisfy_commitment_check() {
        let reg = RollupRegistry::new();
        reg.register(1, "rollup-a".into(), addr(1), Hash([0u8; 32]), 30_000_000)
            .unwrap();
        let id = reg
            .request_withdrawal(1, addr(5), Amount::from_u64(10))
            .unwrap();
        let mut found = None;
        for len in 1u8..=8 {
            let proof = vec![0xAB; len as usize];
            if verify_withdrawal_proof(1, &addr(5), &Amount::from_u64(10), &proof) {
                found = Some(proof);
                break;
            }
        }
        // Even if no short proof happens to satisfy it, a wrong proof must fail.
        let bad = vec![0x00; 3];
        if verify_withdrawal_proof(1, &addr(5), &Amount::from_u64(10), &bad) {
            // extremely unlikely; if it matches, skip the negative assertion
        } else {
            assert!(matches!(
                reg.prove_withdrawal(1, id, bad),
                Err(CoreError::Cryptographic(_))
            ));
        }
        if let Some(proof) = found {
            reg.prove_withdrawal(1, id, proof).unwrap();
            reg.finalize_withdrawal(1, id).unwrap();
        }
    }
}
