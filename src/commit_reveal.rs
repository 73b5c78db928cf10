//! C14 — commit-reveal transaction pool: commit now, reveal the transaction
//! later, expire unrevealed commitments once their deadline passes.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::COMMIT_REVEAL_WINDOW_SECS;
use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Address, Hash};
use crate::tx::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Committed,
    Revealed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub commit_hash: Hash,
    pub sender: Address,
    pub gas_limit: u64,
    pub max_fee: u64,
    pub timestamp: u64,
    pub state: CommitState,
    pub reveal_deadline: u64,
    pub revealed_tx: Option<Transaction>,
}

pub struct CommitRevealPool {
    inner: RwLock<HashMap<Hash, CommitRecord>>,
}

impl CommitRevealPool {
    pub fn new() -> Self {
        CommitRevealPool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_commit(
        &self,
        commit_hash: Hash,
        sender: Address,
        gas_limit: u64,
        max_fee: u64,
        timestamp: u64,
    ) -> CoreResult<()> {
        let mut guard = self.inner.write();
        if guard.contains_key(&commit_hash) {
            return Err(CoreError::AlreadyExists("commit already exists".into()));
        }
        guard.insert(
            commit_hash,
            CommitRecord {
                commit_hash,
                sender,
                gas_limit,
                max_fee,
                timestamp,
                state: CommitState::Committed,
                reveal_deadline: timestamp + COMMIT_REVEAL_WINDOW_SECS,
                revealed_tx: None,
            },
        );
        Ok(())
    }

    pub fn add_reveal(&self, commit_hash: Hash, tx: Option<Transaction>) -> CoreResult<()> {
        let tx = tx.ok_or_else(|| CoreError::InvalidInput("tx must not be nil".into()))?;
        let mut guard = self.inner.write();
        let record = guard
            .get_mut(&commit_hash)
            .ok_or_else(|| CoreError::NotFound("commit not found".into()))?;
        if record.state == CommitState::Revealed {
            return Err(CoreError::StateViolation("commit already revealed".into()));
        }
        let expected = keccak256(&[&tx.canonical_encode()]);
        if expected != commit_hash {
            return Err(CoreError::Cryptographic(
                "reveal does not match commit hash".into(),
            ));
        }
        record.state = CommitState::Revealed;
        record.revealed_tx = Some(tx);
        Ok(())
    }

    /// Removes every Committed record whose reveal deadline has passed.
    /// Returns the number removed.
    pub fn expire(&self, now: u64) -> usize {
        let mut guard = self.inner.write();
        let before = guard.len();
        guard.retain(|_, r| {
            !(r.state == CommitState::Committed && now > r.reveal_deadline)
        });
        before - guard.len()
    }

    pub fn pending(&self) -> usize {
        self.inner
            .read()
            .values()
            .filter(|r| r.state == CommitState::Committed)
            .count()
    }

    pub fn committed(&self) -> usize {
        self.inner.read().len()
    }

    pub fn get(&self, commit_hash: Hash) -> Option<CommitRecord> {
        self.inner.read().get(&commit_hash).cloned()
    }
}

impl Default for CommitRevealPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::FeeModel;
    use crate::primitives::Amount;

    fn sample_tx() -> Transaction {
        Transaction {
            nonce: 0,
            gas_limit: 21_000,
            to: Address([2; 20]),
            value: Amount::from_u64(1),
            data: vec![],
            fee: FeeModel::Legacy { gas_price: 1 },
        }
    }

    #[test]
    fn scenario_s6_commit_expiry() {
        let pool = CommitRevealPool::new();
        let tx = sample_tx();
        let hash = keccak256(&[&tx.canonical_encode()]);
        pool.add_commit(hash, Address([1; 20]), 21_000, 10, 100)
            .unwrap();
        let expired = pool.expire(113);
        assert_eq!(expired, 1);
        assert_eq!(pool.pending(), 0);
        assert!(matches!(
            pool.add_reveal(hash, Some(tx)),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn reveal_must_match_commit_hash() {
        let pool = CommitRevealPool::new();
        let tx = sample_tx();
        let hash = keccak256(&[&tx.canonical_encode()]);
        pool.add_commit(hash, Address([1; 20]), 21_000, 10, 100)
            .unwrap();
        let mut wrong = tx.clone();
        wrong.nonce += 1;
        assert!(matches!(
            pool.add_reveal(hash, Some(wrong)),
            Err(CoreError::Cryptographic(_))
        ));
        pool.add_reveal(hash, Some(tx)).unwrap();
        assert_eq!(pool.pending(), 0);
        assert_eq!(pool.committed(), 1);
    }

    #[test]
    fn duplicate_commit_rejected() {
        let pool = CommitRevealPool::new();
        let tx = sample_tx();
        let hash = keccak256(&[&tx.canonical_encode()]);
        pool.add_commit(hash, Address([1; 20]), 21_000, 10, 100)
            .unwrap();
        assert!(matches!(
            pool.add_commit(hash, Address([1; 20]), 21_000, 10, 100),
            Err(CoreError::AlreadyExists(_))
        ));
    }
}
