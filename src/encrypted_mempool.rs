//! §4.12 — the encrypted mempool protocol: a higher-level commit/reveal
//! surface with multi-revealer consensus and block-driven expiry, distinct
//! from the per-transaction pool in [`crate::commit_reveal`].

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Address, Hash};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCommit {
    pub sender: Address,
    pub encrypted_data: Vec<u8>,
    pub commit_block: u64,
    pub revealers: HashSet<Address>,
    pub decrypted: Option<Vec<u8>>,
    pub revealed: bool,
}

pub struct EncryptedMempool {
    inner: RwLock<HashMap<Hash, EncryptedCommit>>,
    max_pending_commits: usize,
    commit_window: u64,
    reveal_window: u64,
    min_revealers: usize,
}

impl EncryptedMempool {
    pub fn new(max_pending_commits: usize, commit_window: u64, reveal_window: u64, min_revealers: usize) -> Self {
        EncryptedMempool {
            inner: RwLock::new(HashMap::new()),
            max_pending_commits,
            commit_window,
            reveal_window,
            min_revealers: min_revealers.max(1),
        }
    }

    pub fn commit(&self, sender: Address, encrypted_data: Vec<u8>, block: u64) -> CoreResult<Hash> {
        if encrypted_data.is_empty() {
            return Err(CoreError::InvalidInput("encrypted_data must be non-empty".into()));
        }
        let hash = keccak256(&[&sender.0, &encrypted_data]);
        let mut guard = self.inner.write();
        if guard.contains_key(&hash) {
            return Err(CoreError::AlreadyExists("commit already exists".into()));
        }
        if self.max_pending_commits > 0 && guard.len() >= self.max_pending_commits {
            return Err(CoreError::CapacityExceeded("max_pending_commits reached".into()));
        }
        guard.insert(
            hash,
            EncryptedCommit {
                sender,
                encrypted_data,
                commit_block: block,
                revealers: HashSet::new(),
                decrypted: None,
                revealed: false,
            },
        );
        Ok(hash)
    }

    /// Records a revealer's decrypted payload. The first payload submitted
    /// wins; later revealers are only recorded for quorum purposes.
    pub fn reveal(&self, hash: Hash, decrypted: Vec<u8>, revealer: Address) -> CoreResult<bool> {
        let mut guard = self.inner.write();
        let entry = guard
            .get_mut(&hash)
            .ok_or_else(|| CoreError::NotFound("commit not found".into()))?;
        if entry.decrypted.is_none() {
            entry.decrypted = Some(decrypted);
        }
        entry.revealers.insert(revealer);
        if entry.revealers.len() >= self.min_revealers {
            entry.revealed = true;
        }
        Ok(entry.revealed)
    }

    /// Removes unrevealed commits whose deadline (`commit_block + commit_window
    /// + reveal_window`) has passed. Revealed commits are never expired.
    pub fn expire_old_commits(&self, current_block: u64) -> usize {
        let mut guard = self.inner.write();
        let before = guard.len();
        let deadline_span = self.commit_window + self.reveal_window;
        guard.retain(|_, c| c.revealed || current_block <= c.commit_block + deadline_span);
        before - guard.len()
    }

    pub fn get(&self, hash: Hash) -> Option<EncryptedCommit> {
        self.inner.read().get(&hash).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_commit_rejected() {
        let pool = EncryptedMempool::new(0, 10, 10, 1);
        let sender = Address([1; 20]);
        pool.commit(sender, vec![1, 2, 3], 0).unwrap();
        assert!(matches!(
            pool.commit(sender, vec![1, 2, 3], 0),
            Err(CoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn reveal_becomes_final_at_quorum() {
        let pool = EncryptedMempool::new(0, 10, 10, 2);
        let sender = Address([1; 20]);
        let hash = pool.commit(sender, vec![9, 9], 0).unwrap();
        let r1 = pool.reveal(hash, vec![1], Address([2; 20])).unwrap();
        assert!(!r1);
        let r2 = pool.reveal(hash, vec![1], Address([3; 20])).unwrap();
        assert!(r2);
        assert_eq!(pool.get(hash).unwrap().decrypted, Some(vec![1]));
    }

    #[test]
    fn revealed_commits_never_expire() {
        let pool = EncryptedMempool::new(0, 1, 1, 1);
        let sender = Address([1; 20]);
        let hash = pool.commit(sender, vec![9], 0).unwrap();
        pool.reveal(hash, vec![1], Address([2; 20])).unwrap();
        pool.expire_old_commits(1000);
        assert!(pool.get(hash).is_some());
    }

    #[test]
    fn unrevealed_commits_expire_past_deadline() {
        let pool = EncryptedMempool::new(0, 5, 5, 1);
        let sender = Address([1; 20]);
        let hash = pool.commit(sender, vec![9], 0).unwrap();
        let expired = pool.expire_old_commits(11);
        assert_eq!(expired, 1);
        assert!(pool.get(hash).is_none());
    }
}
