//! C9 — sync checkpoints binding L1<->L2 roots, finalization by depth,
//! divergence detection, and a bounded-retention append-only journal.

use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Hash};

const DEFAULT_MAX_JOURNAL_ENTRIES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCheckpoint {
    pub l1_block: u64,
    pub l2_block: u64,
    pub l1_root: Hash,
    pub l2_root: Hash,
    pub commitment: Hash,
    pub finalized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    Checkpoint,
    Finalization,
    Divergence,
    Reconciliation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncJournalEntry {
    pub sequence: u64,
    pub l1_block: u64,
    pub l2_block: u64,
    pub event: SyncEvent,
    pub data_hash: Hash,
}

fn commitment_for(l1_root: &Hash, l2_root: &Hash, l1_block: u64, l2_block: u64) -> Hash {
    keccak256(&[
        l1_root.as_bytes(),
        l2_root.as_bytes(),
        &l1_block.to_be_bytes(),
        &l2_block.to_be_bytes(),
    ])
}

struct Inner {
    checkpoints: Vec<SyncCheckpoint>,
    journal: Vec<SyncJournalEntry>,
    next_sequence: u64,
}

pub struct SyncEngine {
    inner: RwLock<Inner>,
    finalization_depth: u64,
    max_journal_entries: usize,
}

impl SyncEngine {
    pub fn new(finalization_depth: u64) -> Self {
        Self::with_max_journal_entries(finalization_depth, DEFAULT_MAX_JOURNAL_ENTRIES)
    }

    pub fn with_max_journal_entries(finalization_depth: u64, max_journal_entries: usize) -> Self {
        SyncEngine {
            inner: RwLock::new(Inner {
                checkpoints: Vec::new(),
                journal: Vec::new(),
                next_sequence: 0,
            }),
            finalization_depth,
            max_journal_entries,
        }
    }

    fn append_journal(&self, inner: &mut Inner, l1_block: u64, l2_block: u64, event: SyncEvent, data_hash: Hash) {
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.journal.push(SyncJournalEntry {
            sequence,
            l1_block,
            l2_block,
            event,
            data_hash,
        });
        if inner.journal.len() > self.max_journal_entries {
            let excess = inner.journal.len() - self.max_journal_entries;
            inner.journal.drain(0..excess);
        }
    }

    pub fn create_checkpoint(
        &self,
        l1_block: u64,
        l2_block: u64,
        l1_root: Hash,
        l2_root: Hash,
    ) -> CoreResult<Hash> {
        let mut inner = self.inner.write();
        if let Some(last) = inner.checkpoints.last() {
            if l2_block <= last.l2_block {
                return Err(CoreError::StateViolation(
                    "l2_block must strictly increase".into(),
                ));
            }
            if l1_block < last.l1_block {
                return Err(CoreError::StateViolation(
                    "l1_block must not regress".into(),
                ));
            }
        }
        let commitment = commitment_for(&l1_root, &l2_root, l1_block, l2_block);
        inner.checkpoints.push(SyncCheckpoint {
            l1_block,
            l2_block,
            l1_root,
            l2_root,
            commitment,
            finalized: false,
        });
        self.append_journal(&mut inner, l1_block, l2_block, SyncEvent::Checkpoint, commitment);
        Ok(commitment)
    }

    /// Finalizes every checkpoint whose age (`current_l1 - l1_block`) reaches
    /// `finalization_depth`. Returns the number newly finalized.
    pub fn finalize_checkpoints(&self, current_l1: u64) -> usize {
        let mut inner = self.inner.write();
        let depth = self.finalization_depth;
        let mut newly = Vec::new();
        for cp in inner.checkpoints.iter_mut() {
            if !cp.finalized && current_l1 >= cp.l1_block + depth {
                cp.finalized = true;
                newly.push((cp.l1_block, cp.l2_block, cp.commitment));
            }
        }
        let count = newly.len();
        for (l1_block, l2_block, commitment) in newly {
            self.append_journal(&mut inner, l1_block, l2_block, SyncEvent::Finalization, commitment);
        }
        count
    }

    /// Returns true (and records a Divergence entry) when the stored checkpoint
    /// at `l2_block` has an L2 root different from `claimed_root`.
    pub fn detect_divergence(&self, l2_block: u64, claimed_root: Hash) -> CoreResult<bool> {
        let mut inner = self.inner.write();
        let cp = inner
            .checkpoints
            .iter()
            .find(|c| c.l2_block == l2_block)
            .copied()
            .ok_or_else(|| CoreError::NotFound(format!("no checkpoint at l2 block {l2_block}")))?;
        if cp.l2_root == claimed_root {
            return Ok(false);
        }
        let data_hash = keccak256(&[cp.l2_root.as_bytes(), claimed_root.as_bytes()]);
        self.append_journal(&mut inner, cp.l1_block, l2_block, SyncEvent::Divergence, data_hash);
        Ok(true)
    }

    pub fn latest_finalized_checkpoint(&self) -> Option<SyncCheckpoint> {
        self.inner
            .read()
            .checkpoints
            .iter()
            .rev()
            .find(|c| c.finalized)
            .copied()
    }

    pub fn journal(&self) -> Vec<SyncJournalEntry> {
        self.inner.read().journal.clone()
    }

    pub fn prune_before(&self, l2_block: u64) {
        let mut inner = self.inner.write();
        inner.checkpoints.retain(|c| c.l2_block >= l2_block);
        inner.journal.retain(|j| j.l2_block >= l2_block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s4_checkpoint_finalization() {
        let engine = SyncEngine::new(10);
        engine
            .create_checkpoint(10, 100, Hash([1u8; 32]), Hash([2u8; 32]))
            .unwrap();
        engine
            .create_checkpoint(20, 200, Hash([3u8; 32]), Hash([4u8; 32]))
            .unwrap();
        assert_eq!(engine.finalize_checkpoints(15), 0);
        assert_eq!(engine.finalize_checkpoints(30), 2);
        let latest = engine.latest_finalized_checkpoint().unwrap();
        assert_eq!(latest.l2_block, 200);
    }

    #[test]
    fn l2_block_must_strictly_increase() {
        let engine = SyncEngine::new(10);
        engine
            .create_checkpoint(10, 100, Hash([1u8; 32]), Hash([2u8; 32]))
            .unwrap();
        assert!(matches!(
            engine.create_checkpoint(20, 100, Hash([1u8; 32]), Hash([2u8; 32])),
            Err(CoreError::StateViolation(_))
        ));
    }

    #[test]
    fn divergence_detected_and_journaled() {
        let engine = SyncEngine::new(10);
        engine
            .create_checkpoint(10, 100, Hash([1u8; 32]), Hash([2u8; 32]))
            .unwrap();
        let diverged = engine.detect_divergence(100, Hash([9u8; 32])).unwrap();
        assert!(diverged);
        assert!(engine
            .journal()
            .iter()
            .any(|j| j.event == SyncEvent::Divergence));
    }

    #[test]
    fn journal_retention_drops_oldest() {
        let engine = SyncEngine::with_max_journal_entries(1, 5);
        for i in 1..20u64 {
            engine
                .create_checkpoint(i, i, Hash([i as u8; 32]), Hash([i as u8; 32]))
                .unwrap();
        }
        let journal = engine.journal();
        assert_eq!(journal.len(), 5);
        // the oldest entries (sequence 0..=13) must have been evicted.
        assert_eq!(journal.first().unwrap().sequence, 14);
        assert_eq!(journal.last().unwrap().sequence, 18);
    }
}
