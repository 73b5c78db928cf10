//! Fixed-size ring buffer of per-block anchor records, addressed by
//! `block_number mod ANCHOR_RING_BUFFER_SIZE`, in the spirit of EIP-4788's
//! beacon-root ring buffer.

use crate::config::ANCHOR_RING_BUFFER_SIZE;
use crate::error::CoreError;
use crate::primitives::Hash;

/// One slot of the ring: a block hash, a state root, and a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSlot {
    pub block_number: u64,
    pub block_hash: Hash,
    pub state_root: Hash,
    pub timestamp: u64,
}

/// Fixed-capacity ring buffer. Writing at a block number overwrites whatever
/// slot last held `block_number mod len`; only the slot whose stored
/// `block_number` matches the query is considered present.
pub struct AnchorRing {
    slots: Vec<Option<AnchorSlot>>,
}

impl AnchorRing {
    pub fn new() -> Self {
        AnchorRing {
            slots: vec![None; ANCHOR_RING_BUFFER_SIZE as usize],
        }
    }

    fn index(&self, block_number: u64) -> usize {
        (block_number % ANCHOR_RING_BUFFER_SIZE) as usize
    }

    pub fn set(
        &mut self,
        block_number: u64,
        block_hash: Hash,
        state_root: Hash,
        timestamp: u64,
    ) -> Result<(), CoreError> {
        if block_hash.is_zero() {
            return Err(CoreError::InvalidInput("block_hash must be non-zero".into()));
        }
        let idx = self.index(block_number);
        self.slots[idx] = Some(AnchorSlot {
            block_number,
            block_hash,
            state_root,
            timestamp,
        });
        Ok(())
    }

    /// Returns the slot at `block_number`, or `None` if it was never written
    /// or has since been overwritten by a later block sharing the same index.
    pub fn get(&self, block_number: u64) -> Option<AnchorSlot> {
        let idx = self.index(block_number);
        self.slots[idx].filter(|s| s.block_number == block_number)
    }

    pub fn capacity(&self) -> u64 {
        ANCHOR_RING_BUFFER_SIZE
    }
}

impl Default for AnchorRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(b: u8) -> Hash {
        Hash([b; 32])
    }

    #[test]
    fn within_capacity_all_slots_remain() {
        let mut ring = AnchorRing::new();
        for i in 0..100u64 {
            ring.set(i, h(1), h(2), i).unwrap();
        }
        for i in 0..100u64 {
            assert!(ring.get(i).is_some());
        }
    }

    #[test]
    fn beyond_capacity_only_last_n_remain() {
        let mut ring = AnchorRing::new();
        let n = ring.capacity();
        for i in 0..(n + 50) {
            ring.set(i, h(1), h(2), i).unwrap();
        }
        for i in 0..50 {
            assert!(ring.get(i).is_none(), "block {i} should be overwritten");
        }
        for i in 50..(n + 50) {
            assert!(ring.get(i).is_some(), "block {i} should still be present");
        }
    }

    #[test]
    fn zero_block_hash_rejected() {
        let mut ring = AnchorRing::new();
        assert!(ring.set(1, Hash::ZERO, h(2), 1).is_err());
    }
}
