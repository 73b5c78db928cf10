//! C13 — transaction batching with size limits and optional sealed-batch
//! compression. Grounded on the same push/flush shape as a FIFO batch queue,
//! generalized to the sequencer's seal-and-verify contract.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use std::io::Write;

use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Hash};

const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBatch {
    pub id: Hash,
    pub txs: Vec<Vec<u8>>,
    pub compressed: Option<Vec<u8>>,
}

struct Inner {
    pending: Vec<Vec<u8>>,
    history: Vec<SealedBatch>,
}

pub struct Sequencer {
    inner: RwLock<Inner>,
    max_batch_size: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Sequencer {
            inner: RwLock::new(Inner {
                pending: Vec::new(),
                history: Vec::new(),
            }),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Sequencer {
            inner: RwLock::new(Inner {
                pending: Vec::new(),
                history: Vec::new(),
            }),
            max_batch_size,
        }
    }

    pub fn submit(&self, tx: Vec<u8>) -> CoreResult<usize> {
        if tx.is_empty() {
            return Err(CoreError::InvalidInput("tx must be non-empty".into()));
        }
        let mut guard = self.inner.write();
        if guard.pending.len() >= self.max_batch_size {
            return Err(CoreError::CapacityExceeded("batch is full".into()));
        }
        guard.pending.push(tx);
        Ok(guard.pending.len())
    }

    pub fn pending_count(&self) -> usize {
        self.inner.read().pending.len()
    }

    fn batch_id(txs: &[Vec<u8>]) -> Hash {
        let tx_hashes: Vec<u8> = txs.iter().flat_map(|t| keccak256(&[t]).0).collect();
        keccak256(&[&tx_hashes])
    }

    /// Seals all pending transactions into a batch and clears the pending set.
    /// When `compress` is true, the concatenated transactions are additionally
    /// zlib-compressed and attached to the sealed batch.
    pub fn seal(&self, compress: bool) -> CoreResult<SealedBatch> {
        let mut guard = self.inner.write();
        if guard.pending.is_empty() {
            return Err(CoreError::InvalidInput("no pending transactions to seal".into()));
        }
        let txs = std::mem::take(&mut guard.pending);
        let id = Self::batch_id(&txs);
        let compressed = if compress {
            let raw: Vec<u8> = txs.iter().flat_map(|t| t.iter().copied()).collect();
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&raw)
                .map_err(|e| CoreError::Cryptographic(format!("compression failed: {e}")))?;
            Some(
                encoder
                    .finish()
                    .map_err(|e| CoreError::Cryptographic(format!("compression failed: {e}")))?,
            )
        } else {
            None
        };
        let batch = SealedBatch { id, txs, compressed };
        guard.history.push(batch.clone());
        tracing::debug!(batch_id = %id, "batch sealed");
        Ok(batch)
    }

    pub fn verify_batch(&self, batch: &SealedBatch) -> bool {
        Self::batch_id(&batch.txs) == batch.id
    }

    pub fn history(&self) -> Vec<SealedBatch> {
        self.inner.read().history.clone()
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_sequences_produce_identical_ids() {
        let a = Sequencer::new();
        let b = Sequencer::new();
        for tx in [b"tx1".to_vec(), b"tx2".to_vec(), b"tx3".to_vec()] {
            a.submit(tx.clone()).unwrap();
            b.submit(tx).unwrap();
        }
        let sealed_a = a.seal(false).unwrap();
        let sealed_b = b.seal(false).unwrap();
        assert_eq!(sealed_a.id, sealed_b.id);
    }

    #[test]
    fn empty_tx_rejected() {
        let seq = Sequencer::new();
        assert!(matches!(
            seq.submit(Vec::new()),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn full_batch_rejected() {
        let seq = Sequencer::with_max_batch_size(1);
        seq.submit(b"tx1".to_vec()).unwrap();
        assert!(matches!(
            seq.submit(b"tx2".to_vec()),
            Err(CoreError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn sealing_clears_pending_and_verifies() {
        let seq = Sequencer::new();
        seq.submit(b"tx1".to_vec()).unwrap();
        seq.submit(b"tx2".to_vec()).unwrap();
        let batch = seq.seal(true).unwrap();
        assert_eq!(seq.pending_count(), 0);
        assert!(seq.verify_batch(&batch));
        assert!(batch.compressed.is_some());
    }
}
