//! C8 — deposit queue with nonce-replay protection, finalization-gated
//! processing, and Merkle-root exposure over queued deposits/withdrawals.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::merkle;
use crate::primitives::{keccak256, Address, Amount, Hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueDepositStatus {
    Pending,
    Ready,
    Processed,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDeposit {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub nonce: u64,
    pub l1_block: u64,
    pub status: QueueDepositStatus,
}

impl QueueDeposit {
    fn leaf(&self) -> Hash {
        keccak256(&[
            &self.sender.0,
            &self.recipient.0,
            &self.amount.to_be32().unwrap_or([0u8; 32]),
            &self.nonce.to_be_bytes(),
        ])
    }
}

struct Inner {
    deposits: Vec<QueueDeposit>,
    last_nonce: HashMap<Address, u64>,
    finalized_l1_block: u64,
    withdrawal_leaves: Vec<Hash>,
}

pub struct BridgeQueue {
    inner: RwLock<Inner>,
}

impl BridgeQueue {
    pub fn new() -> Self {
        BridgeQueue {
            inner: RwLock::new(Inner {
                deposits: Vec::new(),
                last_nonce: HashMap::new(),
                finalized_l1_block: 0,
                withdrawal_leaves: Vec::new(),
            }),
        }
    }

    pub fn queue_deposit(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
        nonce: u64,
        l1_block: u64,
    ) -> CoreResult<()> {
        if sender.is_zero() || recipient.is_zero() {
            return Err(CoreError::InvalidInput(
                "sender and recipient must be non-zero".into(),
            ));
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidInput("amount must be positive".into()));
        }
        let mut guard = self.inner.write();
        let last = guard.last_nonce.get(&sender).copied().unwrap_or(0);
        if nonce <= last && guard.last_nonce.contains_key(&sender) {
            return Err(CoreError::StateViolation(
                "nonce must exceed sender's last-seen nonce".into(),
            ));
        }
        guard.last_nonce.insert(sender, nonce);
        guard.deposits.push(QueueDeposit {
            sender,
            recipient,
            amount,
            nonce,
            l1_block,
            status: QueueDepositStatus::Pending,
        });
        Ok(())
    }

    /// Returns (and marks Processed) all Pending deposits whose `l1_block` is
    /// at or below the finalized L1 block, sorted ascending by nonce.
    pub fn process_deposits(&self, _l2_block: u64) -> CoreResult<Vec<QueueDeposit>> {
        let mut guard = self.inner.write();
        let finalized = guard.finalized_l1_block;
        let mut ready_idx: Vec<usize> = guard
            .deposits
            .iter()
            .enumerate()
            .filter(|(_, d)| d.status == QueueDepositStatus::Pending && d.l1_block <= finalized)
            .map(|(i, _)| i)
            .collect();
        if ready_idx.is_empty() {
            return Err(CoreError::NotFound("no deposits ready to process".into()));
        }
        ready_idx.sort_by_key(|&i| guard.deposits[i].nonce);
        let mut out = Vec::with_capacity(ready_idx.len());
        for idx in &ready_idx {
            guard.deposits[*idx].status = QueueDepositStatus::Processed;
            out.push(guard.deposits[*idx].clone());
        }
        Ok(out)
    }

    /// Monotonically advances the finalized L1 block, promoting Processed
    /// deposits at or below it to Finalized.
    pub fn finalize(&self, l1_block: u64) -> CoreResult<usize> {
        let mut guard = self.inner.write();
        if l1_block <= guard.finalized_l1_block {
            return Ok(0);
        }
        guard.finalized_l1_block = l1_block;
        let finalized = guard.finalized_l1_block;
        let mut count = 0;
        for d in guard.deposits.iter_mut() {
            if d.status == QueueDepositStatus::Processed && d.l1_block <= finalized {
                d.status = QueueDepositStatus::Finalized;
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn deposit_root(&self) -> Hash {
        let guard = self.inner.read();
        let leaves: Vec<Hash> = guard.deposits.iter().map(|d| d.leaf()).collect();
        merkle::compute_root(&leaves)
    }

    pub fn record_withdrawal_leaf(&self, leaf: Hash) {
        self.inner.write().withdrawal_leaves.push(leaf);
    }

    pub fn withdrawal_root(&self) -> Hash {
        let guard = self.inner.read();
        merkle::compute_root(&guard.withdrawal_leaves)
    }
}

impl Default for BridgeQueue {
    fn default() -> Self {
        Self::new()
    }
}
