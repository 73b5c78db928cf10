//! C4 — multi-chain registry of anchor points, confirmation tracking, and
//! per-chain pruning. One `RwLock` guards the whole registry (§5).

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::primitives::Hash;

const DEFAULT_MAX_CHAINS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorChainConfig {
    pub chain_id: u64,
    pub anchor_address: [u8; 20],
    pub genesis_root: Hash,
    pub confirmation_depth: u64,
    pub max_gas_per_execution: u64,
}

impl AnchorChainConfig {
    pub fn new(chain_id: u64, anchor_address: [u8; 20], genesis_root: Hash) -> Self {
        AnchorChainConfig {
            chain_id,
            anchor_address,
            genesis_root,
            confirmation_depth: crate::config::ANCHOR_CONFIRMATION_DEPTH_DEFAULT,
            max_gas_per_execution: crate::config::ANCHOR_MAX_GAS_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorEntry {
    pub l1_block: u64,
    pub l2_state_root: Hash,
    pub timestamp: u64,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainMetrics {
    pub total: usize,
    pub confirmed: usize,
    pub avg_confirmation_depth: u64,
}

struct ChainState {
    config: AnchorChainConfig,
    history: Vec<AnchorEntry>,
}

/// Registry of anchor chains and their anchor-point history.
pub struct AnchorTracker {
    inner: RwLock<HashMap<u64, ChainState>>,
    max_chains: usize,
}

impl AnchorTracker {
    pub fn new() -> Self {
        AnchorTracker {
            inner: RwLock::new(HashMap::new()),
            max_chains: DEFAULT_MAX_CHAINS,
        }
    }

    pub fn with_max_chains(max_chains: usize) -> Self {
        AnchorTracker {
            inner: RwLock::new(HashMap::new()),
            max_chains,
        }
    }

    pub fn register_chain(&self, config: AnchorChainConfig) -> CoreResult<()> {
        if config.chain_id == 0 {
            return Err(CoreError::InvalidInput("chain_id must be non-zero".into()));
        }
        let mut guard = self.inner.write();
        if guard.contains_key(&config.chain_id) {
            return Err(CoreError::AlreadyExists(format!(
                "chain {} already registered",
                config.chain_id
            )));
        }
        if guard.len() >= self.max_chains {
            return Err(CoreError::CapacityExceeded(
                "max_chains reached".into(),
            ));
        }
        guard.insert(
            config.chain_id,
            ChainState {
                config,
                history: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn update_anchor(
        &self,
        chain_id: u64,
        l1_block: u64,
        l2_state_root: Hash,
        timestamp: u64,
    ) -> CoreResult<()> {
        let mut guard = self.inner.write();
        let chain = guard
            .get_mut(&chain_id)
            .ok_or_else(|| CoreError::NotFound(format!("chain {chain_id}")))?;
        if let Some(last) = chain.history.last() {
            if l1_block <= last.l1_block {
                return Err(CoreError::StateViolation(
                    "l1_block must strictly increase".into(),
                ));
            }
        }
        chain.history.push(AnchorEntry {
            l1_block,
            l2_state_root,
            timestamp,
            confirmed: false,
        });
        tracing::debug!(chain_id, l1_block, "anchor recorded");
        Ok(())
    }

    pub fn get_latest(&self, chain_id: u64) -> CoreResult<AnchorEntry> {
        let guard = self.inner.read();
        let chain = guard
            .get(&chain_id)
            .ok_or_else(|| CoreError::NotFound(format!("chain {chain_id}")))?;
        chain
            .history
            .last()
            .copied()
            .ok_or_else(|| CoreError::NotFound("no anchors recorded".into()))
    }

    /// Returns up to `n` most recent anchors, newest first.
    pub fn get_history(&self, chain_id: u64, n: usize) -> CoreResult<Vec<AnchorEntry>> {
        let guard = self.inner.read();
        let chain = guard
            .get(&chain_id)
            .ok_or_else(|| CoreError::NotFound(format!("chain {chain_id}")))?;
        Ok(chain.history.iter().rev().take(n).copied().collect())
    }

    /// Marks the anchor at `l1_block` confirmed. Idempotent; confirming an
    /// already-confirmed anchor is a no-op, never a downgrade.
    pub fn confirm(&self, chain_id: u64, l1_block: u64) -> CoreResult<()> {
        let mut guard = self.inner.write();
        let chain = guard
            .get_mut(&chain_id)
            .ok_or_else(|| CoreError::NotFound(format!("chain {chain_id}")))?;
        let entry = chain
            .history
            .iter_mut()
            .find(|e| e.l1_block == l1_block)
            .ok_or_else(|| CoreError::NotFound(format!("no anchor at block {l1_block}")))?;
        entry.confirmed = true;
        Ok(())
    }

    pub fn prune(&self, chain_id: u64, before_block: u64) -> CoreResult<usize> {
        let mut guard = self.inner.write();
        let chain = guard
            .get_mut(&chain_id)
            .ok_or_else(|| CoreError::NotFound(format!("chain {chain_id}")))?;
        let before = chain.history.len();
        chain.history.retain(|e| e.l1_block >= before_block);
        Ok(before - chain.history.len())
    }

    pub fn active_chains(&self) -> Vec<u64> {
        self.inner.read().keys().copied().collect()
    }

    pub fn chain_metrics(&self, chain_id: u64) -> CoreResult<ChainMetrics> {
        let guard = self.inner.read();
        let chain = guard
            .get(&chain_id)
            .ok_or_else(|| CoreError::NotFound(format!("chain {chain_id}")))?;
        let total = chain.history.len();
        let confirmed_entries: Vec<&AnchorEntry> =
            chain.history.iter().filter(|e| e.confirmed).collect();
        let confirmed = confirmed_entries.len();
        let avg_confirmation_depth = if confirmed == 0 {
            0
        } else {
            let latest_l1 = chain.history.last().map(|e| e.l1_block).unwrap_or(0);
            let sum: u64 = confirmed_entries
                .iter()
                .map(|e| latest_l1 - e.l1_block)
                .sum();
            sum / confirmed as u64
        };
        Ok(ChainMetrics {
            total,
            confirmed,
            avg_confirmation_depth,
        })
    }
}

impl Default for AnchorTracker {
    fn default() -> Self {
        Self::new()
    }
}
