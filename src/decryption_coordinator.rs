//! C16 — reveal-window round management plus pluggable post-reveal
//! transaction ordering policies (time-based, fee-based, hybrid).

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::tx::Transaction;

pub struct Round {
    pub id: u64,
    pub window_start: u64,
    pub window_duration: u64,
    pub threshold: usize,
    pub total_parties: usize,
    shares: HashMap<i64, Vec<u8>>,
    pub finalized: bool,
    pub result: Option<Vec<u8>>,
}

impl Round {
    pub fn is_closed(&self, now: u64) -> bool {
        now >= self.window_start + self.window_duration
    }
}

pub struct DecryptionCoordinator {
    rounds: RwLock<HashMap<u64, Round>>,
}

impl DecryptionCoordinator {
    pub fn new() -> Self {
        DecryptionCoordinator {
            rounds: RwLock::new(HashMap::new()),
        }
    }

    pub fn open_round(
        &self,
        id: u64,
        window_start: u64,
        window_duration: u64,
        threshold: usize,
        total_parties: usize,
    ) -> CoreResult<()> {
        let mut guard = self.rounds.write();
        if guard.contains_key(&id) {
            return Err(CoreError::AlreadyExists(format!("round {id} already open")));
        }
        guard.insert(
            id,
            Round {
                id,
                window_start,
                window_duration,
                threshold,
                total_parties,
                shares: HashMap::new(),
                finalized: false,
                result: None,
            },
        );
        Ok(())
    }

    pub fn submit_share(&self, id: u64, validator_index: i64, share: Vec<u8>, now: u64) -> CoreResult<()> {
        let mut guard = self.rounds.write();
        let round = guard
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("round {id}")))?;
        if round.finalized {
            return Err(CoreError::ScopeError("round already finalized".into()));
        }
        if round.is_closed(now) {
            return Err(CoreError::ScopeError("reveal window is closed".into()));
        }
        round.shares.insert(validator_index, share);
        Ok(())
    }

    pub fn finalize_round(&self, id: u64, result: Vec<u8>) -> CoreResult<()> {
        let mut guard = self.rounds.write();
        let round = guard
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("round {id}")))?;
        if round.finalized {
            return Err(CoreError::ScopeError("round already finalized".into()));
        }
        if round.shares.len() < round.threshold {
            return Err(CoreError::StateViolation("threshold not met".into()));
        }
        round.finalized = true;
        round.result = Some(result);
        Ok(())
    }

    pub fn get_round_result(&self, id: u64) -> CoreResult<Vec<u8>> {
        let guard = self.rounds.read();
        let round = guard
            .get(&id)
            .ok_or_else(|| CoreError::NotFound(format!("round {id}")))?;
        round
            .result
            .clone()
            .ok_or_else(|| CoreError::StateViolation("round not yet finalized".into()))
    }
}

impl Default for DecryptionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// --- Post-reveal ordering policies -----------------------------------------

/// One revealed transaction paired with the caller-chosen ordering inputs:
/// the timestamp its commit was observed, and the transaction itself.
#[derive(Debug, Clone)]
pub struct RevealedEntry {
    pub commit_timestamp: u64,
    pub tx: Option<Transaction>,
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Ascending by commit timestamp.
pub fn order_time_based(entries: &[RevealedEntry]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..entries.len()).collect();
    idx.sort_by_key(|&i| entries[i].commit_timestamp);
    idx
}

/// Descending by effective fee price; a nil transaction prices at zero.
pub fn order_fee_based(entries: &[RevealedEntry]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..entries.len()).collect();
    idx.sort_by(|&a, &b| {
        let pa = entries[a].tx.as_ref().map(|t| t.effective_price()).unwrap_or(0);
        let pb = entries[b].tx.as_ref().map(|t| t.effective_price()).unwrap_or(0);
        pb.cmp(&pa)
    });
    idx
}

/// Blends time and fee scores with weight `w` clamped to `[0, 1]`; `w=0`
/// reduces to time-based ordering, `w=1` to fee-based ordering.
pub fn order_hybrid(entries: &[RevealedEntry], w: f64) -> Vec<usize> {
    let w = w.clamp(0.0, 1.0);
    if entries.is_empty() {
        return Vec::new();
    }
    let times: Vec<f64> = entries.iter().map(|e| e.commit_timestamp as f64).collect();
    let fees: Vec<f64> = entries
        .iter()
        .map(|e| e.tx.as_ref().map(|t| t.effective_price()).unwrap_or(0) as f64)
        .collect();
    // Earlier commit => higher time score; normalize then invert.
    let time_norm = normalize(&times);
    let fee_norm = normalize(&fees);
    let mut scored: Vec<(usize, f64)> = (0..entries.len())
        .map(|i| {
            let time_score = 1.0 - time_norm[i];
            let fee_score = fee_norm[i];
            (i, (1.0 - w) * time_score + w * fee_score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    scored.into_iter().map(|(i, _)| i).collect()
}
