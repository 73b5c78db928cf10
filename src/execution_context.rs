//! C11 — per-call execution context: call-depth tracking, gas
//! reservation/refund, and a final result-hash commitment.

use crate::config::{MAX_CALL_DEPTH, MAX_GAS_PER_EXEC_DEFAULT};
use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Address, Hash};

/// Per-instance ceilings for an [`ExecutionContext`]; defaults mirror the
/// crate-wide protocol constants but callers may tighten either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionConfig {
    pub max_call_depth: u32,
    pub max_gas_budget: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_call_depth: MAX_CALL_DEPTH,
            max_gas_budget: MAX_GAS_PER_EXEC_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionCallRecord {
    pub depth: u32,
    pub target_rollup_id: u64,
    pub caller: Address,
    pub input: Vec<u8>,
    pub gas_provided: u64,
    pub gas_used: u64,
    pub success: bool,
    pub output_hash: Option<Hash>,
}

struct OpenFrame {
    depth: u32,
    target_rollup_id: u64,
    caller: Address,
    input: Vec<u8>,
    gas_reserved: u64,
}

pub struct ExecutionContext {
    rollup_id: u64,
    gas_remaining: u64,
    initial_budget: u64,
    max_call_depth: u32,
    open: Vec<OpenFrame>,
    completed: Vec<ExecutionCallRecord>,
    finished: bool,
    result_hash: Option<Hash>,
}

impl ExecutionContext {
    pub fn new(rollup_id: u64, budget: u64, config: ExecutionConfig) -> Self {
        let clamped = budget.min(config.max_gas_budget);
        ExecutionContext {
            rollup_id,
            gas_remaining: clamped,
            initial_budget: clamped,
            max_call_depth: config.max_call_depth,
            open: Vec::new(),
            completed: Vec::new(),
            finished: false,
            result_hash: None,
        }
    }

    pub fn depth(&self) -> u32 {
        self.open.len() as u32
    }

    pub fn begin_call(
        &mut self,
        target_rollup_id: u64,
        caller: Address,
        input: Vec<u8>,
        gas: u64,
    ) -> CoreResult<()> {
        if self.finished {
            return Err(CoreError::ScopeError("execution context already finished".into()));
        }
        if target_rollup_id == 0 {
            return Err(CoreError::InvalidInput("target_rollup_id must be non-zero".into()));
        }
        if input.is_empty() {
            return Err(CoreError::InvalidInput("input must be non-empty".into()));
        }
        let depth = self.depth();
        if depth >= self.max_call_depth {
            return Err(CoreError::CapacityExceeded("max_call_depth reached".into()));
        }
        if gas > self.gas_remaining {
            return Err(CoreError::StateViolation("insufficient gas to reserve".into()));
        }
        self.gas_remaining -= gas;
        self.open.push(OpenFrame {
            depth,
            target_rollup_id,
            caller,
            input,
            gas_reserved: gas,
        });
        Ok(())
    }

    pub fn end_call(&mut self, gas_used: u64, success: bool, output: &[u8]) -> CoreResult<()> {
        if self.finished {
            return Err(CoreError::ScopeError("execution context already finished".into()));
        }
        let frame = self
            .open
            .pop()
            .ok_or_else(|| CoreError::ScopeError("no open call to end".into()))?;
        let charged = gas_used.min(frame.gas_reserved);
        let refund = frame.gas_reserved - charged;
        self.gas_remaining += refund;
        let output_hash = if output.is_empty() {
            None
        } else {
            Some(keccak256(&[output]))
        };
        self.completed.push(ExecutionCallRecord {
            depth: frame.depth,
            target_rollup_id: frame.target_rollup_id,
            caller: frame.caller,
            input: frame.input,
            gas_provided: frame.gas_reserved,
            gas_used: charged,
            success,
            output_hash,
        });
        Ok(())
    }

    pub fn gas_used_total(&self) -> u64 {
        self.completed.iter().map(|c| c.gas_used).sum()
    }

    /// Finalizes the context: no further calls may begin or end. Records a
    /// result hash committing to the rollup id, total gas used, and every
    /// completed call's depth/gas/success/output-hash.
    pub fn finish(&mut self) -> CoreResult<Hash> {
        if self.finished {
            return Err(CoreError::ScopeError("execution context already finished".into()));
        }
        if !self.open.is_empty() {
            return Err(CoreError::ScopeError("calls still open".into()));
        }
        let total = self.gas_used_total();
        if total > self.initial_budget {
            return Err(CoreError::StateViolation("total gas used exceeds budget".into()));
        }
        let mut preimage: Vec<u8> = Vec::new();
        preimage.extend_from_slice(&self.rollup_id.to_be_bytes());
        preimage.extend_from_slice(&total.to_be_bytes());
        for c in &self.completed {
            preimage.extend_from_slice(&c.depth.to_be_bytes());
            preimage.extend_from_slice(&c.gas_used.to_be_bytes());
            preimage.push(c.success as u8);
            preimage.extend_from_slice(c.output_hash.unwrap_or(Hash::ZERO).as_bytes());
        }
        let result_hash = keccak256(&[&preimage]);
        self.result_hash = Some(result_hash);
        self.finished = true;
        Ok(result_hash)
    }

    pub fn verify_result(&self, claim: Hash) -> bool {
        self.result_hash == Some(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_clamped_to_global_max() {
        let ctx = ExecutionContext::new(1, u64::MAX, ExecutionConfig::default());
        assert_eq!(ctx.initial_budget, MAX_GAS_PER_EXEC_DEFAULT);
    }

    #[test]
    fn budget_is_clamped_to_configured_max() {
        let config = ExecutionConfig {
            max_call_depth: MAX_CALL_DEPTH,
            max_gas_budget: 5_000,
        };
        let ctx = ExecutionContext::new(1, 10_000, config);
        assert_eq!(ctx.initial_budget, 5_000);
    }

    #[test]
    fn gas_is_reserved_and_refunded() {
        let mut ctx = ExecutionContext::new(1, 1_000, ExecutionConfig::default());
        ctx.begin_call(7, Address([1; 20]), vec![1, 2, 3], 500).unwrap();
        assert_eq!(ctx.gas_remaining, 500);
        ctx.end_call(200, true, b"ok").unwrap();
        assert_eq!(ctx.gas_remaining, 800);
        assert_eq!(ctx.gas_used_total(), 200);
    }

    #[test]
    fn depth_limit_enforced() {
        let config = ExecutionConfig {
            max_call_depth: 2,
            max_gas_budget: MAX_GAS_PER_EXEC_DEFAULT,
        };
        let mut ctx = ExecutionContext::new(1, 10_000_000, config);
        ctx.begin_call(1, Address([1; 20]), vec![1], 1).unwrap();
        ctx.begin_call(1, Address([1; 20]), vec![1], 1).unwrap();
        assert!(matches!(
            ctx.begin_call(1, Address([1; 20]), vec![1], 1),
            Err(CoreError::CapacityExceeded(_))
        ));
    }

    #[test]
    fn result_hash_matches_verify() {
        let mut ctx = ExecutionContext::new(1, 1_000, ExecutionConfig::default());
        ctx.begin_call(7, Address([1; 20]), vec![1, 2, 3], 500).unwrap();
        ctx.end_call(200, true, b"ok").unwrap();
        let hash = ctx.finish().unwrap();
        assert!(ctx.verify_result(hash));
        assert!(!ctx.verify_result(Hash([0xff; 32])));
    }
}
