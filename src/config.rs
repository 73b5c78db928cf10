//! Cross-component protocol constants.
//!
//! There is no environment or CLI surface in this crate: every constant below
//! is compiled in, and every per-instance override is a constructor argument.

/// Default number of confirmations before an anchor point is considered confirmed.
pub const ANCHOR_CONFIRMATION_DEPTH_DEFAULT: u64 = 64;

/// Default per-execution gas ceiling for a registered anchor chain.
pub const ANCHOR_MAX_GAS_DEFAULT: u64 = 30_000_000;

/// Default number of L1 blocks a sync checkpoint must age before finalization.
pub const FINALIZATION_DEPTH_DEFAULT: u64 = 64;

/// Size of the anchor ring buffer (EIP-4788 style), indexed by `block_number mod N`.
pub const ANCHOR_RING_BUFFER_SIZE: u64 = 8191;

/// Seconds a commit may stand before its reveal deadline passes.
pub const COMMIT_REVEAL_WINDOW_SECS: u64 = 12;

/// Wire tag identifying an EIP-4844 blob transaction in block data; rejected by policy.
pub const BLOB_TX_TYPE: u8 = 0x03;

/// Hard ceiling on a single batch's raw transaction payload.
pub const MAX_BATCH_DATA_SIZE: usize = 2 * 1024 * 1024;

/// Hard ceiling on the `block_data` field of an EXECUTE precompile call.
pub const MAX_BLOCK_DATA_SIZE: usize = 1024 * 1024;

/// Maximum proofs a single aggregated batch may chain together.
pub const MAX_BATCH_PROOFS: usize = 256;

/// Maximum call-stack depth inside one execution context.
pub const MAX_CALL_DEPTH: u32 = 32;

/// Default per-execution-context gas budget.
pub const MAX_GAS_PER_EXEC_DEFAULT: u64 = 10_000_000;

/// Base gas cost charged by the EXECUTE precompile, before the per-byte charge.
pub const EXECUTE_BASE_GAS: u64 = 100_000;

/// Per-byte gas cost of `block_data` charged by the EXECUTE precompile.
pub const EXECUTE_PER_BYTE_GAS: u64 = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_size_is_prime_like_offset() {
        assert_eq!(ANCHOR_RING_BUFFER_SIZE, 8191);
    }
}
