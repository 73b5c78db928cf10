//! Execution-layer core: a native rollup plane anchored to L1, and an
//! encrypted mempool plane with threshold-decrypted, MEV-resistant ordering.
//!
//! Every public type here is a plain synchronous registry guarded by its own
//! lock (see each module for its concurrency note); there is no CLI, server,
//! or background task in this crate — callers own the clock and the network.

pub mod anchor_ring;
pub mod anchor_state;
pub mod anchor_tracker;
pub mod bridge_queue;
pub mod commit_reveal;
pub mod config;
pub mod cross_layer;
pub mod decryption_coordinator;
pub mod encrypted_mempool;
pub mod error;
pub mod execution_context;
pub mod fraud_proof;
pub mod merkle;
pub mod primitives;
pub mod rollup_registry;
pub mod sequencer;
pub mod stf_proof;
pub mod sync_engine;
pub mod threshold_decrypt;
pub mod tx;
pub mod wire;

pub use error::{CoreError, CoreResult};
