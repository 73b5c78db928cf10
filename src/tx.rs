//! Minimal transaction shape shared by the commit-reveal pool and the
//! post-reveal ordering policies. Not a full RLP/EIP-1559 implementation —
//! only the fields those components need to reach their decisions.

use crate::primitives::{Address, Amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeModel {
    Legacy { gas_price: u64 },
    Eip1559 { max_fee_per_gas: u64, max_priority_fee_per_gas: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_limit: u64,
    pub to: Address,
    pub value: Amount,
    pub data: Vec<u8>,
    pub fee: FeeModel,
}

impl Transaction {
    /// The price used by fee-ordering policies: the priority-fee tip cap for
    /// EIP-1559 transactions, the flat gas price otherwise.
    pub fn effective_price(&self) -> u64 {
        match self.fee {
            FeeModel::Legacy { gas_price } => gas_price,
            FeeModel::Eip1559 { max_priority_fee_per_gas, .. } => max_priority_fee_per_gas,
        }
    }

    /// Deterministic canonical byte encoding, used as the reveal commitment
    /// preimage. Field order is fixed; this is not wire-compatible RLP.
    pub fn canonical_encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.gas_limit.to_be_bytes());
        out.extend_from_slice(&self.to.0);
        out.extend_from_slice(&self.value.to_be32().unwrap_or([0u8; 32]));
        match self.fee {
            FeeModel::Legacy { gas_price } => {
                out.push(0);
                out.extend_from_slice(&gas_price.to_be_bytes());
            }
            FeeModel::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                out.push(1);
                out.extend_from_slice(&max_fee_per_gas.to_be_bytes());
                out.extend_from_slice(&max_priority_fee_per_gas.to_be_bytes());
            }
        }
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eip1559_price_is_the_tip_cap() {
        let tx = Transaction {
            nonce: 0,
            gas_limit: 21_000,
            to: Address([1; 20]),
            value: Amount::zero(),
            data: vec![],
            fee: FeeModel::Eip1559 { max_fee_per_gas: 100, max_priority_fee_per_gas: 5 },
        };
        assert_eq!(tx.effective_price(), 5);
    }

    #[test]
    fn encoding_differs_on_any_field_change() {
        let base = Transaction {
            nonce: 1,
            gas_limit: 21_000,
            to: Address([1; 20]),
            value: Amount::from_u64(10),
            data: vec![1, 2],
            fee: FeeModel::Legacy { gas_price: 7 },
        };
        let mut changed = base.clone();
        changed.nonce += 1;
        assert_ne!(base.canonical_encode(), changed.canonical_encode());
    }
}
