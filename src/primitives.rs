//! Fixed-width identifiers, the arbitrary-precision `Amount` type, and the
//! Keccak-256 helper shared by every wire format in this crate.

use num_bigint::BigUint;
use num_traits::Zero;
use sha3::{Digest, Keccak256};

use crate::error::CoreError;

pub const ADDRESS_LEN: usize = 20;
pub const HASH_LEN: usize = 32;

/// A 20-byte account/contract identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(CoreError::InvalidInput(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(bytes);
        Ok(Address(out))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A 32-byte hash or root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() != HASH_LEN {
            return Err(CoreError::InvalidInput(format!(
                "hash must be {HASH_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(bytes);
        Ok(Hash(out))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// An arbitrary-precision, non-negative amount. Always serialized big-endian,
/// right-aligned into a 32-byte field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Amount(BigUint::zero())
    }

    pub fn from_u64(v: u64) -> Self {
        Amount(BigUint::from(v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero()
    }

    /// Big-endian, right-aligned 32-byte encoding. Errors if the value overflows the field.
    pub fn to_be32(&self) -> Result<[u8; 32], CoreError> {
        let bytes = self.0.to_bytes_be();
        if bytes.len() > 32 {
            return Err(CoreError::InvalidInput(
                "amount exceeds 32-byte field".into(),
            ));
        }
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        Ok(out)
    }

    /// Minimal big-endian encoding (no leading zero padding), used where the spec
    /// hashes over the value's canonical shortest form rather than a fixed field.
    pub fn to_be_minimal(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn from_be32(bytes: &[u8; 32]) -> Self {
        Amount(BigUint::from_bytes_be(bytes))
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

/// Keccak-256 over the concatenation of all provided byte slices.
pub fn keccak256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for p in parts {
        hasher.update(p);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// SHA-256 over the concatenation of all provided byte slices, used only by the
/// commitment-check proof predicates (§4.2), never as a substitute for Keccak-256.
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    use sha2::Sha256;
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_round_trips_through_be32() {
        let a = Amount::from_u64(0xdead_beef);
        let enc = a.to_be32().unwrap();
        assert_eq!(Amount::from_be32(&enc), a);
    }

    #[test]
    fn amount_be32_is_right_aligned() {
        let a = Amount::from_u64(1);
        let enc = a.to_be32().unwrap();
        assert_eq!(enc[31], 1);
        assert!(enc[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn keccak256_single_bit_change_changes_digest() {
        let a = keccak256(&[b"hello"]);
        let b = keccak256(&[b"hellp"]);
        assert_ne!(a, b);
    }

    #[test]
    fn address_zero_detection() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_slice(&[1u8; 20]).unwrap().is_zero());
    }
}
