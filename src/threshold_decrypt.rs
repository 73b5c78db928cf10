//! C15 — t-of-n threshold decryption: share collection, epoch isolation,
//! Shamir/Lagrange key reconstruction, and AES-GCM decryption of the sealed
//! ciphertext once the threshold is met.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::primitives::{keccak256, Hash};

/// secp256k1 field prime, used purely as a large prime modulus for Lagrange
/// interpolation over share values; no elliptic-curve arithmetic is involved.
const FIELD_PRIME_HEX: &str =
    "fffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f";

fn field_prime() -> BigUint {
    BigUint::parse_bytes(FIELD_PRIME_HEX.as_bytes(), 16).expect("valid prime literal")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionShare {
    pub validator_index: i64,
    pub share_bytes: Vec<u8>,
    pub epoch: u64,
}

/// `MakeCommitment(share) = Keccak256(u8(index & 0xff) || share_bytes)`.
pub fn make_commitment(share: &DecryptionShare) -> Hash {
    keccak256(&[&[(share.validator_index & 0xff) as u8], &share.share_bytes])
}

pub fn verify_share(share: &DecryptionShare, commitment: Hash) -> bool {
    make_commitment(share) == commitment
}

/// Reduces `value` into `[0, modulus)`, unlike the `%` operator which may
/// return a negative result when `value` is negative.
fn modulo(value: &BigInt, modulus: &BigInt) -> BigInt {
    let r = value % modulus;
    if r.sign() == num_bigint::Sign::Minus {
        r + modulus
    } else {
        r
    }
}

fn mod_inverse(value: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    let (mut old_r, mut r) = (value.clone(), modulus.clone());
    let (mut old_s, mut s) = (BigInt::from(1), BigInt::from(0));
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let tmp_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, tmp_r);
        let tmp_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, tmp_s);
    }
    if old_r != BigInt::from(1) {
        return None;
    }
    let result = ((old_s % modulus) + modulus) % modulus;
    Some(result)
}

/// Attempts Lagrange interpolation at x=0 over `(index+1, share_value)` pairs.
/// Returns `None` only if two shares collide on the same x-coordinate.
fn try_lagrange_interpolate(shares: &[DecryptionShare]) -> Option<BigUint> {
    let prime = field_prime();
    let prime_i = BigInt::from_biguint(Sign::Plus, prime.clone());
    let points: Vec<(BigInt, BigInt)> = shares
        .iter()
        .map(|s| {
            let x = BigInt::from(s.validator_index + 1);
            let y_unsigned = BigUint::from_bytes_be(&s.share_bytes) % &prime;
            let y = BigInt::from_biguint(Sign::Plus, y_unsigned);
            (x, y)
        })
        .collect();

    let mut secret = BigInt::from(0);
    for (i, (xi, yi)) in points.iter().enumerate() {
        let mut numerator = BigInt::from(1);
        let mut denominator = BigInt::from(1);
        for (j, (xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = modulo(&(&numerator * (-xj)), &prime_i);
            denominator = modulo(&(&denominator * (xi - xj)), &prime_i);
        }
        if denominator.is_zero() {
            return None;
        }
        let inv = mod_inverse(&denominator, &prime_i)?;
        let term = modulo(&(yi * numerator * inv), &prime_i);
        secret = modulo(&(secret + term), &prime_i);
    }
    let (_, bytes) = secret.to_bytes_be();
    Some(BigUint::from_bytes_be(&bytes))
}

fn xor_fallback_key(shares: &[DecryptionShare]) -> Hash {
    let max_len = shares.iter().map(|s| s.share_bytes.len()).max().unwrap_or(0);
    let mut acc = vec![0u8; max_len];
    for s in shares {
        for (i, b) in s.share_bytes.iter().enumerate() {
            acc[i] ^= b;
        }
    }
    keccak256(&[&acc])
}

/// Derives the 32-byte AES key for a share set. Identical share multisets
/// always yield identical keys.
pub fn derive_key(shares: &[DecryptionShare]) -> Hash {
    let mut sorted = shares.to_vec();
    sorted.sort_by_key(|s| s.validator_index);
    match try_lagrange_interpolate(&sorted) {
        Some(secret) => keccak256(&[&secret.to_bytes_be()]),
        None => xor_fallback_key(&sorted),
    }
}

struct Inner {
    epoch: u64,
    shares: HashMap<i64, DecryptionShare>,
    ciphertext: Option<Vec<u8>>,
    nonce: Option<[u8; 12]>,
}

pub struct ThresholdDecryptor {
    threshold: usize,
    total: usize,
    inner: RwLock<Inner>,
}

impl ThresholdDecryptor {
    pub fn new(threshold: usize, total: usize) -> CoreResult<Self> {
        if threshold < 1 || threshold > total {
            return Err(CoreError::InvalidInput(
                "threshold must satisfy 1 <= t <= n".into(),
            ));
        }
        Ok(ThresholdDecryptor {
            threshold,
            total,
            inner: RwLock::new(Inner {
                epoch: 0,
                shares: HashMap::new(),
                ciphertext: None,
                nonce: None,
            }),
        })
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.inner.write().epoch = epoch;
    }

    pub fn reset_epoch(&self, epoch: u64) {
        let mut guard = self.inner.write();
        guard.epoch = epoch;
        guard.shares.clear();
        guard.ciphertext = None;
        guard.nonce = None;
    }

    pub fn set_ciphertext(&self, ciphertext: Vec<u8>, nonce: [u8; 12]) {
        let mut guard = self.inner.write();
        guard.ciphertext = Some(ciphertext);
        guard.nonce = Some(nonce);
    }

    /// Adds a share, returning whether the threshold has now been met.
    pub fn add_share(&self, share: DecryptionShare) -> CoreResult<bool> {
        if share.share_bytes.is_empty() {
            return Err(CoreError::InvalidInput("share_bytes must be non-empty".into()));
        }
        if share.validator_index < 0 {
            return Err(CoreError::InvalidInput("validator_index must be non-negative".into()));
        }
        let mut guard = self.inner.write();
        if share.epoch != guard.epoch {
            return Err(CoreError::ScopeError("share epoch does not match current epoch".into()));
        }
        if guard.shares.contains_key(&share.validator_index) {
            return Err(CoreError::AlreadyExists("duplicate share index".into()));
        }
        guard.shares.insert(share.validator_index, share);
        Ok(guard.shares.len() >= self.threshold)
    }

    pub fn threshold_met(&self) -> bool {
        self.inner.read().shares.len() >= self.threshold
    }

    pub fn share_count(&self) -> usize {
        self.inner.read().shares.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn try_decrypt(&self) -> CoreResult<Vec<u8>> {
        let guard = self.inner.read();
        if guard.shares.len() < self.threshold {
            return Err(CoreError::StateViolation("threshold not met".into()));
        }
        let ciphertext = guard
            .ciphertext
            .as_ref()
            .ok_or_else(|| CoreError::NotFound("ciphertext not set".into()))?;
        let nonce_bytes = guard
            .nonce
            .ok_or_else(|| CoreError::NotFound("nonce not set".into()))?;
        let shares: Vec<DecryptionShare> = guard.shares.values().cloned().collect();
        let key = derive_key(&shares);
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CoreError::Cryptographic(format!("invalid key: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| CoreError::Cryptographic("AES-GCM decryption failed".into()))
    }
}
