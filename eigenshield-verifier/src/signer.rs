//! Watcher signing identity.

use std::fmt;

use alloy_primitives::{Address, B256};
use eigenshield_types::Bundle;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use thiserror::Error;

use crate::{
    digest::{bundle_digest, DigestError},
    encoding::keccak256_bytes,
};

#[derive(Debug, Error)]
pub enum SignerError {
    /// Observer mode: no key was configured.
    #[error("signer not configured")]
    NotConfigured,
    #[error("parse watcher private key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error("sign digest")]
    Signing(#[from] k256::ecdsa::Error),
    #[error("unsupported recovery id {0}")]
    UnsupportedRecoveryId(u8),
}

/// Key material plus the executor binding every signature is scoped to.
///
/// Built once at startup and never mutated.
pub struct SigningIdentity {
    key: SigningKey,
    address: Address,
    executor: Address,
    chain_id: u64,
}

impl SigningIdentity {
    pub fn new(key: SigningKey, executor: Address, chain_id: u64) -> Self {
        let address = address_of(&key);
        Self {
            key,
            address,
            executor,
            chain_id,
        }
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(key_hex: &str, executor: Address, chain_id: u64) -> Result<Self, SignerError> {
        let raw = key_hex.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key, executor, chain_id))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn executor(&self) -> Address {
        self.executor
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Digest for `bundle` under this identity's executor binding.
    pub fn digest(&self, bundle: &Bundle) -> Result<B256, DigestError> {
        bundle_digest(bundle, self.chain_id, self.executor)
    }

    pub fn sign_bundle(&self, bundle: &Bundle) -> Result<String, SignerError> {
        let digest = self.digest(bundle)?;
        sign_digest(&digest, Some(&self.key))
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .field("executor", &self.executor)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// Sign a 32-byte digest; returns `0x` + hex(r || s || v) with `v` in {27, 28}.
pub fn sign_digest(digest: &B256, key: Option<&SigningKey>) -> Result<String, SignerError> {
    let key = key.ok_or(SignerError::NotConfigured)?;
    let (signature, recovery_id): (Signature, RecoveryId) =
        key.sign_prehash_recoverable(digest.as_slice())?;

    let mut v = recovery_id.to_byte();
    if v > 1 {
        return Err(SignerError::UnsupportedRecoveryId(v));
    }
    if v < 27 {
        v += 27;
    }

    let mut sig_bytes = Vec::with_capacity(65);
    sig_bytes.extend_from_slice(&signature.to_bytes());
    sig_bytes.push(v);
    Ok(format!("0x{}", hex::encode(sig_bytes)))
}

/// Account address: last 20 bytes of keccak256 over the uncompressed public key (sans 0x04).
pub fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256_bytes(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
