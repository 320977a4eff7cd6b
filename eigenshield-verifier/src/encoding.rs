//! Fixed-width big-endian words used by the bundle digest.

use alloy_primitives::{Address, FixedBytes, B256, U256};
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("value {0} exceeds 32 bytes")]
    ValueTooLong(String),
    #[error("invalid hex {input}: {reason}")]
    InvalidHex { input: String, reason: String },
}

pub fn keccak256_bytes(bytes: &[u8]) -> B256 {
    let mut h = Keccak256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(out.as_slice());
    FixedBytes(b)
}

/// Parse a hex string (optional `0x`) of at most 32 bytes, right-aligned into a 32-byte word.
pub fn parse_fixed_hash(input: &str) -> Result<B256, EncodingError> {
    let s = input.strip_prefix("0x").unwrap_or(input);
    if s.len() / 2 > 32 {
        return Err(EncodingError::ValueTooLong(input.to_string()));
    }
    let buf = hex::decode(s).map_err(|e| EncodingError::InvalidHex {
        input: input.to_string(),
        reason: e.to_string(),
    })?;
    let mut out = [0u8; 32];
    out[32 - buf.len()..].copy_from_slice(&buf);
    Ok(FixedBytes(out))
}

pub fn encode_u64_word(value: u64) -> [u8; 32] {
    U256::from(value).to_be_bytes::<32>()
}

/// Address in the low-order 20 bytes, high 12 bytes zero.
pub fn encode_address_word(address: Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(address.as_slice());
    padded
}
