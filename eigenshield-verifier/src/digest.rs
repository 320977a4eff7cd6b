//! EigenShield bundle digest.
//!
//! ```text
//! structHash = keccak256(typeHash || bundleId || replaySalt || chainId || executor)
//! digest     = keccak256("\x19Ethereum Signed Message:\n32" || structHash)
//! ```
//!
//! Every field is a 32-byte word, so the encoded struct is always 160 bytes. The executor's
//! verifier recovers the watcher over `digest`; any change in field order or a missing wrap
//! still yields a well-formed signature over the wrong message.

use alloy_primitives::{b256, Address, B256};
use eigenshield_types::Bundle;
use thiserror::Error;

use crate::encoding::{
    encode_address_word, encode_u64_word, keccak256_bytes, parse_fixed_hash, EncodingError,
};

/// Type string the executor contract hashes for `BUNDLE_TYPE_HASH`. Spacing is significant.
pub const BUNDLE_TYPE_SCHEMA: &str =
    "EigenShieldBundle(bytes32 bundleId, bytes32 replaySalt, uint256 chainId, address executor)";

/// keccak256(BUNDLE_TYPE_SCHEMA)
pub const BUNDLE_TYPE_HASH: B256 =
    b256!("6d56047ef76e3d974ea744fedb3078c4143dab8bc9455e2d1ae474c6ce1c09a9");

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("{field}")]
    Field {
        field: &'static str,
        #[source]
        source: EncodingError,
    },
}

/// Struct hash over already-parsed words.
pub fn struct_hash(bundle_id: B256, replay_salt: B256, chain_id: u64, executor: Address) -> B256 {
    let mut buf = Vec::with_capacity(32 * 5);
    buf.extend_from_slice(BUNDLE_TYPE_HASH.as_slice());
    buf.extend_from_slice(bundle_id.as_slice());
    buf.extend_from_slice(replay_salt.as_slice());
    buf.extend_from_slice(&encode_u64_word(chain_id));
    buf.extend_from_slice(&encode_address_word(executor));
    keccak256_bytes(&buf)
}

/// Wrap a 32-byte hash as a personal message (`eth_sign` convention).
pub fn personal_message_hash(hash: B256) -> B256 {
    let mut buf = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 32);
    buf.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    buf.extend_from_slice(hash.as_slice());
    keccak256_bytes(&buf)
}

/// Final signing digest for `bundle` bound to `chain_id` and the `executor` contract.
pub fn bundle_digest(bundle: &Bundle, chain_id: u64, executor: Address) -> Result<B256, DigestError> {
    let bundle_id = parse_fixed_hash(&bundle.bundle_id).map_err(|source| DigestError::Field {
        field: "bundleId",
        source,
    })?;
    let replay_salt = parse_fixed_hash(&bundle.replay_salt).map_err(|source| DigestError::Field {
        field: "replaySalt",
        source,
    })?;

    Ok(personal_message_hash(struct_hash(
        bundle_id,
        replay_salt,
        chain_id,
        executor,
    )))
}
