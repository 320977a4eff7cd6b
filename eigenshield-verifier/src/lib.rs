//! Verification and signing pipeline for EigenShield attestation bundles.
//!
//! - [`encoding`]: fixed-width 32-byte words and keccak.
//! - [`validator`]: allowlist and replay checks against [`WatcherState`](eigenshield_types::WatcherState).
//! - [`digest`]: the type-hash-prefixed struct hash, wrapped as a personal message.
//! - [`signer`]: recoverable secp256k1 signatures with `v` in {27, 28}.

pub mod digest;
pub mod encoding;
pub mod signer;
pub mod validator;


pub use digest::{bundle_digest, DigestError, BUNDLE_TYPE_HASH, BUNDLE_TYPE_SCHEMA};
pub use encoding::EncodingError;
pub use signer::{sign_digest, SignerError, SigningIdentity};
pub use validator::validate;
