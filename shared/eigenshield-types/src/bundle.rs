use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

/// Latest bundle as served by the matcher (`GET /bundles/latest`).
///
/// Every field is optional on the wire, and `null` reads as the zero value: an empty
/// `bundle_id` means the matcher has nothing yet.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Bundle {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub epoch: u64,
    /// Hex string, at most 32 bytes once decoded.
    #[serde(deserialize_with = "null_as_default")]
    pub bundle_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub docker_digest: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tee_measurement: String,
    /// Single-use nonce, hex string of at most 32 bytes.
    #[serde(deserialize_with = "null_as_default")]
    pub replay_salt: String,
    /// Opaque payload, forwarded to the executor byte-for-byte.
    pub match_groups: Option<Box<RawValue>>,
}

impl Bundle {
    /// `true` when the matcher returned a body without a bundle identifier.
    pub fn is_empty(&self) -> bool {
        self.bundle_id.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Signed submission handed to the executor for an accepted bundle.
#[derive(Clone, Debug, Serialize)]
pub struct SubmissionPayload {
    pub pool_id: String,
    pub bundle: Bundle,
    /// Checksummed, `0x`-prefixed watcher address.
    pub watcher_address: String,
    /// `0x`-prefixed hex of the 65-byte `r || s || v` signature.
    pub signature: String,
    pub chain_id: u64,
    pub executor_contract: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fields_read_as_zero_values() {
        let raw = r#"{"status":"pending","bundle_id":null,"epoch":null,"replay_salt":null,"match_groups":null}"#;
        let bundle: Bundle = serde_json::from_str(raw).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.status, "pending");
        assert_eq!(bundle.epoch, 0);
        assert_eq!(bundle.replay_salt, "");
        assert!(bundle.match_groups.is_none());
    }

    #[test]
    fn present_fields_decode_normally() {
        let raw = r#"{"epoch":4,"bundle_id":"0xb1","docker_digest":"d1"}"#;
        let bundle: Bundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.epoch, 4);
        assert_eq!(bundle.bundle_id, "0xb1");
        assert_eq!(bundle.docker_digest, "d1");
        assert_eq!(bundle.tee_measurement, "");
    }
}
