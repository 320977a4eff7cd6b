//! Accept/reject decision for a polled bundle.
//!
//! Checks run in a fixed order and the first failure wins:
//! empty id, already processed, replay salt, docker digest, TEE measurement.
//! Replay runs before the allowlists so a replayed bundle is always reported as a replay.

use eigenshield_types::{Bundle, Decision, Policy, RejectReason, WatcherState};
use tracing::debug;

/// Validate `bundle` against `policy`, committing it to `state` on acceptance.
///
/// No rejection path touches `state`.
pub fn validate(bundle: &Bundle, policy: &Policy, state: &mut WatcherState) -> Decision {
    if bundle.is_empty() {
        return Decision::Rejected(RejectReason::NoBundle);
    }
    if state.is_last_accepted(&bundle.bundle_id) {
        debug!(bundle_id = %bundle.bundle_id, "bundle already processed");
        return Decision::AlreadyProcessed;
    }

    let replay_key = bundle.replay_salt.to_lowercase();
    if replay_key.is_empty() {
        return Decision::Rejected(RejectReason::MissingReplaySalt);
    }
    if state.has_seen_salt(&replay_key) {
        return Decision::Rejected(RejectReason::ReplaySaltSeen);
    }

    if !policy.allows_digest(&bundle.docker_digest) {
        return Decision::Rejected(RejectReason::DigestMismatch);
    }
    if !policy.allows_measurement(&bundle.tee_measurement) {
        return Decision::Rejected(RejectReason::MeasurementMismatch);
    }

    Decision::Accepted(state.commit(bundle.bundle_id.clone(), replay_key))
}
