use std::collections::HashSet;

use thiserror::Error;

/// Why a bundle was not accepted. These are expected outcomes of untrusted input.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RejectReason {
    /// The matcher has no bundle yet (empty `bundle_id`).
    #[error("no bundle available")]
    NoBundle,
    #[error("bundle missing replay_salt")]
    MissingReplaySalt,
    #[error("replay salt already processed")]
    ReplaySaltSeen,
    #[error("docker digest not allowed")]
    DigestMismatch,
    #[error("tee measurement not allowed")]
    MeasurementMismatch,
}

/// Outcome of validating one polled bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Bundle passed every check; state has already been updated.
    Accepted(Acceptance),
    /// Same identifier as the last accepted bundle. No state change.
    AlreadyProcessed,
    Rejected(RejectReason),
}

/// Record of a committed acceptance, enough to undo it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acceptance {
    pub bundle_id: String,
    /// Lowercased replay salt as stored in the seen-set.
    pub replay_salt: String,
    previous: Option<String>,
}

/// Mutable watcher bookkeeping. Owned by the poll loop, single writer.
///
/// The seen-salt set only grows; there is no eviction.
#[derive(Clone, Debug, Default)]
pub struct WatcherState {
    last_accepted: Option<String>,
    seen_salts: HashSet<String>,
}

impl WatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accepted(&self) -> Option<&str> {
        self.last_accepted.as_deref()
    }

    pub fn is_last_accepted(&self, bundle_id: &str) -> bool {
        self.last_accepted.as_deref() == Some(bundle_id)
    }

    /// `salt` must already be lowercased.
    pub fn has_seen_salt(&self, salt: &str) -> bool {
        self.seen_salts.contains(salt)
    }

    pub fn seen_salt_count(&self) -> usize {
        self.seen_salts.len()
    }

    /// Record an accepted bundle. Both fields change together.
    pub fn commit(&mut self, bundle_id: String, replay_salt: String) -> Acceptance {
        let previous = self.last_accepted.replace(bundle_id.clone());
        self.seen_salts.insert(replay_salt.clone());
        Acceptance {
            bundle_id,
            replay_salt,
            previous,
        }
    }

    /// Undo `acceptance`. Returns `false` (and changes nothing) if another bundle has been
    /// accepted since.
    pub fn revert(&mut self, acceptance: Acceptance) -> bool {
        if !self.is_last_accepted(&acceptance.bundle_id) {
            return false;
        }
        self.last_accepted = acceptance.previous;
        self.seen_salts.remove(&acceptance.replay_salt);
        true
    }
}
