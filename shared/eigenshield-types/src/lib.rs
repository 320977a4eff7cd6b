//! Shared types for the EigenShield bundle watcher.
//!
//! Wire types (`Bundle`, `SubmissionPayload`) and the process-local policy/state types are kept
//! here so the verifier library and the watcher binary agree on one definition.

pub mod bundle;
pub mod policy;
pub mod state;

pub use bundle::{Bundle, SubmissionPayload};
pub use policy::Policy;
pub use state::{Acceptance, Decision, RejectReason, WatcherState};
