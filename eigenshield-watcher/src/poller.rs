//! Poll loop: fetch, validate, then sign and submit when an executor is configured.
//!
//! One cycle runs at a time. The stop signal is only observed between cycles, so an in-flight
//! cycle always finishes.

use std::sync::Arc;

use eigenshield_types::{
    Acceptance, Bundle, Decision, Policy, RejectReason, SubmissionPayload, WatcherState,
};
use eigenshield_verifier::{validate, SignerError, SigningIdentity};
use reqwest::Client;
use thiserror::Error;
use tokio::{
    sync::Notify,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{info, warn};

use crate::{
    config::{Settings, SubmitFailurePolicy},
    executor::{ExecutorClient, ExecutorError},
    matcher::{MatcherClient, MatcherError},
};

/// Errors that end a single cycle. None of them stop the loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] MatcherError),
    #[error(transparent)]
    Rejected(#[from] RejectReason),
    #[error("sign bundle")]
    Sign(#[from] SignerError),
    #[error("executor submit")]
    Submit(#[from] ExecutorError),
}

/// `outer: inner: ...` over the whole `source()` chain.
fn error_chain(e: CycleError) -> String {
    format!("{:#}", anyhow::Error::from(e))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    NoBundle,
    AlreadyProcessed,
    /// Accepted in observer mode.
    Verified { bundle_id: String },
    Submitted { bundle_id: String },
}

struct ActiveExecutor {
    client: ExecutorClient,
    pool_id: String,
    contract: String,
    identity: SigningIdentity,
}

impl ActiveExecutor {
    async fn submit(&self, bundle: Bundle) -> Result<(), CycleError> {
        let signature = self.identity.sign_bundle(&bundle)?;
        let payload = SubmissionPayload {
            pool_id: self.pool_id.clone(),
            bundle,
            watcher_address: self.identity.address().to_string(),
            signature,
            chain_id: self.identity.chain_id(),
            executor_contract: self.contract.clone(),
        };
        self.client.submit(&payload).await?;
        Ok(())
    }
}

pub struct Watcher {
    policy: Policy,
    state: WatcherState,
    matcher: MatcherClient,
    executor: Option<ActiveExecutor>,
    on_submit_failure: SubmitFailurePolicy,
}

impl Watcher {
    /// `http` is shared by the matcher and executor clients and carries the request timeout.
    pub fn new(settings: Settings, http: Client) -> Self {
        let executor = settings.executor.map(|e| ActiveExecutor {
            client: ExecutorClient::new(e.endpoint, http.clone()),
            pool_id: e.pool_id,
            contract: e.contract,
            identity: e.identity,
        });
        Self {
            policy: settings.policy,
            state: WatcherState::new(),
            matcher: MatcherClient::new(settings.matcher_endpoint, http),
            executor,
            on_submit_failure: settings.on_submit_failure,
        }
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    pub fn watcher_address(&self) -> Option<String> {
        self.executor
            .as_ref()
            .map(|e| e.identity.address().to_string())
    }

    /// Poll every `poll_interval` until `shutdown` is notified. The first poll happens one
    /// interval after start.
    pub async fn run(&mut self, shutdown: Arc<Notify>) {
        let period = self.policy.poll_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            matcher = %self.matcher.base(),
            interval_ms = period.as_millis() as u64,
            "watcher started"
        );
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!(
                        last_accepted = ?self.state().last_accepted(),
                        seen_salts = self.state().seen_salt_count(),
                        "watcher shutting down"
                    );
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.check_once().await {
                        warn!("check failed: {}", error_chain(e));
                    }
                }
            }
        }
    }

    /// One full cycle. State is only touched by validation (and by a revert, if configured).
    pub async fn check_once(&mut self) -> Result<CycleOutcome, CycleError> {
        let bundle = self.matcher.fetch_latest().await?;

        let acceptance = match validate(&bundle, &self.policy, &mut self.state) {
            Decision::Accepted(acceptance) => acceptance,
            Decision::AlreadyProcessed => return Ok(CycleOutcome::AlreadyProcessed),
            Decision::Rejected(RejectReason::NoBundle) => {
                info!("no bundle available yet");
                return Ok(CycleOutcome::NoBundle);
            }
            Decision::Rejected(reason) => return Err(reason.into()),
        };
        info!(bundle_id = %bundle.bundle_id, epoch = bundle.epoch, "bundle verified");

        let Some(executor) = &self.executor else {
            return Ok(CycleOutcome::Verified {
                bundle_id: acceptance.bundle_id,
            });
        };

        let bundle_id = acceptance.bundle_id.clone();
        let result = executor.submit(bundle).await;
        match result {
            Ok(()) => {
                info!(bundle_id = %bundle_id, "bundle submitted");
                Ok(CycleOutcome::Submitted { bundle_id })
            }
            Err(e) => {
                self.handle_submit_failure(acceptance);
                Err(e)
            }
        }
    }

    fn handle_submit_failure(&mut self, acceptance: Acceptance) {
        if self.on_submit_failure != SubmitFailurePolicy::Revert {
            return;
        }
        let bundle_id = acceptance.bundle_id.clone();
        if self.state.revert(acceptance) {
            warn!(bundle_id = %bundle_id, "acceptance reverted after failed submission");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use alloy_primitives::address;
    use eigenshield_verifier::bundle_digest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use crate::config::ExecutorSettings;

    const KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const EXECUTOR: &str = "0x0000000000000000000000000000000000000001";

    fn http() -> Client {
        Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    }

    fn settings(matcher: &MockServer, executor: Option<&MockServer>) -> Settings {
        Settings {
            matcher_endpoint: matcher.uri(),
            policy: Policy::new(["d1"], ["m1"], Duration::from_millis(20)),
            http_timeout: Duration::from_millis(500),
            executor: executor.map(|server| ExecutorSettings {
                endpoint: server.uri(),
                pool_id: "pool-1".into(),
                contract: EXECUTOR.into(),
                identity: SigningIdentity::from_hex(
                    KEY,
                    address!("0000000000000000000000000000000000000001"),
                    1,
                )
                .unwrap(),
            }),
            on_submit_failure: SubmitFailurePolicy::AcceptIsFinal,
        }
    }

    fn bundle_json(id: &str, salt: &str, digest: &str) -> serde_json::Value {
        serde_json::json!({
            "status": "ready",
            "epoch": 1,
            "bundle_id": id,
            "docker_digest": digest,
            "tee_measurement": "m1",
            "replay_salt": salt,
            "match_groups": []
        })
    }

    /// Replace whatever the matcher currently serves.
    async fn serve(server: &MockServer, body: serde_json::Value) {
        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/bundles/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_observer_scenario() {
        let matcher = MockServer::start().await;
        let mut watcher = Watcher::new(settings(&matcher, None), http());

        serve(&matcher, serde_json::json!({"status": "pending"})).await;
        assert_eq!(watcher.check_once().await.unwrap(), CycleOutcome::NoBundle);

        serve(&matcher, bundle_json("0xb1", "0x51", "D1")).await;
        assert_eq!(
            watcher.check_once().await.unwrap(),
            CycleOutcome::Verified {
                bundle_id: "0xb1".into()
            }
        );
        assert_eq!(watcher.state().last_accepted(), Some("0xb1"));

        assert_eq!(
            watcher.check_once().await.unwrap(),
            CycleOutcome::AlreadyProcessed
        );

        serve(&matcher, bundle_json("0xb2", "0x51", "d1")).await;
        assert!(matches!(
            watcher.check_once().await,
            Err(CycleError::Rejected(RejectReason::ReplaySaltSeen))
        ));

        serve(&matcher, bundle_json("0xb3", "0x52", "d2")).await;
        assert!(matches!(
            watcher.check_once().await,
            Err(CycleError::Rejected(RejectReason::DigestMismatch))
        ));

        assert_eq!(watcher.state().last_accepted(), Some("0xb1"));
        assert_eq!(watcher.state().seen_salt_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state() {
        let matcher = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&matcher)
            .await;

        let mut watcher = Watcher::new(settings(&matcher, None), http());
        assert!(matches!(
            watcher.check_once().await,
            Err(CycleError::Fetch(MatcherError::Status { status: 500, .. }))
        ));
        assert_eq!(watcher.state().last_accepted(), None);
        assert_eq!(watcher.state().seen_salt_count(), 0);
    }

    #[tokio::test]
    async fn test_active_submission_is_signed() {
        let matcher = MockServer::start().await;
        let executor = MockServer::start().await;
        serve(&matcher, bundle_json("0x01", "0x02", "d1")).await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&executor)
            .await;

        let mut watcher = Watcher::new(settings(&matcher, Some(&executor)), http());
        assert_eq!(
            watcher.watcher_address().as_deref(),
            Some("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf")
        );
        assert_eq!(
            watcher.check_once().await.unwrap(),
            CycleOutcome::Submitted {
                bundle_id: "0x01".into()
            }
        );

        let requests: Vec<Request> = executor.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["pool_id"], "pool-1");
        assert_eq!(body["chain_id"], 1);
        assert_eq!(body["executor_contract"], EXECUTOR);
        assert_eq!(
            body["watcher_address"],
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
        assert_eq!(body["bundle"]["bundle_id"], "0x01");
        assert_eq!(body["bundle"]["match_groups"], serde_json::json!([]));

        let signature = body["signature"].as_str().unwrap();
        assert_eq!(signature.len(), 132);
        assert!(signature.ends_with("1b") || signature.ends_with("1c"));

        let bundle = Bundle {
            bundle_id: "0x01".into(),
            replay_salt: "0x02".into(),
            ..Default::default()
        };
        let identity = SigningIdentity::from_hex(
            KEY,
            address!("0000000000000000000000000000000000000001"),
            1,
        )
        .unwrap();
        assert_eq!(
            identity.digest(&bundle).unwrap(),
            bundle_digest(&bundle, 1, identity.executor()).unwrap()
        );
        assert_eq!(signature, identity.sign_bundle(&bundle).unwrap());
    }

    #[tokio::test]
    async fn test_submit_failure_accept_is_final() {
        let matcher = MockServer::start().await;
        let executor = MockServer::start().await;
        serve(&matcher, bundle_json("0x01", "0x02", "d1")).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&executor)
            .await;

        let mut watcher = Watcher::new(settings(&matcher, Some(&executor)), http());
        assert!(matches!(
            watcher.check_once().await,
            Err(CycleError::Submit(ExecutorError::Rejected { status: 500, .. }))
        ));
        assert_eq!(watcher.state().last_accepted(), Some("0x01"));
        assert_eq!(
            watcher.check_once().await.unwrap(),
            CycleOutcome::AlreadyProcessed
        );
    }

    #[tokio::test]
    async fn test_submit_failure_revert_retries() {
        let matcher = MockServer::start().await;
        let executor = MockServer::start().await;
        serve(&matcher, bundle_json("0x01", "0x02", "d1")).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&executor)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&executor)
            .await;

        let mut cfg = settings(&matcher, Some(&executor));
        cfg.on_submit_failure = SubmitFailurePolicy::Revert;
        let mut watcher = Watcher::new(cfg, http());

        assert!(watcher.check_once().await.is_err());
        assert_eq!(watcher.state().last_accepted(), None);
        assert_eq!(watcher.state().seen_salt_count(), 0);

        assert_eq!(
            watcher.check_once().await.unwrap(),
            CycleOutcome::Submitted {
                bundle_id: "0x01".into()
            }
        );
    }

    #[tokio::test]
    async fn test_signing_failure_is_cycle_error() {
        let matcher = MockServer::start().await;
        let executor = MockServer::start().await;
        serve(&matcher, bundle_json("not-hex", "0x02", "d1")).await;

        let mut watcher = Watcher::new(settings(&matcher, Some(&executor)), http());
        assert!(matches!(
            watcher.check_once().await,
            Err(CycleError::Sign(SignerError::Digest(_)))
        ));
        assert!(executor.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_null_bundle_id_is_no_bundle() {
        let matcher = MockServer::start().await;
        serve(
            &matcher,
            serde_json::json!({"status": "pending", "bundle_id": null, "epoch": null}),
        )
        .await;

        let mut watcher = Watcher::new(settings(&matcher, None), http());
        assert_eq!(watcher.check_once().await.unwrap(), CycleOutcome::NoBundle);
        assert_eq!(watcher.state().last_accepted(), None);
    }

    #[tokio::test]
    async fn test_error_chain_includes_sources() {
        let matcher = MockServer::start().await;
        let executor = MockServer::start().await;
        serve(&matcher, bundle_json("not-hex", "0x02", "d1")).await;

        let mut watcher = Watcher::new(settings(&matcher, Some(&executor)), http());
        let err = watcher.check_once().await.unwrap_err();
        let chain = error_chain(err);
        assert!(
            chain.starts_with("sign bundle: bundleId: invalid hex not-hex"),
            "{chain}"
        );

        let down = Watcher::new(
            Settings {
                matcher_endpoint: "http://127.0.0.1:1".into(),
                ..settings(&matcher, None)
            },
            http(),
        )
        .check_once()
        .await
        .unwrap_err();
        let chain = error_chain(down);
        assert!(chain.starts_with("fetch bundle: "), "{chain}");
        assert!(chain.len() > "fetch bundle: ".len());
    }

    #[tokio::test]
    async fn test_run_stops_on_signal() {
        let matcher = MockServer::start().await;
        serve(&matcher, bundle_json("0xb1", "0x51", "d1")).await;

        let mut watcher = Watcher::new(settings(&matcher, None), http());
        let shutdown = Arc::new(Notify::new());
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.notify_one();
        });

        tokio::time::timeout(Duration::from_secs(5), watcher.run(shutdown))
            .await
            .expect("run did not stop");
        assert_eq!(watcher.state().last_accepted(), Some("0xb1"));
    }

    #[tokio::test]
    async fn test_run_stops_before_first_tick() {
        let matcher = MockServer::start().await;
        let mut watcher = Watcher::new(settings(&matcher, None), http());
        let shutdown = Arc::new(Notify::new());
        shutdown.notify_one();

        tokio::time::timeout(Duration::from_secs(5), watcher.run(shutdown))
            .await
            .expect("run did not stop");
        assert!(matcher.received_requests().await.unwrap().is_empty());
    }
}
