//! Operator-facing configuration: CLI flags, each also readable from the environment.

use std::{str::FromStr, time::Duration};

use alloy_primitives::Address;
use clap::{Parser, ValueEnum};
use eigenshield_types::Policy;
use eigenshield_verifier::{SignerError, SigningIdentity};
use thiserror::Error;

pub const DEFAULT_MATCHER_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;

/// What to do with an accepted bundle when signing or executor submission fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SubmitFailurePolicy {
    /// Acceptance stands; the bundle and its salt are never retried.
    #[default]
    AcceptIsFinal,
    /// Undo the acceptance so the same bundle is processed again on the next tick.
    Revert,
}

/// Watch the matcher for attestation bundles and, when an executor is configured, sign and
/// submit every accepted bundle.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Base URL of the matcher service (`GET {url}/bundles/latest`).
    #[arg(long, env = "MATCHER_ENDPOINT", default_value = DEFAULT_MATCHER_ENDPOINT)]
    pub matcher_endpoint: String,

    /// Delay between polls, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Per-request timeout for matcher and executor calls, in milliseconds.
    #[arg(long, env = "HTTP_TIMEOUT_MS", default_value_t = DEFAULT_HTTP_TIMEOUT_MS)]
    pub http_timeout_ms: u64,

    /// Allowed docker image digests (comma separated, case-insensitive).
    #[arg(long, env = "ALLOWED_DIGESTS", value_delimiter = ',')]
    pub allowed_digests: Vec<String>,

    /// Allowed TEE measurements (comma separated, case-insensitive).
    #[arg(long, env = "ALLOWED_MEASUREMENTS", value_delimiter = ',')]
    pub allowed_measurements: Vec<String>,

    /// Executor base URL. Enables signing and submission.
    #[arg(long, env = "EXECUTOR_ENDPOINT")]
    pub executor_endpoint: Option<String>,

    /// Pool identifier sent with every submission.
    #[arg(long, env = "POOL_ID")]
    pub pool_id: Option<String>,

    /// Executor contract address the signature is bound to.
    #[arg(long, env = "EXECUTOR_CONTRACT")]
    pub executor_contract: Option<String>,

    /// Chain id the signature is bound to.
    #[arg(long, env = "EXECUTOR_CHAIN_ID")]
    pub executor_chain_id: Option<u64>,

    /// Watcher secp256k1 private key (hex string, 0x...).
    #[arg(long, env = "WATCHER_PRIVATE_KEY", hide_env_values = true)]
    pub watcher_private_key: Option<String>,

    #[arg(long, env = "ON_SUBMIT_FAILURE", value_enum, default_value_t = SubmitFailurePolicy::AcceptIsFinal)]
    pub on_submit_failure: SubmitFailurePolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} required when EXECUTOR_ENDPOINT is set")]
    MissingForExecutor(&'static str),
    #[error("{0} is set but EXECUTOR_ENDPOINT is not")]
    ExecutorEndpointMissing(&'static str),
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("invalid EXECUTOR_CONTRACT {value}: {reason}")]
    InvalidExecutorContract { value: String, reason: String },
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Validated runtime settings.
#[derive(Debug)]
pub struct Settings {
    pub matcher_endpoint: String,
    pub policy: Policy,
    pub http_timeout: Duration,
    pub executor: Option<ExecutorSettings>,
    pub on_submit_failure: SubmitFailurePolicy,
}

/// Present only in active mode.
#[derive(Debug)]
pub struct ExecutorSettings {
    pub endpoint: String,
    pub pool_id: String,
    /// As configured; forwarded verbatim in the submission payload.
    pub contract: String,
    pub identity: SigningIdentity,
}

impl TryFrom<Cli> for Settings {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        let poll_interval = Duration::from_millis(cli.poll_interval_ms);
        let policy = Policy::new(&cli.allowed_digests, &cli.allowed_measurements, poll_interval);

        let pool_id = non_empty(cli.pool_id);
        let contract = non_empty(cli.executor_contract);
        let chain_id = cli.executor_chain_id.filter(|id| *id != 0);
        let private_key = non_empty(cli.watcher_private_key);

        let executor = match non_empty(cli.executor_endpoint) {
            Some(endpoint) => {
                let pool_id = pool_id.ok_or(ConfigError::MissingForExecutor("POOL_ID"))?;
                let contract =
                    contract.ok_or(ConfigError::MissingForExecutor("EXECUTOR_CONTRACT"))?;
                let chain_id =
                    chain_id.ok_or(ConfigError::MissingForExecutor("EXECUTOR_CHAIN_ID"))?;
                let private_key =
                    private_key.ok_or(ConfigError::MissingForExecutor("WATCHER_PRIVATE_KEY"))?;

                let executor_address = Address::from_str(contract.trim()).map_err(|e| {
                    ConfigError::InvalidExecutorContract {
                        value: contract.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let identity = SigningIdentity::from_hex(&private_key, executor_address, chain_id)?;

                Some(ExecutorSettings {
                    endpoint,
                    pool_id,
                    contract,
                    identity,
                })
            }
            None => {
                let stray = [
                    ("POOL_ID", pool_id.is_some()),
                    ("EXECUTOR_CONTRACT", contract.is_some()),
                    ("EXECUTOR_CHAIN_ID", chain_id.is_some()),
                    ("WATCHER_PRIVATE_KEY", private_key.is_some()),
                ];
                if let Some((name, _)) = stray.iter().find(|(_, set)| *set) {
                    return Err(ConfigError::ExecutorEndpointMissing(*name));
                }
                None
            }
        };

        Ok(Settings {
            matcher_endpoint: cli.matcher_endpoint,
            policy,
            http_timeout: Duration::from_millis(cli.http_timeout_ms),
            executor,
            on_submit_failure: cli.on_submit_failure,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
