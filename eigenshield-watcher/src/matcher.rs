use eigenshield_types::Bundle;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("fetch bundle")]
    Transport(#[source] reqwest::Error),
    #[error("matcher returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode bundle")]
    Decode(#[source] reqwest::Error),
}

/// Client for the matcher's `GET /bundles/latest`.
#[derive(Clone, Debug)]
pub struct MatcherClient {
    base: String,
    client: Client,
}

impl MatcherClient {
    /// `client` carries the request timeout.
    pub fn new(base: impl Into<String>, client: Client) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base, client }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Latest bundle; an empty `bundle_id` means nothing has been matched yet.
    pub async fn fetch_latest(&self) -> Result<Bundle, MatcherError> {
        let url = format!("{}/bundles/latest", &self.base);
        let r = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(MatcherError::Transport)?;
        let status = r.status();
        if !status.is_success() {
            let body = r.text().await.unwrap_or_default();
            return Err(MatcherError::Status {
                status: status.as_u16(),
                body,
            });
        }
        r.json::<Bundle>().await.map_err(MatcherError::Decode)
    }
}
