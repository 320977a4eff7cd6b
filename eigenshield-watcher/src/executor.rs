use eigenshield_types::SubmissionPayload;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor unreachable")]
    Transport(#[source] reqwest::Error),
    #[error("executor rejected submission ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Client for the executor's `POST /submit`.
#[derive(Clone, Debug)]
pub struct ExecutorClient {
    base: String,
    client: Client,
}

impl ExecutorClient {
    pub fn new(base: impl Into<String>, client: Client) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base, client }
    }

    /// Any 2xx is success.
    pub async fn submit(&self, payload: &SubmissionPayload) -> Result<(), ExecutorError> {
        let url = format!("{}/submit", &self.base);
        let r = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(ExecutorError::Transport)?;
        let status = r.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = r.text().await.unwrap_or_default();
            Err(ExecutorError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
