use reqwest::{Client, Url};
use tracing::debug;

use crate::{
    error::{Result, SyncError},
    model::ClientState,
};

/// One-shot reader of the authoritative board state. Never retries; callers
/// pick the policy.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    client: Client,
    url: Url,
}

impl SnapshotFetcher {
    pub fn new(url: Url) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn fetch(&self) -> Result<ClientState> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| SyncError::Fetch(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Fetch(format!(
                "{} answered {status}",
                self.url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| SyncError::Fetch(err.to_string()))?;
        let state: ClientState = serde_json::from_slice(&body)?;

        debug!(
            courses = state.courses.len(),
            history = state.history_course_ids.len(),
            "snapshot fetched"
        );
        Ok(state)
    }
}
