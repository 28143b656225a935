use reqwest::{Client, Url};
use tracing::info;

use crate::error::{Result, SyncError};

/// User-initiated commands. Success only means the server accepted the
/// request; the resulting `history_cleared` frame is what changes state.
#[derive(Debug, Clone)]
pub struct CommandClient {
    client: Client,
    clear_url: Url,
}

impl CommandClient {
    pub fn new(clear_url: Url) -> Self {
        Self::with_client(Client::new(), clear_url)
    }

    pub fn with_client(client: Client, clear_url: Url) -> Self {
        Self { client, clear_url }
    }

    pub async fn clear_history(&self) -> Result<()> {
        let response = self
            .client
            .post(self.clear_url.clone())
            .send()
            .await
            .map_err(|err| SyncError::Command(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Command(format!(
                "{} answered {status}",
                self.clear_url
            )));
        }

        info!("history clear requested");
        Ok(())
    }
}
