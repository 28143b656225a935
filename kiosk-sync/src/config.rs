use std::time::Duration;

use reqwest::Url;

use crate::{
    connection::RetryPolicy,
    controller::ResyncPolicy,
    error::{Result, SyncError},
};

const STATE_PATH: &str = "/api/state";
const CLEAR_PATH: &str = "/api/clear";
const EVENTS_PATH: &str = "/ws";

/// Endpoints and policies for one kiosk client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub snapshot_url: Url,
    pub clear_url: Url,
    pub events_url: Url,
    pub retry: RetryPolicy,
    /// `None` disables the keepalive ping.
    pub keepalive: Option<Duration>,
    pub resync: ResyncPolicy,
}

impl SyncConfig {
    /// Derives every endpoint from the server's base HTTP url.
    pub fn from_base_url(base: &str) -> Result<Self> {
        let invalid = |reason: String| SyncError::InvalidUrl {
            url: base.to_string(),
            reason,
        };

        let base_url = Url::parse(base).map_err(|err| invalid(err.to_string()))?;
        let ws_scheme = match base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(invalid(format!("unsupported scheme '{other}'"))),
        };

        let join = |path: &str| base_url.join(path).map_err(|err| invalid(err.to_string()));
        let snapshot_url = join(STATE_PATH)?;
        let clear_url = join(CLEAR_PATH)?;
        let mut events_url = join(EVENTS_PATH)?;
        events_url
            .set_scheme(ws_scheme)
            .map_err(|_| invalid(format!("cannot switch to {ws_scheme}")))?;

        Ok(Self {
            snapshot_url,
            clear_url,
            events_url,
            retry: RetryPolicy::default(),
            keepalive: Some(Duration::from_secs(25)),
            resync: ResyncPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_resync(mut self, resync: ResyncPolicy) -> Self {
        self.resync = resync;
        self
    }
}
