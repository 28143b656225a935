use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::SyncConfig, connection::RetryPolicy, controller::ResyncPolicy, error::Result,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow the board live and render every change to the terminal.
    Watch(WatchArgs),
    /// Fetch the current board state once and print it as JSON.
    Snapshot(ServerArgs),
    /// Ask the server to clear the visible course history.
    Clear(ServerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Base HTTP url of the course board server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    pub server: String,
}

impl ServerArgs {
    pub fn config(&self) -> Result<SyncConfig> {
        SyncConfig::from_base_url(&self.server)
    }
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Fixed delay before every reconnect attempt.
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Interval between keepalive pings. Use 0 to disable.
    #[arg(long, default_value_t = 25)]
    pub keepalive_secs: u64,

    /// Trust the server to push a full state on every new connection
    /// instead of fetching one after each reconnect.
    #[arg(long)]
    pub no_resync_on_reconnect: bool,
}

impl WatchArgs {
    pub fn config(&self) -> Result<SyncConfig> {
        let resync = if self.no_resync_on_reconnect {
            ResyncPolicy::ServerPush
        } else {
            ResyncPolicy::OnReconnect
        };
        let keepalive = (self.keepalive_secs > 0).then(|| Duration::from_secs(self.keepalive_secs));

        Ok(self
            .server
            .config()?
            .with_retry(RetryPolicy::fixed(Duration::from_millis(self.retry_delay_ms)))
            .with_keepalive(keepalive)
            .with_resync(resync))
    }
}
