use anyhow::Result;
use clap::Parser;

use kiosk_sync::{
    cli::{Cli, Command},
    client,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => client::watch(args).await?,
        Command::Snapshot(args) => client::snapshot(args).await?,
        Command::Clear(args) => client::clear(args).await?,
    }

    Ok(())
}
