use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    select,
};
use tracing::{info, warn};

use crate::{
    cli::{ServerArgs, WatchArgs},
    command::CommandClient,
    controller,
    render::TerminalObserver,
    snapshot::SnapshotFetcher,
};

pub async fn watch(args: WatchArgs) -> Result<()> {
    let config = args.config()?;
    info!(server = %args.server.server, "following board");

    let commands = CommandClient::new(config.clear_url.clone());
    let shutdown = run_console(commands);

    controller::run_client(&config, TerminalObserver, shutdown)
        .await
        .context("initial board snapshot could not be loaded")?;
    Ok(())
}

pub async fn snapshot(args: ServerArgs) -> Result<()> {
    let config = args.config()?;
    let state = SnapshotFetcher::new(config.snapshot_url)
        .fetch()
        .await
        .context("failed to fetch board snapshot")?;

    let rendered = serde_json::to_string_pretty(&state)?;
    write_stdout(&rendered).await?;
    Ok(())
}

pub async fn clear(args: ServerArgs) -> Result<()> {
    let config = args.config()?;
    CommandClient::new(config.clear_url)
        .clear_history()
        .await
        .context("failed to clear history")?;
    write_stdout("*** history clear requested").await?;
    Ok(())
}

/// Reads operator commands from stdin until `/quit` or Ctrl-C. A closed
/// stdin (e.g. when running as a service) only stops reading.
async fn run_console(commands: CommandClient) {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    let mut stdin_open = true;

    loop {
        input.clear();
        select! {
            bytes_read = stdin.read_line(&mut input), if stdin_open => {
                match bytes_read {
                    Ok(0) => stdin_open = false,
                    Ok(_) => {
                        if !handle_console_line(input.trim(), &commands).await {
                            return;
                        }
                    }
                    Err(error) => {
                        warn!(?error, "failed to read stdin");
                        stdin_open = false;
                    }
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                return;
            }
        }
    }
}

async fn handle_console_line(line: &str, commands: &CommandClient) -> bool {
    if line.is_empty() {
        return true;
    }

    if line.eq_ignore_ascii_case("/quit") {
        let _ = write_stdout("*** leaving board").await;
        return false;
    }

    if line.eq_ignore_ascii_case("clear") {
        // The board only changes once the server echoes history_cleared.
        if let Err(err) = commands.clear_history().await {
            let _ = write_stderr(&format!("!!! {err}")).await;
        }
        return true;
    }

    let _ = write_stderr(&format!("!!! unknown command '{line}'; try: clear, /quit")).await;
    true
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}
